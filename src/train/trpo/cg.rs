//! Conjugate gradient for symmetric positive-definite systems
//!
//! Solves `A x = b` given only the matrix-vector product `v ↦ A v`, which in
//! TRPO is the damped Fisher-vector product.

use anyhow::Result;

use crate::error::TrpoError;

/// Result of a conjugate-gradient solve
#[derive(Debug, Clone, PartialEq)]
pub struct CgSolution {
    /// Approximate solution
    pub x: Vec<f64>,
    /// Iterations performed
    pub iterations: usize,
    /// Final squared residual norm
    pub residual: f64,
}

/// Run at most `max_iters` conjugate-gradient iterations from `x = 0`
///
/// Stops early once the squared residual norm drops below `residual_tol`.
///
/// # Errors
///
/// [`TrpoError::NonPositiveCurvature`] when a search direction `p` has
/// `pᵀAp <= 0`, i.e. the operator is not positive definite along it.
pub fn conjugate_gradient<F>(
    mut avp: F,
    b: &[f64],
    max_iters: usize,
    residual_tol: f64,
) -> Result<CgSolution>
where
    F: FnMut(&[f64]) -> Result<Vec<f64>>,
{
    let mut x = vec![0.0; b.len()];
    let mut r = b.to_vec();
    let mut p = b.to_vec();
    let mut rdotr = dot(&r, &r);
    let mut iterations = 0;

    for _ in 0..max_iters {
        if rdotr < residual_tol {
            break;
        }
        let ap = avp(&p)?;
        let curvature = dot(&p, &ap);
        if curvature <= 0.0 {
            return Err(TrpoError::NonPositiveCurvature { value: curvature }.into());
        }
        let alpha = rdotr / curvature;
        axpy(alpha, &p, &mut x);
        axpy(-alpha, &ap, &mut r);

        let new_rdotr = dot(&r, &r);
        let beta = new_rdotr / rdotr;
        for (pi, ri) in p.iter_mut().zip(&r) {
            *pi = ri + beta * *pi;
        }
        rdotr = new_rdotr;
        iterations += 1;
    }

    Ok(CgSolution { x, iterations, residual: rdotr })
}

/// Inner product
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// `y += alpha * x`
fn axpy(alpha: f64, x: &[f64], y: &mut [f64]) {
    for (yi, xi) in y.iter_mut().zip(x) {
        *yi += alpha * xi;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matvec(a: &[[f64; 3]; 3], v: &[f64]) -> Vec<f64> {
        a.iter().map(|row| dot(row, v)).collect()
    }

    #[test]
    fn test_solves_spd_system() {
        let a = [[4.0, 1.0, 0.0], [1.0, 3.0, 1.0], [0.0, 1.0, 2.0]];
        let b = [1.0, 2.0, 3.0];
        let sol = conjugate_gradient(|v| Ok(matvec(&a, v)), &b, 10, 1e-20).unwrap();

        let ax = matvec(&a, &sol.x);
        for (l, r) in ax.iter().zip(&b) {
            assert!((l - r).abs() < 1e-9);
        }
        // Exact in at most n steps for an n×n SPD matrix
        assert!(sol.iterations <= 3);
    }

    #[test]
    fn test_zero_rhs_returns_zero_immediately() {
        let mut calls = 0;
        let sol = conjugate_gradient(
            |v| {
                calls += 1;
                Ok(v.to_vec())
            },
            &[0.0; 4],
            10,
            1e-10,
        )
        .unwrap();
        assert_eq!(sol.x, vec![0.0; 4]);
        assert_eq!(sol.iterations, 0);
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_iteration_cap() {
        let diag = [1.0, 10.0, 100.0, 1000.0];
        let sol = conjugate_gradient(
            |v| Ok(v.iter().zip(&diag).map(|(x, d)| x * d).collect()),
            &[1.0; 4],
            2,
            0.0,
        )
        .unwrap();
        assert_eq!(sol.iterations, 2);
    }

    #[test]
    fn test_singular_operator_is_typed() {
        // Zero along the second axis, where all of b lives
        let err = conjugate_gradient(|v| Ok(vec![v[0], 0.0]), &[0.0, 1.0], 10, 1e-10)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TrpoError>(),
            Some(TrpoError::NonPositiveCurvature { value }) if *value == 0.0
        ));
    }

    #[test]
    fn test_product_errors_propagate() {
        let result = conjugate_gradient(|_| anyhow::bail!("boom"), &[1.0], 5, 1e-10);
        assert!(result.is_err());
    }
}
