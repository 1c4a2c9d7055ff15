//! Backtracking line search along the natural-gradient direction
//!
//! Candidates are `θ₀ + shrink^k · step` for `k = 0..max_backtracks`. The
//! first candidate whose KL to the pre-step policy is within budget and whose
//! surrogate did not decrease is accepted. Restoring `θ₀` after an exhausted
//! search is the caller's job.

use anyhow::Result;
use tracing::debug;

/// Acceptance thresholds for the search
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSearchConfig {
    /// KL budget
    pub max_kl: f64,
    /// Step fraction multiplier between attempts
    pub shrink: f64,
    /// Number of attempts
    pub max_backtracks: usize,
}

/// Surrogate and KL measured at a candidate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trial {
    /// Surrogate objective at the candidate
    pub surrogate: f64,
    /// Mean KL from the pre-step policy to the candidate
    pub kl: f64,
}

/// What the search ended with
#[derive(Debug, Clone, PartialEq)]
pub enum LineSearchOutcome {
    /// A candidate passed both tests
    Accepted {
        /// Parameters of the accepted candidate
        params: Vec<f64>,
        /// Fraction of the full step taken
        step_fraction: f64,
        /// Rejected candidates before this one
        backtracks: usize,
        /// Measurements at the accepted candidate
        trial: Trial,
    },
    /// Every candidate failed
    Exhausted {
        /// Candidates tried
        attempts: usize,
    },
}

impl LineSearchOutcome {
    /// Whether a candidate was accepted
    pub fn is_accepted(&self) -> bool {
        matches!(self, LineSearchOutcome::Accepted { .. })
    }
}

/// Search from `x0` along `full_step`
///
/// `evaluate` installs a candidate parameter vector and measures it. After an
/// accepted search the last installed candidate is the accepted one.
pub fn backtracking_line_search<F>(
    x0: &[f64],
    full_step: &[f64],
    surrogate_before: f64,
    config: &LineSearchConfig,
    mut evaluate: F,
) -> Result<LineSearchOutcome>
where
    F: FnMut(&[f64]) -> Result<Trial>,
{
    let mut step_fraction = 1.0;
    for k in 0..config.max_backtracks {
        let candidate: Vec<f64> =
            x0.iter().zip(full_step).map(|(x, s)| x + step_fraction * s).collect();
        let trial = evaluate(&candidate)?;
        let improvement = trial.surrogate - surrogate_before;

        debug!(
            backtrack = k,
            step_fraction,
            improvement,
            kl = trial.kl,
            "line search candidate"
        );

        if trial.kl <= config.max_kl && improvement >= 0.0 {
            return Ok(LineSearchOutcome::Accepted {
                params: candidate,
                step_fraction,
                backtracks: k,
                trial,
            });
        }
        step_fraction *= config.shrink;
    }

    Ok(LineSearchOutcome::Exhausted { attempts: config.max_backtracks })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> LineSearchConfig {
        LineSearchConfig { max_kl: 0.01, shrink: 0.5, max_backtracks: 10 }
    }

    #[test]
    fn test_accepts_full_step_when_safe() {
        let outcome = backtracking_line_search(&[0.0], &[1.0], 0.0, &config(), |x| {
            Ok(Trial { surrogate: x[0], kl: 0.0 })
        })
        .unwrap();
        match outcome {
            LineSearchOutcome::Accepted { params, step_fraction, backtracks, .. } => {
                assert_eq!(params, vec![1.0]);
                assert_eq!(step_fraction, 1.0);
                assert_eq!(backtracks, 0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_backtracks_until_kl_within_budget() {
        // KL grows quadratically with the step; only fractions <= 1/8 pass
        let outcome = backtracking_line_search(&[0.0], &[1.0], 0.0, &config(), |x| {
            Ok(Trial { surrogate: x[0], kl: 0.5 * x[0] * x[0] })
        })
        .unwrap();
        match outcome {
            LineSearchOutcome::Accepted { step_fraction, backtracks, trial, .. } => {
                assert_eq!(backtracks, 3);
                assert_eq!(step_fraction, 0.125);
                assert!(trial.kl <= 0.01);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_rejects_surrogate_decrease() {
        let mut evaluations = 0;
        let outcome = backtracking_line_search(&[1.0, 1.0], &[1.0, 0.0], 5.0, &config(), |_| {
            evaluations += 1;
            Ok(Trial { surrogate: 4.999, kl: 0.0 })
        })
        .unwrap();
        assert_eq!(outcome, LineSearchOutcome::Exhausted { attempts: 10 });
        assert_eq!(evaluations, 10);
    }

    #[test]
    fn test_zero_improvement_is_accepted() {
        let outcome = backtracking_line_search(&[0.0], &[1.0], 2.0, &config(), |_| {
            Ok(Trial { surrogate: 2.0, kl: 0.01 })
        })
        .unwrap();
        assert!(outcome.is_accepted());
    }

    #[test]
    fn test_nan_candidates_are_rejected() {
        let outcome = backtracking_line_search(&[0.0], &[1.0], 0.0, &config(), |_| {
            Ok(Trial { surrogate: f64::NAN, kl: f64::NAN })
        })
        .unwrap();
        assert!(!outcome.is_accepted());
    }
}
