//! Flat views of a parameter list
//!
//! The trust-region update works on a single parameter vector. These helpers
//! concatenate a model's trainable tensors (in variable-store creation order)
//! into one `Kind::Double` vector, write such a vector back, and compute flat
//! gradients, optionally keeping the graph for a second differentiation pass.

use anyhow::{bail, Result};
use tch::{Kind, Tensor};

/// Total number of scalar parameters
pub fn num_params(params: &[Tensor]) -> usize {
    params.iter().map(|p| p.numel()).sum()
}

/// Concatenate detached parameters into one 1-D tensor
pub fn flat_params(params: &[Tensor]) -> Tensor {
    let flat: Vec<Tensor> =
        params.iter().map(|p| p.detach().to_kind(Kind::Double).reshape([-1])).collect();
    Tensor::cat(&flat, 0)
}

/// Concatenate parameters into a `Vec<f64>`
pub fn flat_params_vec(params: &[Tensor]) -> Result<Vec<f64>> {
    Ok(Vec::<f64>::try_from(&flat_params(params))?)
}

/// Overwrite every parameter from a flat vector
///
/// The write happens in place (shared storage), outside of autograd.
pub fn set_flat_params(params: &[Tensor], flat: &[f64]) -> Result<()> {
    let expected = num_params(params);
    if flat.len() != expected {
        bail!("flat parameter vector has {} elements, model has {}", flat.len(), expected);
    }

    tch::no_grad(|| -> Result<()> {
        let mut offset = 0;
        for param in params {
            let n = param.numel();
            let src = Tensor::f_from_slice(&flat[offset..offset + n])?
                .to_kind(param.kind())
                .to_device(param.device())
                .view_as(param);
            param.shallow_clone().f_copy_(&src)?;
            offset += n;
        }
        Ok(())
    })
}

/// Flat gradient of a scalar `output` with respect to `params`
///
/// With `create_graph` the result is itself differentiable, which is what a
/// Hessian-vector product needs. Every parameter must take part in the graph
/// of `output`; an undefined gradient (no path from `output`) becomes zeros.
pub fn flat_grad(output: &Tensor, params: &[Tensor], create_graph: bool) -> Result<Tensor> {
    let grads = Tensor::f_run_backward(&[output], params, create_graph, create_graph)?;
    let flat: Vec<Tensor> = grads
        .iter()
        .zip(params)
        .map(|(g, p)| if g.defined() { g.reshape([-1]) } else { p.zeros_like().reshape([-1]) })
        .collect();
    Ok(Tensor::cat(&flat, 0))
}

/// Copy a 1-D tensor into a `Vec<f64>`
pub fn to_vec(t: &Tensor) -> Result<Vec<f64>> {
    Ok(Vec::<f64>::try_from(&t.detach().to_kind(Kind::Double).contiguous().view([-1]))?)
}
