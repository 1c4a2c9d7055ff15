//! First-order regression of the value network onto returns
//!
//! Minimizes `mean((V(s) - R)²) + l2_reg · Σθ²` with Adam over shuffled
//! minibatches. There is no trust region on the value function.

use anyhow::{bail, Result};
use rand::{seq::SliceRandom, Rng};
use tch::{nn, Kind, Tensor};

use super::{config::TrpoConfig, stats::ValueFitStats};
use crate::policy::ValueNetwork;

/// Split `0..buffer_size` into shuffled minibatches of at most `batch_size`
pub fn generate_minibatch_indices<R: Rng + ?Sized>(
    buffer_size: usize,
    batch_size: usize,
    rng: &mut R,
) -> Vec<Vec<i64>> {
    let mut indices: Vec<i64> = (0..buffer_size as i64).collect();
    indices.shuffle(rng);
    indices.chunks(batch_size.max(1)).map(|chunk| chunk.to_vec()).collect()
}

fn mse(value: &ValueNetwork, states: &Tensor, returns: &Tensor) -> Result<f64> {
    let loss = tch::no_grad(|| (value.forward(states) - returns).square().mean(Kind::Double));
    Ok(f64::try_from(&loss)?)
}

/// Fit `value` to `returns` for `config.value_epochs` passes
pub fn fit_value<R: Rng + ?Sized>(
    value: &ValueNetwork,
    optimizer: &mut nn::Optimizer,
    states: &Tensor,
    returns: &Tensor,
    config: &TrpoConfig,
    rng: &mut R,
) -> Result<ValueFitStats> {
    let n = states.size().first().copied().unwrap_or(0);
    if n == 0 || returns.numel() as i64 != n {
        bail!("value fit needs matching non-empty states and returns");
    }

    let loss_before = mse(value, states, returns)?;
    let mut num_updates = 0;

    for _ in 0..config.value_epochs {
        for indices in generate_minibatch_indices(n as usize, config.value_batch_size, rng) {
            let indices = Tensor::f_from_slice(&indices)?;
            let mb_states = states.index_select(0, &indices);
            let mb_returns = returns.index_select(0, &indices);

            let mse_loss = (value.forward(&mb_states) - mb_returns).square().mean(Kind::Double);
            let loss = mse_loss + value.l2_penalty() * config.l2_reg;
            optimizer.backward_step(&loss);
            num_updates += 1;
        }
    }

    let loss_after = mse(value, states, returns)?;
    Ok(ValueFitStats { loss_before, loss_after, num_updates })
}
