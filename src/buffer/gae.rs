//! Generalized Advantage Estimation (GAE)
//!
//! Advantages are computed over a flat batch in which episodes are laid out
//! back to back and separated by zero masks.
//!
//! # Mathematical Formula
//! ```text
//! δ_t = r_t + γ * m_t * V_{t+1} - V_t
//! A_t = δ_t + γ * λ * m_t * A_{t+1}
//! R_t = A_t + V_t
//! ```
//!
//! Where `m_t` is 0 at the last step of an episode and 1 otherwise. The terms
//! past the end of the batch are zero, whatever the final mask says.

/// Compute advantages and returns for a batch
///
/// # Arguments
/// * `rewards` - Rewards `r_t`
/// * `masks` - Continuation masks `m_t`
/// * `values` - Value estimates `V(s_t)`
/// * `gamma` - Discount factor (0 < gamma <= 1)
/// * `tau` - GAE lambda (0 <= tau <= 1)
///
/// # Returns
/// `(advantages, returns)`, both unnormalized.
pub fn estimate_advantages(
    rewards: &[f64],
    masks: &[f64],
    values: &[f64],
    gamma: f64,
    tau: f64,
) -> (Vec<f64>, Vec<f64>) {
    let n = rewards.len();
    debug_assert_eq!(masks.len(), n, "masks length mismatch");
    debug_assert_eq!(values.len(), n, "values length mismatch");

    let mut advantages = vec![0.0; n];
    let mut prev_value = 0.0;
    let mut prev_advantage = 0.0;

    for t in (0..n).rev() {
        let delta = rewards[t] + gamma * masks[t] * prev_value - values[t];
        advantages[t] = delta + gamma * tau * masks[t] * prev_advantage;

        prev_value = values[t];
        prev_advantage = advantages[t];
    }

    let returns = advantages.iter().zip(values).map(|(a, v)| a + v).collect();
    (advantages, returns)
}

/// Standardize a copy of `values` to zero mean and unit variance
///
/// Uses the sample standard deviation, floored at 1e-8.
pub fn standardize(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = if values.len() > 1 {
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)
    } else {
        0.0
    };
    let std = var.sqrt().max(1e-8);
    values.iter().map(|v| (v - mean) / std).collect()
}
