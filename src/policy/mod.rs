//! Policy and value networks
//!
//! This module provides the function approximators the TRPO core works on,
//! built with tch-rs in double precision on the CPU:
//!
//! - [`GaussianPolicy`] for continuous action spaces
//! - [`CategoricalPolicy`] for discrete action spaces
//! - [`ValueNetwork`] for the state-value baseline
//!
//! Policies implement [`StochasticPolicy`], which exposes exactly what the
//! trust-region step needs: a differentiable action distribution, and the
//! trainable parameters as one flat vector.

use anyhow::{bail, Result};
use rand::Rng;
use tch::Tensor;

use crate::env::{Action, SpaceInfo, SpaceType};

pub mod categorical;
pub mod distribution;
pub mod flat;
pub mod gaussian;
pub mod mlp;
pub mod snapshot;
pub mod value;

pub use categorical::CategoricalPolicy;
pub use distribution::PolicyDistribution;
pub use gaussian::GaussianPolicy;
pub use mlp::{Activation, MlpConfig};
pub use snapshot::PolicySnapshot;
pub use value::ValueNetwork;

/// A differentiable stochastic policy π(a | s)
pub trait StochasticPolicy {
    /// Trainable parameters in a fixed order
    ///
    /// The returned tensors share storage with the model, so writing into
    /// them updates the policy.
    fn parameters(&self) -> Vec<Tensor>;

    /// Action distribution for a batch of states `[batch, obs_dim]`
    fn distribution(&self, states: &Tensor) -> PolicyDistribution;

    /// Pure Rust copy of the current weights for inference on other threads
    fn snapshot(&self) -> Result<PolicySnapshot>;

    /// Differentiable log π(a | s), shape [batch]
    fn log_prob(&self, states: &Tensor, actions: &Tensor) -> Tensor {
        self.distribution(states).log_prob(actions)
    }

    /// Sample an action for a single state without tracking gradients
    fn action_and_log_prob<R: Rng + ?Sized>(
        &self,
        state: &[f64],
        rng: &mut R,
    ) -> Result<(Action, f64)> {
        let states = Tensor::f_from_slice(state)?.view([1, -1]);
        let dist = tch::no_grad(|| self.distribution(&states));
        match dist {
            PolicyDistribution::Gaussian { mean, log_std } => {
                let (action, log_prob) = distribution::sample_gaussian(
                    &flat::to_vec(&mean)?,
                    &flat::to_vec(&log_std)?,
                    rng,
                )?;
                Ok((Action::Continuous(action), log_prob))
            }
            PolicyDistribution::Categorical { logits } => {
                let (action, log_prob) =
                    distribution::sample_categorical(&flat::to_vec(&logits)?, rng)?;
                Ok((Action::Discrete(action), log_prob))
            }
        }
    }

    /// Current parameters as one flat vector
    fn flat_params(&self) -> Result<Vec<f64>> {
        flat::flat_params_vec(&self.parameters())
    }

    /// Overwrite all parameters from a flat vector
    fn set_flat_params(&mut self, params: &[f64]) -> Result<()> {
        flat::set_flat_params(&self.parameters(), params)
    }

    /// Total number of scalar parameters
    fn num_params(&self) -> usize {
        flat::num_params(&self.parameters())
    }
}

/// Policy matching an environment's action space
#[derive(Debug)]
pub enum Policy {
    /// Continuous actions
    Gaussian(GaussianPolicy),
    /// Discrete actions
    Categorical(CategoricalPolicy),
}

impl Policy {
    /// Build the policy family appropriate for the given spaces
    pub fn for_spaces(
        observation_space: &SpaceInfo,
        action_space: &SpaceInfo,
        config: &MlpConfig,
    ) -> Result<Self> {
        let obs_dim = observation_space.dim() as i64;
        if obs_dim == 0 {
            bail!("observation space must have at least one dimension");
        }
        match action_space.space_type {
            SpaceType::Continuous if action_space.dim() > 0 => Ok(Policy::Gaussian(
                GaussianPolicy::new(obs_dim, action_space.dim() as i64, config, 0.0),
            )),
            SpaceType::Discrete(n) if n > 1 => {
                Ok(Policy::Categorical(CategoricalPolicy::new(obs_dim, n as i64, config)))
            }
            _ => bail!("unsupported action space {:?}", action_space),
        }
    }

    /// Whether the policy acts in a continuous space
    pub fn is_continuous(&self) -> bool {
        matches!(self, Policy::Gaussian(_))
    }
}

impl StochasticPolicy for Policy {
    fn parameters(&self) -> Vec<Tensor> {
        match self {
            Policy::Gaussian(p) => p.parameters(),
            Policy::Categorical(p) => p.parameters(),
        }
    }

    fn distribution(&self, states: &Tensor) -> PolicyDistribution {
        match self {
            Policy::Gaussian(p) => p.distribution(states),
            Policy::Categorical(p) => p.distribution(states),
        }
    }

    fn snapshot(&self) -> Result<PolicySnapshot> {
        match self {
            Policy::Gaussian(p) => p.snapshot(),
            Policy::Categorical(p) => p.snapshot(),
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    fn small() -> MlpConfig {
        MlpConfig { hidden_sizes: vec![16], ..Default::default() }
    }

    #[test]
    fn test_policy_family_follows_action_space() {
        let obs = SpaceInfo { shape: vec![3], space_type: SpaceType::Continuous };
        let cont = SpaceInfo { shape: vec![2], space_type: SpaceType::Continuous };
        let disc = SpaceInfo { shape: vec![], space_type: SpaceType::Discrete(4) };

        assert!(Policy::for_spaces(&obs, &cont, &small()).unwrap().is_continuous());
        assert!(!Policy::for_spaces(&obs, &disc, &small()).unwrap().is_continuous());

        let degenerate = SpaceInfo { shape: vec![], space_type: SpaceType::Discrete(1) };
        assert!(Policy::for_spaces(&obs, &degenerate, &small()).is_err());
    }

    #[test]
    fn test_flat_params_roundtrip_through_trait() {
        let obs = SpaceInfo { shape: vec![3], space_type: SpaceType::Continuous };
        let act = SpaceInfo { shape: vec![1], space_type: SpaceType::Continuous };
        let mut policy = Policy::for_spaces(&obs, &act, &small()).unwrap();

        let params = policy.flat_params().unwrap();
        assert_eq!(params.len(), policy.num_params());

        let shifted: Vec<f64> = params.iter().map(|p| p + 0.25).collect();
        policy.set_flat_params(&shifted).unwrap();
        assert_eq!(policy.flat_params().unwrap(), shifted);
    }

    #[test]
    fn test_sampled_log_prob_matches_log_prob() {
        let obs = SpaceInfo { shape: vec![2], space_type: SpaceType::Continuous };
        let act = SpaceInfo { shape: vec![], space_type: SpaceType::Discrete(3) };
        let policy = Policy::for_spaces(&obs, &act, &small()).unwrap();
        let mut rng = StdRng::seed_from_u64(5);

        let state = [0.2, -0.4];
        let (action, sampled_lp) = policy.action_and_log_prob(&state, &mut rng).unwrap();
        let index = action.as_discrete().unwrap();

        let lp = policy.log_prob(
            &Tensor::from_slice(&state).view([1, 2]),
            &Tensor::from_slice(&[index]),
        );
        let lp = f64::try_from(&lp.sum(tch::Kind::Double)).unwrap();
        assert!((lp - sampled_lp).abs() < 1e-10);
    }
}
