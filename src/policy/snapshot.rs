//! Frozen policy weights for sampling off the training thread
//!
//! Collection workers never touch libtorch tensors. Before each collection
//! round the trainer exports a [`PolicySnapshot`]; workers share it read-only
//! and sample actions with their own seeded RNG.

use anyhow::{bail, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{distribution, mlp::MlpWeights};
use crate::env::Action;

/// Pure Rust copy of a stochastic policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PolicySnapshot {
    /// Diagonal Gaussian with state-independent log std
    Gaussian {
        /// Mean network
        mean_net: MlpWeights,
        /// Log standard deviation per action dimension
        log_std: Vec<f64>,
    },
    /// Softmax over logits
    Categorical {
        /// Logits network
        logits_net: MlpWeights,
    },
}

impl PolicySnapshot {
    /// Sample an action and return its log-probability
    pub fn action_and_log_prob<R: Rng + ?Sized>(
        &self,
        state: &[f64],
        rng: &mut R,
    ) -> Result<(Action, f64)> {
        self.check_input(state)?;
        match self {
            PolicySnapshot::Gaussian { mean_net, log_std } => {
                let mean = mean_net.forward(state);
                let (action, log_prob) = distribution::sample_gaussian(&mean, log_std, rng)?;
                Ok((Action::Continuous(action), log_prob))
            }
            PolicySnapshot::Categorical { logits_net } => {
                let logits = logits_net.forward(state);
                let (action, log_prob) = distribution::sample_categorical(&logits, rng)?;
                Ok((Action::Discrete(action), log_prob))
            }
        }
    }

    /// Log-probability of `action` in `state`
    pub fn log_prob(&self, state: &[f64], action: &Action) -> Result<f64> {
        self.check_input(state)?;
        match (self, action) {
            (PolicySnapshot::Gaussian { mean_net, log_std }, Action::Continuous(a)) => {
                if a.len() != log_std.len() {
                    bail!("action has {} dimensions, policy has {}", a.len(), log_std.len());
                }
                Ok(distribution::gaussian_log_prob(&mean_net.forward(state), log_std, a))
            }
            (PolicySnapshot::Categorical { logits_net }, Action::Discrete(a)) => {
                let log_probs = distribution::log_softmax(&logits_net.forward(state));
                match usize::try_from(*a).ok().and_then(|i| log_probs.get(i)) {
                    Some(lp) => Ok(*lp),
                    None => bail!("action {} out of range for {} actions", a, log_probs.len()),
                }
            }
            _ => bail!("action kind does not match the policy"),
        }
    }

    /// Observation dimensionality
    pub fn obs_dim(&self) -> usize {
        match self {
            PolicySnapshot::Gaussian { mean_net, .. } => mean_net.in_dim(),
            PolicySnapshot::Categorical { logits_net } => logits_net.in_dim(),
        }
    }

    fn check_input(&self, state: &[f64]) -> Result<()> {
        if state.len() != self.obs_dim() {
            bail!("state has {} elements, policy expects {}", state.len(), self.obs_dim());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};
    use tch::Tensor;

    use super::*;
    use crate::policy::{CategoricalPolicy, GaussianPolicy, MlpConfig, StochasticPolicy};

    #[test]
    fn test_snapshot_log_prob_matches_network() {
        let policy = GaussianPolicy::new(3, 2, &MlpConfig::default(), 0.0);
        let snapshot = policy.snapshot().unwrap();
        let mut rng = StdRng::seed_from_u64(3);

        let state = [0.1, -0.2, 0.3];
        let (action, lp) = snapshot.action_and_log_prob(&state, &mut rng).unwrap();
        let a = action.as_continuous().unwrap().to_vec();

        let expected = policy.log_prob(
            &Tensor::from_slice(&state).view([1, 3]),
            &Tensor::from_slice(&a).view([1, 2]),
        );
        let expected = f64::try_from(expected.sum(tch::Kind::Double)).unwrap();
        assert!((lp - expected).abs() < 1e-10);
        assert!((snapshot.log_prob(&state, &action).unwrap() - lp).abs() < 1e-12);
    }

    #[test]
    fn test_same_seed_same_action() {
        let snapshot = CategoricalPolicy::new(2, 4, &MlpConfig::default()).snapshot().unwrap();
        let mut a = StdRng::seed_from_u64(9);
        let mut b = StdRng::seed_from_u64(9);
        for _ in 0..10 {
            assert_eq!(
                snapshot.action_and_log_prob(&[0.5, 0.5], &mut a).unwrap(),
                snapshot.action_and_log_prob(&[0.5, 0.5], &mut b).unwrap()
            );
        }
    }

    #[test]
    fn test_rejects_bad_input() {
        let snapshot = CategoricalPolicy::new(2, 3, &MlpConfig::default()).snapshot().unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        assert!(snapshot.action_and_log_prob(&[1.0], &mut rng).is_err());
        assert!(snapshot.log_prob(&[1.0, 0.0], &Action::Discrete(3)).is_err());
        assert!(snapshot.log_prob(&[1.0, 0.0], &Action::Continuous(vec![0.0])).is_err());
    }
}
