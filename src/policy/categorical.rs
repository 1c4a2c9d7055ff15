//! Categorical policy for discrete action spaces

use anyhow::Result;
use tch::{
    nn::{self, Module},
    Device, Tensor,
};

use super::{
    mlp::{Mlp, MlpConfig},
    PolicyDistribution, PolicySnapshot, StochasticPolicy,
};

/// Softmax policy over `num_actions` logits produced by an MLP
pub struct CategoricalPolicy {
    vs: nn::VarStore,
    logits_net: Mlp,
    obs_dim: i64,
    num_actions: i64,
}

impl std::fmt::Debug for CategoricalPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CategoricalPolicy")
            .field("obs_dim", &self.obs_dim)
            .field("num_actions", &self.num_actions)
            .finish()
    }
}

impl CategoricalPolicy {
    /// Create a new categorical policy on the CPU in double precision
    pub fn new(obs_dim: i64, num_actions: i64, config: &MlpConfig) -> Self {
        let mut vs = nn::VarStore::new(Device::Cpu);
        let logits_net = Mlp::new(&(&vs.root() / "logits"), obs_dim, num_actions, config);
        vs.double();
        Self { vs, logits_net, obs_dim, num_actions }
    }
}

impl StochasticPolicy for CategoricalPolicy {
    fn parameters(&self) -> Vec<Tensor> {
        self.vs.trainable_variables()
    }

    fn distribution(&self, states: &Tensor) -> PolicyDistribution {
        PolicyDistribution::Categorical { logits: self.logits_net.forward(states) }
    }

    fn snapshot(&self) -> Result<PolicySnapshot> {
        Ok(PolicySnapshot::Categorical { logits_net: self.logits_net.weights()? })
    }
}

#[cfg(test)]
mod tests {
    use tch::Kind;

    use super::*;

    #[test]
    fn test_log_prob_is_normalised() {
        let policy = CategoricalPolicy::new(4, 3, &MlpConfig::default());
        let state = Tensor::randn([1, 4], (Kind::Double, Device::Cpu));
        let total: f64 = (0..3_i64)
            .map(|a| {
                let lp = policy.log_prob(&state, &Tensor::from_slice(&[a]));
                f64::try_from(lp.exp().sum(Kind::Double)).unwrap()
            })
            .sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_snapshot_dimensions() {
        let policy = CategoricalPolicy::new(4, 2, &MlpConfig::default());
        match policy.snapshot().unwrap() {
            PolicySnapshot::Categorical { logits_net } => {
                assert_eq!(logits_net.in_dim(), 4);
                assert_eq!(logits_net.out_dim(), 2);
            }
            _ => panic!("expected a categorical snapshot"),
        }
    }
}
