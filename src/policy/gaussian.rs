//! Diagonal Gaussian policy for continuous control
//!
//! The mean comes from an MLP over the observation; the log standard
//! deviation is a free, state-independent parameter vector initialised to
//! `log_std_init` (zero by default, i.e. unit variance).

use anyhow::Result;
use tch::{
    nn::{self, Init, Module},
    Device, Tensor,
};

use super::{
    flat,
    mlp::{Mlp, MlpConfig},
    PolicyDistribution, PolicySnapshot, StochasticPolicy,
};

/// Gaussian policy N(μ(s), diag(exp(log_std)²))
pub struct GaussianPolicy {
    vs: nn::VarStore,
    mean_net: Mlp,
    log_std: Tensor,
    obs_dim: i64,
    action_dim: i64,
}

impl std::fmt::Debug for GaussianPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GaussianPolicy")
            .field("obs_dim", &self.obs_dim)
            .field("action_dim", &self.action_dim)
            .finish()
    }
}

impl GaussianPolicy {
    /// Create a new Gaussian policy on the CPU in double precision
    pub fn new(obs_dim: i64, action_dim: i64, config: &MlpConfig, log_std_init: f64) -> Self {
        let mut vs = nn::VarStore::new(Device::Cpu);
        let (mean_net, log_std) = {
            let root = vs.root();
            let mean_net = Mlp::new(&(&root / "mean"), obs_dim, action_dim, config);
            let log_std = root.var("log_std", &[1, action_dim], Init::Const(log_std_init));
            (mean_net, log_std)
        };
        vs.double();
        Self { vs, mean_net, log_std, obs_dim, action_dim }
    }
}

impl StochasticPolicy for GaussianPolicy {
    fn parameters(&self) -> Vec<Tensor> {
        self.vs.trainable_variables()
    }

    fn distribution(&self, states: &Tensor) -> PolicyDistribution {
        let mean = self.mean_net.forward(states);
        let log_std = self.log_std.expand_as(&mean);
        PolicyDistribution::Gaussian { mean, log_std }
    }

    fn snapshot(&self) -> Result<PolicySnapshot> {
        Ok(PolicySnapshot::Gaussian {
            mean_net: self.mean_net.weights()?,
            log_std: flat::to_vec(&self.log_std)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use tch::Kind;

    use super::*;

    #[test]
    fn test_distribution_shapes() {
        let policy = GaussianPolicy::new(3, 2, &MlpConfig::default(), 0.0);
        let states = Tensor::randn([7, 3], (Kind::Double, Device::Cpu));
        match policy.distribution(&states) {
            PolicyDistribution::Gaussian { mean, log_std } => {
                assert_eq!(mean.size(), vec![7, 2]);
                assert_eq!(log_std.size(), vec![7, 2]);
                assert_eq!(mean.kind(), Kind::Double);
            }
            _ => panic!("expected a Gaussian"),
        }
    }

    #[test]
    fn test_log_std_initialisation() {
        let policy = GaussianPolicy::new(2, 3, &MlpConfig::default(), -0.5);
        match policy.snapshot().unwrap() {
            PolicySnapshot::Gaussian { log_std, mean_net } => {
                assert_eq!(log_std, vec![-0.5; 3]);
                assert_eq!(mean_net.in_dim(), 2);
                assert_eq!(mean_net.out_dim(), 3);
            }
            _ => panic!("expected a Gaussian snapshot"),
        }
    }

    #[test]
    fn test_log_std_is_last_parameter() {
        let mut policy = GaussianPolicy::new(2, 1, &MlpConfig::default(), 0.0);
        let mut params = policy.flat_params().unwrap();
        *params.last_mut().unwrap() = 0.7;
        policy.set_flat_params(&params).unwrap();
        match policy.snapshot().unwrap() {
            PolicySnapshot::Gaussian { log_std, .. } => assert_eq!(log_std, vec![0.7]),
            _ => panic!("expected a Gaussian snapshot"),
        }
    }
}
