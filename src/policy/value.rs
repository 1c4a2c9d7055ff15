//! State-value baseline V(s)

use anyhow::Result;
use tch::{
    nn::{self, Module, OptimizerConfig},
    Device, Tensor,
};

use super::{
    flat,
    mlp::{Mlp, MlpConfig},
};

/// MLP regressor from observations to a scalar value
pub struct ValueNetwork {
    vs: nn::VarStore,
    net: Mlp,
    obs_dim: i64,
}

impl std::fmt::Debug for ValueNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueNetwork").field("obs_dim", &self.obs_dim).finish()
    }
}

impl ValueNetwork {
    /// Create a value network on the CPU in double precision
    ///
    /// The output layer uses unit orthogonal gain; the policy heads use the
    /// smaller gain from `config`.
    pub fn new(obs_dim: i64, config: &MlpConfig) -> Self {
        let mut vs = nn::VarStore::new(Device::Cpu);
        let net = Mlp::new(&(&vs.root() / "value"), obs_dim, 1, &config.with_output_gain(1.0));
        vs.double();
        Self { vs, net, obs_dim }
    }

    /// Values for a batch of states, shape [batch]
    pub fn forward(&self, states: &Tensor) -> Tensor {
        self.net.forward(states).squeeze_dim(-1)
    }

    /// Values for a batch of states without tracking gradients
    pub fn predict(&self, states: &Tensor) -> Result<Vec<f64>> {
        flat::to_vec(&tch::no_grad(|| self.forward(states)))
    }

    /// Trainable parameters in creation order
    pub fn parameters(&self) -> Vec<Tensor> {
        self.vs.trainable_variables()
    }

    /// Sum of squared parameters, for L2 regularisation
    pub fn l2_penalty(&self) -> Tensor {
        self.parameters()
            .iter()
            .map(|p| p.square().sum(tch::Kind::Double))
            .reduce(|acc, s| acc + s)
            .unwrap_or_else(|| Tensor::from(0.0_f64))
    }

    /// Adam optimizer over this network's parameters
    pub fn optimizer(&self, lr: f64) -> Result<nn::Optimizer> {
        Ok(nn::Adam::default().build(&self.vs, lr)?)
    }

    /// Current parameters as one flat vector
    pub fn flat_params(&self) -> Result<Vec<f64>> {
        flat::flat_params_vec(&self.parameters())
    }

    /// Overwrite all parameters from a flat vector
    pub fn set_flat_params(&mut self, params: &[f64]) -> Result<()> {
        flat::set_flat_params(&self.parameters(), params)
    }
}
