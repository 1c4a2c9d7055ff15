//! Multi-Layer Perceptron (MLP) building block
//!
//! Every network in the crate (Gaussian mean, categorical logits, state
//! value) is the same feedforward stack with a different output head:
//!
//! ```text
//! Input (observations)
//!         |
//!   [Dense(hidden[0])] -> Tanh
//!         |
//!   [Dense(hidden[1])] -> Tanh
//!         |
//!   [Dense(out_dim)]   (orthogonal init, small gain, zero bias)
//! ```
//!
//! The layers are kept as individual `nn::Linear` so their weights can be
//! exported to [`MlpWeights`], a pure Rust copy used by collection workers.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tch::{
    nn::{self, Init, Module},
    Device, Kind, Tensor,
};

/// Configuration for MLP architecture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlpConfig {
    /// Width of each hidden layer
    pub hidden_sizes: Vec<i64>,
    /// Hidden-layer nonlinearity
    pub activation: Activation,
    /// Orthogonal-init gain of the output layer
    pub output_gain: f64,
}

/// Hidden-layer nonlinearity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activation {
    /// max(0, x)
    ReLU,
    /// tanh(x)
    Tanh,
}

impl Activation {
    fn apply(self, x: &Tensor) -> Tensor {
        match self {
            Activation::ReLU => x.relu(),
            Activation::Tanh => x.tanh(),
        }
    }

    fn apply_scalar(self, x: f64) -> f64 {
        match self {
            Activation::ReLU => x.max(0.0),
            Activation::Tanh => x.tanh(),
        }
    }
}

impl Default for MlpConfig {
    fn default() -> Self {
        Self { hidden_sizes: vec![128, 128], activation: Activation::Tanh, output_gain: 0.1 }
    }
}

impl MlpConfig {
    /// Same architecture with a different output gain
    pub fn with_output_gain(&self, gain: f64) -> Self {
        Self { output_gain: gain, ..self.clone() }
    }
}

/// Feedforward network over `Kind::Double` tensors
#[derive(Debug)]
pub struct Mlp {
    layers: Vec<nn::Linear>,
    activation: Activation,
}

impl Mlp {
    /// Build the network under `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Variable-store path the layers are registered under
    /// * `in_dim` - Input dimensionality
    /// * `out_dim` - Output dimensionality
    /// * `config` - Architecture configuration
    pub fn new(path: &nn::Path, in_dim: i64, out_dim: i64, config: &MlpConfig) -> Self {
        let mut layers = Vec::with_capacity(config.hidden_sizes.len() + 1);
        let mut prev = in_dim;

        for (i, &width) in config.hidden_sizes.iter().enumerate() {
            layers.push(nn::linear(path / format!("fc{}", i + 1), prev, width, Default::default()));
            prev = width;
        }

        let mut output_config = nn::LinearConfig::default();
        output_config.ws_init = Init::Orthogonal { gain: config.output_gain };
        output_config.bs_init = Some(Init::Const(0.0));
        layers.push(nn::linear(path / "head", prev, out_dim, output_config));

        Self { layers, activation: config.activation }
    }

    /// Export the current weights
    pub fn weights(&self) -> Result<MlpWeights> {
        let layers = self
            .layers
            .iter()
            .map(|layer| {
                let size = layer.ws.size();
                let (out_dim, in_dim) = (size[0] as usize, size[1] as usize);
                let weight = tensor_to_vec(&layer.ws)?;
                let bias = match &layer.bs {
                    Some(bs) => tensor_to_vec(bs)?,
                    None => vec![0.0; out_dim],
                };
                Ok(LayerWeights { in_dim, out_dim, weight, bias })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(MlpWeights { layers, activation: self.activation })
    }
}

impl Module for Mlp {
    fn forward(&self, xs: &Tensor) -> Tensor {
        let last = self.layers.len() - 1;
        let mut out = xs.shallow_clone();
        for (i, layer) in self.layers.iter().enumerate() {
            out = layer.forward(&out);
            if i < last {
                out = self.activation.apply(&out);
            }
        }
        out
    }
}

fn tensor_to_vec(tensor: &Tensor) -> Result<Vec<f64>> {
    let flat = tensor.detach().to_device(Device::Cpu).to_kind(Kind::Double).contiguous().view([-1]);
    Ok(Vec::<f64>::try_from(&flat)?)
}

/// Weights of one dense layer, row-major `[out_dim, in_dim]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerWeights {
    /// Input dimensionality
    pub in_dim: usize,
    /// Output dimensionality
    pub out_dim: usize,
    /// Weight matrix, row-major
    pub weight: Vec<f64>,
    /// Bias vector
    pub bias: Vec<f64>,
}

/// Pure Rust copy of an [`Mlp`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlpWeights {
    /// Dense layers, input to output
    pub layers: Vec<LayerWeights>,
    /// Hidden-layer nonlinearity
    pub activation: Activation,
}

impl MlpWeights {
    /// Forward pass for a single input vector
    pub fn forward(&self, x: &[f64]) -> Vec<f64> {
        let last = self.layers.len().saturating_sub(1);
        let mut out = x.to_vec();
        for (i, layer) in self.layers.iter().enumerate() {
            debug_assert_eq!(out.len(), layer.in_dim, "input dimension mismatch");
            let mut next = layer.bias.clone();
            for (o, acc) in next.iter_mut().enumerate() {
                let row = &layer.weight[o * layer.in_dim..(o + 1) * layer.in_dim];
                *acc += row.iter().zip(&out).map(|(w, v)| w * v).sum::<f64>();
                if i < last {
                    *acc = self.activation.apply_scalar(*acc);
                }
            }
            out = next;
        }
        out
    }

    /// Input dimensionality
    pub fn in_dim(&self) -> usize {
        self.layers.first().map_or(0, |l| l.in_dim)
    }

    /// Output dimensionality
    pub fn out_dim(&self) -> usize {
        self.layers.last().map_or(0, |l| l.out_dim)
    }
}
