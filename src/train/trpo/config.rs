//! TRPO configuration and hyperparameters
//!
//! This module defines the configuration parameters for the trust-region
//! update and the value-function fit, with validation and builder methods.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// TRPO configuration parameters
///
/// Defaults follow the usual MuJoCo settings for TRPO with GAE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrpoConfig {
    /// Discount factor (gamma)
    pub gamma: f64,

    /// GAE lambda parameter
    pub tau: f64,

    /// KL-divergence budget per update
    pub max_kl: f64,

    /// Damping added to the Fisher-vector product
    pub damping: f64,

    /// L2 coefficient on the value-network parameters
    pub l2_reg: f64,

    /// Optional L2 coefficient on the policy parameters
    pub policy_l2_reg: Option<f64>,

    /// Conjugate-gradient iterations
    pub cg_iters: usize,

    /// Squared residual norm at which conjugate gradient stops early
    pub cg_residual_tol: f64,

    /// Step fraction multiplier between line-search attempts
    pub line_search_shrink: f64,

    /// Number of line-search attempts
    pub line_search_max_backtracks: usize,

    /// Adam learning rate for the value network
    pub lr_v: f64,

    /// Passes over the batch when fitting the value network
    pub value_epochs: usize,

    /// Minibatch size when fitting the value network
    pub value_batch_size: usize,

    /// Standardize advantages before the policy update
    pub normalize_advantages: bool,
}

impl Default for TrpoConfig {
    fn default() -> Self {
        Self {
            gamma: 0.99,
            tau: 0.95,
            max_kl: 1e-2,
            damping: 1e-2,
            l2_reg: 1e-3,
            policy_l2_reg: None,
            cg_iters: 10,
            cg_residual_tol: 1e-10,
            line_search_shrink: 0.5,
            line_search_max_backtracks: 10,
            lr_v: 3e-4,
            value_epochs: 1,
            value_batch_size: 64,
            normalize_advantages: true,
        }
    }
}

impl TrpoConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if !(self.gamma > 0.0 && self.gamma <= 1.0) {
            return Err(anyhow!("gamma must be in (0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.tau) {
            return Err(anyhow!("tau must be in [0, 1]"));
        }
        if !(self.max_kl > 0.0 && self.max_kl.is_finite()) {
            return Err(anyhow!("max_kl must be positive"));
        }
        if !(self.damping >= 0.0 && self.damping.is_finite()) {
            return Err(anyhow!("damping must be non-negative"));
        }
        if self.l2_reg < 0.0 {
            return Err(anyhow!("l2_reg must be non-negative"));
        }
        if matches!(self.policy_l2_reg, Some(c) if c < 0.0) {
            return Err(anyhow!("policy_l2_reg must be non-negative"));
        }
        if self.cg_iters == 0 {
            return Err(anyhow!("cg_iters must be positive"));
        }
        if self.cg_residual_tol < 0.0 {
            return Err(anyhow!("cg_residual_tol must be non-negative"));
        }
        if !(self.line_search_shrink > 0.0 && self.line_search_shrink < 1.0) {
            return Err(anyhow!("line_search_shrink must be in (0, 1)"));
        }
        if self.line_search_max_backtracks == 0 {
            return Err(anyhow!("line_search_max_backtracks must be positive"));
        }
        if self.lr_v <= 0.0 {
            return Err(anyhow!("lr_v must be positive"));
        }
        if self.value_epochs == 0 {
            return Err(anyhow!("value_epochs must be positive"));
        }
        if self.value_batch_size == 0 {
            return Err(anyhow!("value_batch_size must be positive"));
        }
        Ok(())
    }

    /// Set discount factor
    pub fn gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    /// Set GAE lambda
    pub fn tau(mut self, tau: f64) -> Self {
        self.tau = tau;
        self
    }

    /// Set KL budget
    pub fn max_kl(mut self, max_kl: f64) -> Self {
        self.max_kl = max_kl;
        self
    }

    /// Set Fisher damping
    pub fn damping(mut self, damping: f64) -> Self {
        self.damping = damping;
        self
    }

    /// Set value-network L2 coefficient
    pub fn l2_reg(mut self, l2_reg: f64) -> Self {
        self.l2_reg = l2_reg;
        self
    }

    /// Set policy L2 coefficient
    pub fn policy_l2_reg(mut self, coef: Option<f64>) -> Self {
        self.policy_l2_reg = coef;
        self
    }

    /// Set conjugate-gradient iterations
    pub fn cg_iters(mut self, iters: usize) -> Self {
        self.cg_iters = iters;
        self
    }

    /// Set line-search shrink factor
    pub fn line_search_shrink(mut self, shrink: f64) -> Self {
        self.line_search_shrink = shrink;
        self
    }

    /// Set number of line-search attempts
    pub fn line_search_max_backtracks(mut self, n: usize) -> Self {
        self.line_search_max_backtracks = n;
        self
    }

    /// Set value learning rate
    pub fn lr_v(mut self, lr: f64) -> Self {
        self.lr_v = lr;
        self
    }

    /// Set value-fit epochs
    pub fn value_epochs(mut self, epochs: usize) -> Self {
        self.value_epochs = epochs;
        self
    }

    /// Set value-fit minibatch size
    pub fn value_batch_size(mut self, size: usize) -> Self {
        self.value_batch_size = size;
        self
    }

    /// Enable or disable advantage standardization
    pub fn normalize_advantages(mut self, normalize: bool) -> Self {
        self.normalize_advantages = normalize;
        self
    }
}
