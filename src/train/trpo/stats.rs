//! Diagnostics of TRPO updates and training iterations

use crate::buffer::CollectStats;

/// How a policy update ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepStatus {
    /// A line-search candidate was accepted
    Accepted,
    /// No candidate passed; parameters were restored
    Rejected,
    /// The policy gradient was zero; nothing was changed
    #[default]
    Skipped,
}

impl StepStatus {
    /// Numeric code for scalar logging (1 accepted, 0 rejected, -1 skipped)
    pub fn code(self) -> f64 {
        match self {
            StepStatus::Accepted => 1.0,
            StepStatus::Rejected => 0.0,
            StepStatus::Skipped => -1.0,
        }
    }
}

/// Diagnostics of one policy step
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolicyStepStats {
    /// Outcome of the step
    pub status: StepStatus,
    /// Surrogate objective before the step
    pub surrogate_before: f64,
    /// Surrogate objective after the step (equal to before unless accepted)
    pub surrogate_after: f64,
    /// Mean KL between the pre-step and post-step policy
    pub kl: f64,
    /// Euclidean norm of the policy gradient
    pub grad_norm: f64,
    /// Curvature `xᵀFx` of the conjugate-gradient solution
    pub curvature: f64,
    /// Conjugate-gradient iterations performed
    pub cg_iterations: usize,
    /// Final squared conjugate-gradient residual
    pub cg_residual: f64,
    /// Fraction of the full step taken
    pub step_fraction: f64,
    /// Rejected line-search candidates
    pub backtracks: usize,
}

/// Diagnostics of the value-function fit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueFitStats {
    /// Mean squared error on the batch before fitting
    pub loss_before: f64,
    /// Mean squared error on the batch after fitting
    pub loss_after: f64,
    /// Adam steps taken
    pub num_updates: usize,
}

/// Diagnostics of one full TRPO update (value fit then policy step)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateStats {
    /// Value-function fit
    pub value: ValueFitStats,
    /// Policy step
    pub policy: PolicyStepStats,
}

/// Everything reported for one training iteration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IterationStats {
    /// Iteration index
    pub iteration: usize,
    /// Collection statistics
    pub collect: CollectStats,
    /// Update diagnostics
    pub update: UpdateStats,
    /// Wall-clock update time in seconds
    pub update_time: f64,
}

impl IterationStats {
    /// Reward metrics as `(name, value)` pairs
    pub fn reward_scalars(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("total_reward", self.collect.total_reward),
            ("average_reward", self.collect.avg_reward),
            ("min_reward", self.collect.min_episode_reward),
            ("max_reward", self.collect.max_episode_reward),
            ("num_steps", self.collect.num_steps as f64),
            ("num_episodes", self.collect.num_episodes as f64),
        ]
    }

    /// Update metrics as `(name, value)` pairs
    pub fn update_scalars(&self) -> Vec<(&'static str, f64)> {
        let policy = &self.update.policy;
        vec![
            ("value_loss", self.update.value.loss_after),
            ("surrogate_improvement", policy.surrogate_after - policy.surrogate_before),
            ("kl", policy.kl),
            ("grad_norm", policy.grad_norm),
            ("step_fraction", policy.step_fraction),
            ("backtracks", policy.backtracks as f64),
            ("cg_residual", policy.cg_residual),
            ("step_status", policy.status.code()),
        ]
    }
}
