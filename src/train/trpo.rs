//! Trust Region Policy Optimization (TRPO)
//!
//! This module implements the TRPO update for stochastic policies.
//! TRPO maximizes a surrogate objective subject to a bound on the KL
//! divergence between the old and new policy, which keeps every update
//! inside a region where the surrogate is trustworthy.
//!
//! # Algorithm Overview
//!
//! ```text
//! For each iteration:
//!   1. Collect trajectories using current policy
//!   2. Compute advantages using GAE
//!   3. Fit the value function to the returns (Adam)
//!   4. Policy step:
//!      a. Gradient of the importance-sampled surrogate
//!      b. Solve F x = g with conjugate gradient (Fisher-vector products)
//!      c. Scale x to the KL budget
//!      d. Backtracking line search on surrogate and KL
//! ```
//!
//! # References
//!
//! - [Trust Region Policy Optimization](https://arxiv.org/abs/1502.05477)
//! - [High-Dimensional Continuous Control Using Generalized Advantage Estimation](https://arxiv.org/abs/1506.02438)

pub mod cg;
pub mod config;
pub mod line_search;
pub mod stats;
pub mod step;
pub mod value_fit;

pub use cg::{conjugate_gradient, CgSolution};
pub use config::TrpoConfig;
pub use line_search::{backtracking_line_search, LineSearchConfig, LineSearchOutcome, Trial};
pub use stats::{IterationStats, PolicyStepStats, StepStatus, UpdateStats, ValueFitStats};
pub use step::{fisher_vector_product, mean_kl, policy_step, surrogate, trpo_step, PolicyBatch};
pub use value_fit::{fit_value, generate_minibatch_indices};
