//! # trpo-rl
//!
//! Trust Region Policy Optimization in Rust
//!
//! The crate trains stochastic policies with TRPO on top of tch-rs: a
//! natural-gradient step solved by conjugate gradient on Fisher-vector
//! products, scaled to a KL budget and checked by a backtracking line search.
//! Around that core it provides GAE, an Adam-fitted value baseline, a
//! running observation filter, parallel seeded collection and atomic
//! checkpoints.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use trpo_rl::prelude::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = AgentConfig::new("CartPole-v1").num_workers(4);
//! let mut agent = TrpoAgent::from_config(config)?;
//! let mut sink = TracingSink;
//!
//! for iteration in 0..100 {
//!     agent.learn(iteration, &mut sink)?;
//!     if iteration % 10 == 0 {
//!         agent.evaluate(iteration)?;
//!     }
//! }
//! agent.save("trained_models")?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Environment traits and implementations
pub mod env;

/// Policy and value networks
pub mod policy;

/// Experience storage, advantage estimation and collection
pub mod buffer;

/// Training algorithms (TRPO)
pub mod train;

/// Persisted training state
pub mod checkpoint;

/// Typed errors
pub mod error;

/// Utility functions and helpers
pub mod utils;

/// Prelude module for convenient imports
///
/// This module re-exports commonly used types and traits for convenience.
pub mod prelude {
    pub use crate::{
        buffer::{estimate_advantages, CollectStats, Collector, Trajectory},
        checkpoint::Checkpoint,
        env::{Action, Environment, StepResult},
        error::TrpoError,
        policy::{Policy, PolicySnapshot, StochasticPolicy, ValueNetwork},
        train::{AgentConfig, IterationStats, StepStatus, TrpoAgent, TrpoConfig},
        utils::{JsonLinesSink, MetricSink, NullSink, TracingSink, ZFilter},
    };
}

/// Current version of trpo-rl
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
