//! Training algorithms
//!
//! This module implements the TRPO update and the agent that drives it.

pub mod agent;
pub mod trpo;

pub use agent::{AgentConfig, TrpoAgent};
pub use trpo::{IterationStats, StepStatus, TrpoConfig, UpdateStats};
