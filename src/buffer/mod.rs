//! Experience storage and collection
//!
//! - [`trajectory`]: flat transition storage for one iteration's batch
//! - [`gae`]: Generalized Advantage Estimation over a batch
//! - [`collector`]: parallel, seeded rollout collection

pub mod collector;
pub mod gae;
pub mod trajectory;

pub use collector::{CollectStats, Collector};
pub use gae::{estimate_advantages, standardize};
pub use trajectory::Trajectory;
