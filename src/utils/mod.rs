//! Utility functions and helpers

pub mod metrics;
pub mod normalize;

pub use metrics::{JsonLinesSink, MetricSink, NullSink, TracingSink};
pub use normalize::{RunningStat, ZFilter};
