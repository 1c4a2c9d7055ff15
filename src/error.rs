//! Typed failures of the training core
//!
//! Everything fallible in the crate returns `anyhow::Result`. The failures a
//! caller may want to tell apart (a numerically broken update, an unusable
//! checkpoint) are raised as [`TrpoError`] inside the `anyhow::Error`, so
//! they can be recovered with `err.downcast_ref::<TrpoError>()`.

use std::path::PathBuf;

use thiserror::Error;

/// Fatal conditions raised by the TRPO core
#[derive(Debug, Error)]
pub enum TrpoError {
    /// A NaN or infinity appeared in a quantity the update depends on
    #[error("non-finite values in {stage}")]
    NonFinite {
        /// Which quantity was corrupted (policy gradient, Fisher-vector
        /// product, conjugate-gradient solution, ...)
        stage: &'static str,
    },

    /// The quadratic form `x·F·x` used to scale the step was not positive
    #[error("non-positive curvature x·F·x = {value:e}")]
    NonPositiveCurvature {
        /// The offending value of `x·F·x`
        value: f64,
    },

    /// A persisted model could not be restored
    #[error("failed to load model from {path}: {reason}")]
    ModelLoad {
        /// File that was being read
        path: PathBuf,
        /// Human-readable cause
        reason: String,
    },

    /// A configuration value is out of range
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Fail with [`TrpoError::NonFinite`] unless every value is finite
pub fn ensure_finite(values: &[f64], stage: &'static str) -> Result<(), TrpoError> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(TrpoError::NonFinite { stage })
    }
}
