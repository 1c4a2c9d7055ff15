//! Observation normalization for stable RL training
//!
//! This module provides a running mean and standard deviation tracker and a
//! z-score filter built on top of it. The filter is an explicit value owned by
//! the training loop and persisted with the model; nothing here is global.
//!
//! Parallel collection works on replicas: every worker gets a [`ZFilter`]
//! clone plus a fresh [`RunningStat`] recording what it observed, and the
//! main filter absorbs those statistics once the workers are done
//! ([`ZFilter::absorb`]).

use serde::{Deserialize, Serialize};

/// Running mean and variance over fixed-length vectors
///
/// Uses Welford's online algorithm for single observations and Chan's
/// parallel formula to merge two sets of statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunningStat {
    count: u64,
    mean: Vec<f64>,
    m2: Vec<f64>,
}

impl RunningStat {
    /// Create empty statistics for vectors of `size` elements
    pub fn new(size: usize) -> Self {
        Self { count: 0, mean: vec![0.0; size], m2: vec![0.0; size] }
    }

    /// Add one observation
    pub fn push(&mut self, x: &[f64]) {
        debug_assert_eq!(x.len(), self.mean.len(), "observation dimension mismatch");
        self.count += 1;
        let n = self.count as f64;
        for ((mean, m2), &val) in self.mean.iter_mut().zip(&mut self.m2).zip(x) {
            let delta = val - *mean;
            *mean += delta / n;
            *m2 += delta * (val - *mean);
        }
    }

    /// Merge another set of statistics into this one
    pub fn merge(&mut self, other: &RunningStat) {
        debug_assert_eq!(other.mean.len(), self.mean.len(), "dimension mismatch");
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = other.clone();
            return;
        }

        let n_a = self.count as f64;
        let n_b = other.count as f64;
        let total = n_a + n_b;

        for i in 0..self.mean.len() {
            let delta = other.mean[i] - self.mean[i];
            self.mean[i] += delta * n_b / total;
            self.m2[i] += other.m2[i] + delta * delta * n_a * n_b / total;
        }
        self.count += other.count;
    }

    /// Number of observations seen
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Current mean
    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    /// Sample variance (unbiased); the squared mean for a single sample
    pub fn var(&self) -> Vec<f64> {
        match self.count {
            0 => vec![0.0; self.mean.len()],
            1 => self.mean.iter().map(|m| m * m).collect(),
            n => self.m2.iter().map(|m2| m2 / (n as f64 - 1.0)).collect(),
        }
    }

    /// Square root of [`RunningStat::var`]
    pub fn std(&self) -> Vec<f64> {
        self.var().into_iter().map(f64::sqrt).collect()
    }

    /// Vector dimensionality
    pub fn dim(&self) -> usize {
        self.mean.len()
    }
}

/// Z-score filter: `y = clip((x - mean) / (std + eps), -clip, clip)`
///
/// Calling [`ZFilter::apply`] with `update = true` first folds `x` into the
/// running statistics, then normalizes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZFilter {
    stats: RunningStat,
    demean: bool,
    destd: bool,
    clip: Option<f64>,
    epsilon: f64,
}

impl ZFilter {
    /// Create a filter for observations of `size` elements
    ///
    /// # Arguments
    /// * `size` - Dimension of observations
    /// * `clip` - Symmetric bound applied after normalization
    pub fn new(size: usize, clip: Option<f64>) -> Self {
        Self { stats: RunningStat::new(size), demean: true, destd: true, clip, epsilon: 1e-8 }
    }

    /// Enable or disable mean subtraction
    pub fn demean(mut self, demean: bool) -> Self {
        self.demean = demean;
        self
    }

    /// Enable or disable division by the running standard deviation
    pub fn destd(mut self, destd: bool) -> Self {
        self.destd = destd;
        self
    }

    /// Normalize an observation, optionally updating the statistics first
    pub fn apply(&mut self, x: &[f64], update: bool) -> Vec<f64> {
        if update {
            self.stats.push(x);
        }
        self.normalize(x)
    }

    /// Normalize without touching the statistics
    pub fn normalize(&self, x: &[f64]) -> Vec<f64> {
        let mean = self.stats.mean();
        let std = self.stats.std();
        x.iter()
            .enumerate()
            .map(|(i, &val)| {
                let mut y = val;
                if self.demean {
                    y -= mean[i];
                }
                if self.destd {
                    y /= std[i] + self.epsilon;
                }
                match self.clip {
                    Some(c) => y.clamp(-c, c),
                    None => y,
                }
            })
            .collect()
    }

    /// Fold statistics gathered elsewhere (e.g. by a collection worker)
    pub fn absorb(&mut self, observed: &RunningStat) {
        self.stats.merge(observed);
    }

    /// Current running statistics
    pub fn stats(&self) -> &RunningStat {
        &self.stats
    }

    /// Observation dimensionality
    pub fn dim(&self) -> usize {
        self.stats.dim()
    }
}
