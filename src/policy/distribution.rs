//! Action distributions produced by a policy
//!
//! A [`PolicyDistribution`] holds the batched, differentiable parameters of
//! the action distribution for a batch of states. Everything is computed in
//! `Kind::Double`.

use std::f64::consts::PI;

use anyhow::{bail, Result};
use rand::Rng;
use rand_distr::{Distribution, Normal, WeightedIndex};
use tch::{Kind, Tensor};

/// Batched action distribution
#[derive(Debug)]
pub enum PolicyDistribution {
    /// Diagonal Gaussian over continuous actions
    Gaussian {
        /// Means [batch, action_dim]
        mean: Tensor,
        /// Log standard deviations [batch, action_dim]
        log_std: Tensor,
    },

    /// Categorical over discrete actions
    Categorical {
        /// Unnormalized logits [batch, num_actions]
        logits: Tensor,
    },
}

impl PolicyDistribution {
    /// Log-probability of each action in the batch, shape [batch]
    ///
    /// Continuous actions are `[batch, action_dim]` doubles; discrete actions
    /// are `[batch]` int64 indices.
    pub fn log_prob(&self, actions: &Tensor) -> Tensor {
        match self {
            PolicyDistribution::Gaussian { mean, log_std } => {
                let var = (log_std * 2.0).exp();
                let log_density = -(actions - mean).square() / (var * 2.0)
                    - log_std
                    - 0.5 * (2.0 * PI).ln();
                log_density.sum_dim_intlist(-1, false, Kind::Double)
            }
            PolicyDistribution::Categorical { logits } => logits
                .log_softmax(-1, Kind::Double)
                .gather(-1, &actions.to_kind(Kind::Int64).unsqueeze(-1), false)
                .squeeze_dim(-1),
        }
    }

    /// Per-sample `KL(self ‖ other)`, shape [batch]
    pub fn kl(&self, other: &PolicyDistribution) -> Result<Tensor> {
        match (self, other) {
            (
                PolicyDistribution::Gaussian { mean: mean0, log_std: log_std0 },
                PolicyDistribution::Gaussian { mean: mean1, log_std: log_std1 },
            ) => {
                let var0 = (log_std0 * 2.0).exp();
                let var1 = (log_std1 * 2.0).exp();
                let kl = log_std1 - log_std0 + (var0 + (mean0 - mean1).square()) / (var1 * 2.0)
                    - 0.5;
                Ok(kl.sum_dim_intlist(-1, false, Kind::Double))
            }
            (
                PolicyDistribution::Categorical { logits: logits0 },
                PolicyDistribution::Categorical { logits: logits1 },
            ) => {
                let log_p0 = logits0.log_softmax(-1, Kind::Double);
                let log_p1 = logits1.log_softmax(-1, Kind::Double);
                let kl = log_p0.exp() * (&log_p0 - log_p1);
                Ok(kl.sum_dim_intlist(-1, false, Kind::Double))
            }
            _ => bail!("cannot compare a Gaussian and a categorical distribution"),
        }
    }

    /// Copy with every parameter cut from the autograd graph
    pub fn detach(&self) -> Self {
        match self {
            PolicyDistribution::Gaussian { mean, log_std } => PolicyDistribution::Gaussian {
                mean: mean.detach(),
                log_std: log_std.detach(),
            },
            PolicyDistribution::Categorical { logits } => {
                PolicyDistribution::Categorical { logits: logits.detach() }
            }
        }
    }
}

/// Draw a continuous action from `N(mean, exp(log_std)²)`
///
/// Returns the action and its log-probability.
pub fn sample_gaussian<R: Rng + ?Sized>(
    mean: &[f64],
    log_std: &[f64],
    rng: &mut R,
) -> Result<(Vec<f64>, f64)> {
    debug_assert_eq!(mean.len(), log_std.len());
    let mut action = Vec::with_capacity(mean.len());
    for (&mu, &ls) in mean.iter().zip(log_std) {
        let normal = Normal::new(mu, ls.exp())?;
        action.push(normal.sample(rng));
    }
    let log_prob = gaussian_log_prob(mean, log_std, &action);
    Ok((action, log_prob))
}

/// Log-density of a diagonal Gaussian at `action`
pub fn gaussian_log_prob(mean: &[f64], log_std: &[f64], action: &[f64]) -> f64 {
    mean.iter()
        .zip(log_std)
        .zip(action)
        .map(|((&mu, &ls), &a)| {
            let var = (2.0 * ls).exp();
            -(a - mu).powi(2) / (2.0 * var) - ls - 0.5 * (2.0 * PI).ln()
        })
        .sum()
}

/// Draw a discrete action from softmax(`logits`)
///
/// Returns the index and its log-probability.
pub fn sample_categorical<R: Rng + ?Sized>(logits: &[f64], rng: &mut R) -> Result<(i64, f64)> {
    let log_probs = log_softmax(logits);
    let probs: Vec<f64> = log_probs.iter().map(|lp| lp.exp()).collect();
    let index = WeightedIndex::new(&probs)?.sample(rng);
    Ok((index as i64, log_probs[index]))
}

/// Numerically stable log-softmax
pub fn log_softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let log_sum = logits.iter().map(|&l| (l - max).exp()).sum::<f64>().ln() + max;
    logits.iter().map(|&l| l - log_sum).collect()
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    fn scalar(t: &Tensor) -> f64 {
        f64::try_from(t).unwrap()
    }

    #[test]
    fn test_gaussian_log_prob_matches_closed_form() {
        let mean = Tensor::from_slice(&[0.5_f64, -1.0]).view([1, 2]);
        let log_std = Tensor::from_slice(&[0.0_f64, 0.3]).view([1, 2]);
        let actions = Tensor::from_slice(&[1.0_f64, 0.0]).view([1, 2]);
        let dist = PolicyDistribution::Gaussian { mean, log_std };

        let lp = scalar(&dist.log_prob(&actions).sum(Kind::Double));
        let expected = gaussian_log_prob(&[0.5, -1.0], &[0.0, 0.3], &[1.0, 0.0]);
        assert!((lp - expected).abs() < 1e-12);
    }

    #[test]
    fn test_categorical_log_prob() {
        let logits = Tensor::from_slice(&[0.0_f64, 0.0, 0.0, 1.0, 2.0, 3.0]).view([2, 3]);
        let dist = PolicyDistribution::Categorical { logits };
        let actions = Tensor::from_slice(&[1_i64, 2]);

        let lp: Vec<f64> = Vec::try_from(dist.log_prob(&actions)).unwrap();
        assert!((lp[0] - (1.0_f64 / 3.0).ln()).abs() < 1e-12);
        assert!((lp[1] - log_softmax(&[1.0, 2.0, 3.0])[2]).abs() < 1e-12);
    }

    #[test]
    fn test_kl_of_identical_distributions_is_zero() {
        let mean = Tensor::from_slice(&[0.1_f64, 0.2, 0.3, 0.4]).view([2, 2]);
        let log_std = Tensor::from_slice(&[0.0_f64, -0.5, 0.2, 0.1]).view([2, 2]);
        let p = PolicyDistribution::Gaussian { mean, log_std };
        let kl: Vec<f64> = Vec::try_from(p.kl(&p.detach()).unwrap()).unwrap();
        assert!(kl.iter().all(|k| k.abs() < 1e-12));
    }

    #[test]
    fn test_gaussian_kl_closed_form() {
        // KL(N(0,1) ‖ N(1, e²)) = 1 + (1 + 1) / (2e²) - 0.5
        let p = PolicyDistribution::Gaussian {
            mean: Tensor::from_slice(&[0.0_f64]).view([1, 1]),
            log_std: Tensor::from_slice(&[0.0_f64]).view([1, 1]),
        };
        let q = PolicyDistribution::Gaussian {
            mean: Tensor::from_slice(&[1.0_f64]).view([1, 1]),
            log_std: Tensor::from_slice(&[1.0_f64]).view([1, 1]),
        };
        let kl = scalar(&p.kl(&q).unwrap().sum(Kind::Double));
        let e2 = std::f64::consts::E.powi(2);
        assert!((kl - (1.0 + 2.0 / (2.0 * e2) - 0.5)).abs() < 1e-12);
    }

    #[test]
    fn test_categorical_kl_is_positive() {
        let p = PolicyDistribution::Categorical {
            logits: Tensor::from_slice(&[0.0_f64, 1.0]).view([1, 2]),
        };
        let q = PolicyDistribution::Categorical {
            logits: Tensor::from_slice(&[1.0_f64, 0.0]).view([1, 2]),
        };
        assert!(scalar(&p.kl(&q).unwrap().sum(Kind::Double)) > 0.0);
    }

    #[test]
    fn test_kl_rejects_mixed_kinds() {
        let p = PolicyDistribution::Categorical {
            logits: Tensor::from_slice(&[0.0_f64, 1.0]).view([1, 2]),
        };
        let q = PolicyDistribution::Gaussian {
            mean: Tensor::from_slice(&[0.0_f64]).view([1, 1]),
            log_std: Tensor::from_slice(&[0.0_f64]).view([1, 1]),
        };
        assert!(p.kl(&q).is_err());
    }

    #[test]
    fn test_sample_categorical_respects_support() {
        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..100 {
            let (a, lp) = sample_categorical(&[0.0, 50.0, -50.0], &mut rng).unwrap();
            assert_eq!(a, 1);
            assert!(lp <= 0.0);
        }
    }

    #[test]
    fn test_sample_gaussian_is_reproducible() {
        let mut rng_a = StdRng::seed_from_u64(11);
        let mut rng_b = StdRng::seed_from_u64(11);
        let a = sample_gaussian(&[0.0, 1.0], &[0.0, -1.0], &mut rng_a).unwrap();
        let b = sample_gaussian(&[0.0, 1.0], &[0.0, -1.0], &mut rng_b).unwrap();
        assert_eq!(a, b);
        assert!((a.1 - gaussian_log_prob(&[0.0, 1.0], &[0.0, -1.0], &a.0)).abs() < 1e-12);
    }
}
