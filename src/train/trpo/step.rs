//! The constrained policy update
//!
//! ```text
//! L(θ)  = mean(exp(log π_θ(a|s) - log π_old(a|s)) · A)      surrogate
//! g     = ∇θ L
//! F·v   = ∇θ((∇θ KL(π_sg ‖ π_θ)) · v) + damping · v         Fisher-vector product
//! x     ≈ F⁻¹ g                                             conjugate gradient
//! β     = sqrt(2 · max_kl / xᵀFx)
//! θ_new = θ + shrink^k · β · x                              backtracking line search
//! ```
//!
//! The Fisher matrix is never materialized: every product is one double
//! backward pass through the mean KL of the current policy against a
//! detached copy of itself.

use anyhow::Result;
use rand::Rng;
use tch::{nn, Kind, Tensor};
use tracing::{debug, warn};

use super::{
    cg::{conjugate_gradient, dot},
    config::TrpoConfig,
    line_search::{backtracking_line_search, LineSearchConfig, LineSearchOutcome, Trial},
    stats::{PolicyStepStats, StepStatus, UpdateStats},
    value_fit::fit_value,
};
use crate::{
    error::{ensure_finite, TrpoError},
    policy::{flat, PolicyDistribution, StochasticPolicy, ValueNetwork},
};

/// Tensors the policy step consumes, all with leading dimension N
#[derive(Debug)]
pub struct PolicyBatch<'a> {
    /// States `[N, obs_dim]`
    pub states: &'a Tensor,
    /// Actions, `[N, action_dim]` doubles or `[N]` int64 indices
    pub actions: &'a Tensor,
    /// Advantages `[N]`, already standardized if desired
    pub advantages: &'a Tensor,
    /// Log-probabilities under the collecting policy `[N]`
    pub old_log_probs: &'a Tensor,
}

/// Surrogate objective `mean(ratio · A) - ½·c·‖θ‖²`
pub fn surrogate<P: StochasticPolicy>(
    policy: &P,
    batch: &PolicyBatch<'_>,
    policy_l2_reg: Option<f64>,
) -> Tensor {
    let log_probs = policy.log_prob(batch.states, batch.actions);
    let ratio = (log_probs - batch.old_log_probs).exp();
    let objective = (ratio * batch.advantages).mean(Kind::Double);
    match policy_l2_reg {
        Some(c) if c > 0.0 => {
            let norm_sq = policy
                .parameters()
                .iter()
                .map(|p| p.square().sum(Kind::Double))
                .reduce(|acc, s| acc + s)
                .unwrap_or_else(|| Tensor::from(0.0_f64));
            objective - norm_sq * (0.5 * c)
        }
        _ => objective,
    }
}

/// Mean KL from `reference` to the policy's current distribution
pub fn mean_kl<P: StochasticPolicy>(
    policy: &P,
    reference: &PolicyDistribution,
    states: &Tensor,
) -> Result<Tensor> {
    Ok(reference.kl(&policy.distribution(states))?.mean(Kind::Double))
}

/// Damped Fisher-vector product `F·v + damping·v`
///
/// `v` is a flat double tensor with one entry per policy parameter.
pub fn fisher_vector_product<P: StochasticPolicy>(
    policy: &P,
    states: &Tensor,
    v: &Tensor,
    damping: f64,
) -> Result<Tensor> {
    let params = policy.parameters();
    let dist = policy.distribution(states);
    let kl = dist.detach().kl(&dist)?.mean(Kind::Double);

    let grads = flat::flat_grad(&kl, &params, true)?;
    let grad_v = (grads * v).sum(Kind::Double);
    let hvp = flat::flat_grad(&grad_v, &params, false)?;
    Ok(hvp + v * damping)
}

fn scalar(t: &Tensor) -> Result<f64> {
    Ok(f64::try_from(t)?)
}

/// One trust-region step on the policy, in place
///
/// Returns the step diagnostics. An exhausted line search restores the
/// parameters exactly and is reported as [`StepStatus::Rejected`]; a zero
/// gradient leaves them untouched and is reported as [`StepStatus::Skipped`].
///
/// # Errors
///
/// [`TrpoError::NonFinite`] when the gradient, a Fisher-vector product or the
/// conjugate-gradient solution contain NaN or infinity, and
/// [`TrpoError::NonPositiveCurvature`] when the damped Fisher matrix is not
/// positive definite along a conjugate-gradient direction or `xᵀFx <= 0`.
pub fn policy_step<P: StochasticPolicy>(
    policy: &mut P,
    batch: &PolicyBatch<'_>,
    config: &TrpoConfig,
) -> Result<PolicyStepStats> {
    let params = policy.parameters();
    let x0 = policy.flat_params()?;
    let reference = tch::no_grad(|| policy.distribution(batch.states)).detach();

    let loss = surrogate(policy, batch, config.policy_l2_reg);
    let surrogate_before = scalar(&loss)?;
    let grad = flat::to_vec(&flat::flat_grad(&loss, &params, false)?)?;
    ensure_finite(&grad, "policy gradient")?;

    let grad_norm = dot(&grad, &grad).sqrt();
    if grad_norm == 0.0 {
        debug!("zero policy gradient, skipping update");
        return Ok(PolicyStepStats {
            status: StepStatus::Skipped,
            surrogate_before,
            surrogate_after: surrogate_before,
            ..Default::default()
        });
    }

    let fvp = |v: &[f64]| -> Result<Vec<f64>> {
        let v = Tensor::f_from_slice(v)?;
        let product = fisher_vector_product(&*policy, batch.states, &v, config.damping)?;
        let product = flat::to_vec(&product)?;
        ensure_finite(&product, "fisher-vector product")?;
        Ok(product)
    };

    let solution = conjugate_gradient(&fvp, &grad, config.cg_iters, config.cg_residual_tol)?;
    ensure_finite(&solution.x, "conjugate gradient solution")?;

    let curvature = dot(&solution.x, &fvp(&solution.x)?);
    if !curvature.is_finite() {
        return Err(TrpoError::NonFinite { stage: "curvature" }.into());
    }
    if curvature <= 0.0 {
        return Err(TrpoError::NonPositiveCurvature { value: curvature }.into());
    }

    let beta = (2.0 * config.max_kl / curvature).sqrt();
    let full_step: Vec<f64> = solution.x.iter().map(|x| beta * x).collect();
    debug!(
        cg_iterations = solution.iterations,
        cg_residual = solution.residual,
        curvature,
        beta,
        expected_improvement = beta * dot(&grad, &solution.x),
        "natural gradient step"
    );

    let search = LineSearchConfig {
        max_kl: config.max_kl,
        shrink: config.line_search_shrink,
        max_backtracks: config.line_search_max_backtracks,
    };
    let outcome = backtracking_line_search(&x0, &full_step, surrogate_before, &search, |candidate| {
        policy.set_flat_params(candidate)?;
        tch::no_grad(|| -> Result<Trial> {
            let objective = scalar(&surrogate(&*policy, batch, config.policy_l2_reg))?;
            let kl = scalar(&mean_kl(&*policy, &reference, batch.states)?)?;
            Ok(Trial { surrogate: objective, kl })
        })
    })?;

    let mut stats = PolicyStepStats {
        surrogate_before,
        grad_norm,
        curvature,
        cg_iterations: solution.iterations,
        cg_residual: solution.residual,
        ..Default::default()
    };

    match outcome {
        LineSearchOutcome::Accepted { step_fraction, backtracks, trial, .. } => {
            stats.status = StepStatus::Accepted;
            stats.surrogate_after = trial.surrogate;
            stats.kl = trial.kl;
            stats.step_fraction = step_fraction;
            stats.backtracks = backtracks;
        }
        LineSearchOutcome::Exhausted { attempts } => {
            policy.set_flat_params(&x0)?;
            warn!(attempts, "line search found no acceptable step, keeping previous policy");
            stats.status = StepStatus::Rejected;
            stats.surrogate_after = surrogate_before;
            stats.backtracks = attempts;
        }
    }

    Ok(stats)
}

/// Full TRPO update: fit the value network, then take a policy step
///
/// `advantages` are used as given; standardizing them is the caller's
/// choice.
#[allow(clippy::too_many_arguments)]
pub fn trpo_step<P: StochasticPolicy, R: Rng + ?Sized>(
    policy: &mut P,
    value: &ValueNetwork,
    value_optimizer: &mut nn::Optimizer,
    states: &Tensor,
    actions: &Tensor,
    returns: &Tensor,
    advantages: &Tensor,
    old_log_probs: &Tensor,
    config: &TrpoConfig,
    rng: &mut R,
) -> Result<UpdateStats> {
    let value_stats = fit_value(value, value_optimizer, states, returns, config, rng)?;
    let batch = PolicyBatch { states, actions, advantages, old_log_probs };
    let policy_stats = policy_step(policy, &batch, config)?;
    Ok(UpdateStats { value: value_stats, policy: policy_stats })
}
