//! TRPO agent: owns the networks, the observation filter and the collector
//!
//! One call to [`TrpoAgent::learn`] is one training iteration:
//!
//! ```text
//! snapshot policy → collect (parallel) → values of collected states
//!     → GAE → fit value network → trust-region policy step → log
//! ```
//!
//! The agent also evaluates the current policy on a separate environment
//! and persists `{policy, value, filter}` as one checkpoint keyed by the
//! environment id.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Instant,
};

use anyhow::{Context, Result};
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use tch::{nn, Tensor};

use super::trpo::{trpo_step, IterationStats, TrpoConfig};
use crate::{
    buffer::{collector::MAX_EPISODE_STEPS, estimate_advantages, standardize, Collector},
    checkpoint::{ActionKind, Checkpoint},
    env::{self, BuiltinEnv, Environment, SpaceInfo, SpaceType},
    error::TrpoError,
    policy::{Activation, MlpConfig, Policy, StochasticPolicy, ValueNetwork},
    utils::{MetricSink, ZFilter},
};

/// Agent configuration
///
/// Defaults match the reference TRPO setup: 2048 transitions per iteration,
/// a single worker and seed 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Environment id, used by [`TrpoAgent::from_config`]
    pub env_id: String,

    /// Minimum transitions collected per iteration
    pub min_batch_size: usize,

    /// Parallel collection workers
    pub num_workers: usize,

    /// Base seed for network initialization, environments and sampling
    pub seed: u64,

    /// Render environments while collecting and evaluating
    pub render: bool,

    /// Directory to load a checkpoint from at construction
    pub model_path: Option<PathBuf>,

    /// Hidden-layer widths shared by the policy and value networks
    pub hidden_sizes: Vec<i64>,

    /// Hidden-layer nonlinearity
    pub activation: Activation,

    /// Bound applied to normalized observations
    pub obs_clip: Option<f64>,

    /// Let evaluation episodes update the observation filter
    pub update_normalizer_on_eval: bool,

    /// Update hyperparameters
    pub trpo: TrpoConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        let mlp = MlpConfig::default();
        Self {
            env_id: "CartPole-v1".to_string(),
            min_batch_size: 2048,
            num_workers: 1,
            seed: 1,
            render: false,
            model_path: None,
            hidden_sizes: mlp.hidden_sizes,
            activation: mlp.activation,
            obs_clip: Some(5.0),
            update_normalizer_on_eval: false,
            trpo: TrpoConfig::default(),
        }
    }
}

impl AgentConfig {
    /// Create a default configuration for `env_id`
    pub fn new(env_id: &str) -> Self {
        Self { env_id: env_id.to_string(), ..Self::default() }
    }

    /// Read a configuration from a JSON file; missing fields take defaults
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| -> Result<()> { Err(TrpoError::Config(msg.to_string()).into()) };
        if self.min_batch_size == 0 {
            return invalid("min_batch_size must be positive");
        }
        if self.num_workers == 0 {
            return invalid("num_workers must be positive");
        }
        if self.hidden_sizes.iter().any(|&h| h <= 0) {
            return invalid("hidden_sizes must be positive");
        }
        if matches!(self.obs_clip, Some(c) if c <= 0.0) {
            return invalid("obs_clip must be positive");
        }
        self.trpo.validate().map_err(|e| TrpoError::Config(e.to_string()).into())
    }

    /// Network architecture described by this configuration
    pub fn mlp(&self) -> MlpConfig {
        MlpConfig {
            hidden_sizes: self.hidden_sizes.clone(),
            activation: self.activation,
            ..Default::default()
        }
    }

    /// Set minimum batch size
    pub fn min_batch_size(mut self, size: usize) -> Self {
        self.min_batch_size = size;
        self
    }

    /// Set number of collection workers
    pub fn num_workers(mut self, workers: usize) -> Self {
        self.num_workers = workers;
        self
    }

    /// Set base seed
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set checkpoint directory to load at construction
    pub fn model_path<P: Into<PathBuf>>(mut self, path: Option<P>) -> Self {
        self.model_path = path.map(Into::into);
        self
    }

    /// Set hidden-layer widths
    pub fn hidden_sizes(mut self, sizes: Vec<i64>) -> Self {
        self.hidden_sizes = sizes;
        self
    }

    /// Set hidden-layer nonlinearity
    pub fn activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    /// Set update hyperparameters
    pub fn trpo(mut self, trpo: TrpoConfig) -> Self {
        self.trpo = trpo;
        self
    }
}

/// TRPO training agent
pub struct TrpoAgent<E: Environment> {
    config: AgentConfig,
    env_id: String,
    collector: Collector<E>,
    eval_env: E,
    observation_space: SpaceInfo,
    action_space: SpaceInfo,
    policy: Policy,
    value: ValueNetwork,
    value_optimizer: nn::Optimizer,
    filter: ZFilter,
    rng: StdRng,
}

impl TrpoAgent<BuiltinEnv> {
    /// Create an agent on the built-in environment named by `config.env_id`
    pub fn from_config(config: AgentConfig) -> Result<Self> {
        let prototype = env::make(&config.env_id)?;
        Self::new(config, move || prototype.clone())
    }
}

impl<E: Environment + Send> TrpoAgent<E> {
    /// Create an agent whose environments come from `env_fn`
    ///
    /// Checkpoints are keyed by the id the environments report. When
    /// `config.model_path` is set the checkpoint found there is loaded before
    /// returning; a missing or incompatible checkpoint fails with
    /// [`TrpoError::ModelLoad`].
    pub fn new<F>(config: AgentConfig, env_fn: F) -> Result<Self>
    where
        F: Fn() -> E,
    {
        config.validate()?;
        tch::manual_seed(config.seed as i64);

        let collector = Collector::new(&env_fn, config.num_workers, config.seed)?
            .with_render(config.render);
        let mut eval_env = env_fn();
        eval_env.seed(config.seed.wrapping_add(config.num_workers as u64));

        let env_id = eval_env.id().to_string();
        let observation_space = eval_env.observation_space();
        let action_space = eval_env.action_space();

        let mlp = config.mlp();
        let policy = Policy::for_spaces(&observation_space, &action_space, &mlp)?;
        let value = ValueNetwork::new(observation_space.dim() as i64, &mlp);
        let value_optimizer = value.optimizer(config.trpo.lr_v)?;
        let filter = ZFilter::new(observation_space.dim(), config.obs_clip);
        let rng = StdRng::seed_from_u64(config.seed);

        let mut agent = Self {
            config,
            env_id,
            collector,
            eval_env,
            observation_space,
            action_space,
            policy,
            value,
            value_optimizer,
            filter,
            rng,
        };

        if let Some(dir) = agent.config.model_path.clone() {
            tracing::info!("Loading saved model {}_trpo.bin from {}", agent.env_id, dir.display());
            agent.load(&dir)?;
        }

        tracing::info!(
            "TRPO agent on {} | policy params: {} | value params: {} | workers: {}",
            agent.env_id,
            agent.policy.num_params(),
            agent.value.parameters().iter().map(|p| p.numel()).sum::<usize>(),
            agent.collector.num_workers()
        );
        Ok(agent)
    }

    /// Run one training iteration and report it to `sink`
    pub fn learn(&mut self, iteration: usize, sink: &mut dyn MetricSink) -> Result<IterationStats> {
        let snapshot = self.policy.snapshot()?;
        let (batch, collect) =
            self.collector.collect(&snapshot, &mut self.filter, self.config.min_batch_size)?;

        tracing::info!(
            "Iter: {} | num steps: {} | total reward: {:.4} | min reward: {:.4} | max reward: {:.4} | average reward: {:.4} | sample time: {:.4}",
            iteration,
            collect.num_steps,
            collect.total_reward,
            collect.min_episode_reward,
            collect.max_episode_reward,
            collect.avg_reward,
            collect.sample_time
        );

        let start = Instant::now();
        let states = batch.states_tensor()?;
        let actions = batch.actions_tensor()?;
        let old_log_probs = batch.log_probs_tensor()?;

        let values = self.value.predict(&states)?;
        let trpo = &self.config.trpo;
        let (advantages, returns) =
            estimate_advantages(batch.rewards(), batch.masks(), &values, trpo.gamma, trpo.tau);
        let policy_advantages =
            if trpo.normalize_advantages { standardize(&advantages) } else { advantages };

        let update = trpo_step(
            &mut self.policy,
            &self.value,
            &mut self.value_optimizer,
            &states,
            &actions,
            &Tensor::f_from_slice(&returns)?,
            &Tensor::f_from_slice(&policy_advantages)?,
            &old_log_probs,
            trpo,
            &mut self.rng,
        )?;

        let update_time = start.elapsed().as_secs_f64();
        let stats = IterationStats { iteration, collect, update, update_time };

        tracing::info!(
            "Iter: {} | value loss: {:.4} | kl: {:.5} | surrogate: {:.4} -> {:.4} | step: {:?} ({} backtracks)",
            iteration,
            stats.update.value.loss_after,
            stats.update.policy.kl,
            stats.update.policy.surrogate_before,
            stats.update.policy.surrogate_after,
            stats.update.policy.status,
            stats.update.policy.backtracks
        );

        sink.add_scalars("train/reward", &stats.reward_scalars(), iteration)?;
        sink.add_scalars("train/update", &stats.update_scalars(), iteration)?;
        Ok(stats)
    }

    /// Play one episode with the current policy and return its reward
    ///
    /// Actions are sampled from the policy's distribution. The observation
    /// filter is only updated when `update_normalizer_on_eval` is set.
    pub fn evaluate(&mut self, iteration: usize) -> Result<f64> {
        let snapshot = self.policy.snapshot()?;
        let update = self.config.update_normalizer_on_eval;

        let raw = self.eval_env.reset()?;
        let mut state = self.filter.apply(&raw, update);
        let mut total_reward = 0.0;

        for _ in 0..MAX_EPISODE_STEPS {
            let (action, _) = snapshot.action_and_log_prob(&state, &mut self.rng)?;
            let result = self.eval_env.step(&action)?;
            if self.config.render {
                self.eval_env.render();
            }
            total_reward += result.reward;
            if result.done() {
                break;
            }
            state = self.filter.apply(&result.observation, update);
        }

        tracing::info!("Iter: {} | test reward: {:.4}", iteration, total_reward);
        Ok(total_reward)
    }

    /// Save policy, value network and filter to `{dir}/{env_id}_trpo.bin`
    pub fn save<P: AsRef<Path>>(&self, dir: P) -> Result<PathBuf> {
        let checkpoint = Checkpoint::new(
            &self.env_id,
            self.observation_space.dim(),
            self.action_kind(),
            self.config.mlp(),
            self.policy.flat_params()?,
            self.value.flat_params()?,
            self.filter.clone(),
        );
        checkpoint.save(dir)
    }

    /// Restore policy, value network and filter from `dir`
    ///
    /// Nothing is modified unless the whole checkpoint fits this agent.
    pub fn load<P: AsRef<Path>>(&mut self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        let checkpoint = Checkpoint::load(dir, &self.env_id)?;
        checkpoint
            .ensure_compatible(
                self.observation_space.dim(),
                self.action_kind(),
                &self.config.mlp(),
                self.policy.num_params(),
                self.value.parameters().iter().map(|p| p.numel()).sum(),
            )
            .map_err(|reason| TrpoError::ModelLoad {
                path: crate::checkpoint::checkpoint_path(dir, &self.env_id),
                reason,
            })?;

        self.policy.set_flat_params(&checkpoint.policy)?;
        self.value.set_flat_params(&checkpoint.value)?;
        self.filter = checkpoint.normalizer;
        Ok(())
    }

    /// Close all environments
    pub fn close(&mut self) {
        self.collector.close();
        self.eval_env.close();
    }

    fn action_kind(&self) -> ActionKind {
        match self.action_space.space_type {
            SpaceType::Discrete(n) => ActionKind::Discrete(n),
            SpaceType::Continuous => ActionKind::Continuous(self.action_space.dim()),
        }
    }

    /// Environment id used for checkpoints
    pub fn env_id(&self) -> &str {
        &self.env_id
    }

    /// Current policy
    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Current value network
    pub fn value(&self) -> &ValueNetwork {
        &self.value
    }

    /// Current observation filter
    pub fn filter(&self) -> &ZFilter {
        &self.filter
    }

    /// Configuration the agent was built with
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }
}
