//! Parallel trajectory collection
//!
//! The [`Collector`] owns one environment and one seeded RNG per worker and
//! fans collection out with Rayon. Workers only see a frozen
//! [`PolicySnapshot`] and a read-only copy of the observation filter, so no
//! libtorch state crosses threads:
//!
//! ```text
//!   snapshot + filter ──┬── worker 0: env₀, rng(seed+0), filter replica ─┐
//!                       ├── worker 1: env₁, rng(seed+1), filter replica ─┼─▶ merge (worker order)
//!                       └── worker k: ...                               ─┘
//! ```
//!
//! Each worker collects whole episodes until it has at least its share of
//! `min_batch_size` transitions. After the barrier, batches are concatenated
//! in worker order and the main filter absorbs every worker's raw-state
//! statistics.

use std::time::Instant;

use anyhow::{bail, Result};
use rand::{rngs::StdRng, SeedableRng};
use rayon::prelude::*;
use tracing::debug;

use crate::{
    buffer::Trajectory,
    env::Environment,
    policy::PolicySnapshot,
    utils::{RunningStat, ZFilter},
};

/// Upper bound on episode length for environments without their own limit
pub const MAX_EPISODE_STEPS: usize = 10_000;

/// Statistics of one collection round
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectStats {
    /// Transitions collected
    pub num_steps: usize,
    /// Episodes completed
    pub num_episodes: usize,
    /// Sum of all episode rewards
    pub total_reward: f64,
    /// Mean episode reward
    pub avg_reward: f64,
    /// Lowest episode reward
    pub min_episode_reward: f64,
    /// Highest episode reward
    pub max_episode_reward: f64,
    /// Wall-clock collection time in seconds
    pub sample_time: f64,
}

impl CollectStats {
    fn from_episodes(num_steps: usize, episode_rewards: &[f64], sample_time: f64) -> Self {
        let num_episodes = episode_rewards.len();
        if num_episodes == 0 {
            return Self { num_steps, sample_time, ..Default::default() };
        }
        let total_reward: f64 = episode_rewards.iter().sum();
        Self {
            num_steps,
            num_episodes,
            total_reward,
            avg_reward: total_reward / num_episodes as f64,
            min_episode_reward: episode_rewards.iter().cloned().fold(f64::INFINITY, f64::min),
            max_episode_reward: episode_rewards.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            sample_time,
        }
    }
}

struct Worker<E> {
    env: E,
    rng: StdRng,
}

struct WorkerBatch {
    trajectory: Trajectory,
    episode_rewards: Vec<f64>,
    observed: RunningStat,
}

impl<E: Environment> Worker<E> {
    fn run(
        &mut self,
        snapshot: &PolicySnapshot,
        filter: &ZFilter,
        quota: usize,
        render: bool,
    ) -> Result<WorkerBatch> {
        let mut replica = filter.clone();
        let mut observed = RunningStat::new(filter.dim());
        let mut trajectory = Trajectory::with_capacity(quota);
        let mut episode_rewards = Vec::new();

        while trajectory.len() < quota {
            let raw = self.env.reset()?;
            observed.push(&raw);
            let mut state = replica.apply(&raw, true);
            let mut episode_reward = 0.0;

            for t in 0..MAX_EPISODE_STEPS {
                let (action, log_prob) = snapshot.action_and_log_prob(&state, &mut self.rng)?;
                let result = self.env.step(&action)?;
                if render {
                    self.env.render();
                }
                episode_reward += result.reward;

                observed.push(&result.observation);
                let next_state = replica.apply(&result.observation, true);

                let done = result.done() || t + 1 == MAX_EPISODE_STEPS;
                let mask = if done { 0.0 } else { 1.0 };
                trajectory.push(state, action, result.reward, mask, log_prob);

                if done {
                    break;
                }
                state = next_state;
            }
            episode_rewards.push(episode_reward);
        }

        Ok(WorkerBatch { trajectory, episode_rewards, observed })
    }
}

/// Seeded, parallel rollout collector
pub struct Collector<E: Environment> {
    workers: Vec<Worker<E>>,
    render: bool,
}

impl<E: Environment + Send> Collector<E> {
    /// Create a collector with `num_workers` environments
    ///
    /// Worker `i` seeds its environment and its sampling RNG with `seed + i`.
    ///
    /// # Arguments
    ///
    /// * `env_fn` - Factory function to create environment instances
    /// * `num_workers` - Number of parallel workers (at least one)
    /// * `seed` - Base seed
    pub fn new<F>(env_fn: F, num_workers: usize, seed: u64) -> Result<Self>
    where
        F: Fn() -> E,
    {
        if num_workers == 0 {
            bail!("collector needs at least one worker");
        }
        let workers = (0..num_workers as u64)
            .map(|i| {
                let mut env = env_fn();
                env.seed(seed.wrapping_add(i));
                Worker { env, rng: StdRng::seed_from_u64(seed.wrapping_add(i)) }
            })
            .collect();
        Ok(Self { workers, render: false })
    }

    /// Render every step of worker environments
    pub fn with_render(mut self, render: bool) -> Self {
        self.render = render;
        self
    }

    /// Collect at least `min_batch_size` transitions of whole episodes
    ///
    /// States are normalized by `filter` as they are observed; afterwards
    /// `filter` has absorbed the statistics of every raw state seen.
    pub fn collect(
        &mut self,
        snapshot: &PolicySnapshot,
        filter: &mut ZFilter,
        min_batch_size: usize,
    ) -> Result<(Trajectory, CollectStats)> {
        let start = Instant::now();
        let num_workers = self.workers.len();
        let quota = min_batch_size.div_ceil(num_workers).max(1);
        let render = self.render;

        let shared: &ZFilter = filter;
        let batches = self
            .workers
            .par_iter_mut()
            .map(|worker| worker.run(snapshot, shared, quota, render))
            .collect::<Result<Vec<_>>>()?;

        let mut trajectory = Trajectory::with_capacity(quota * num_workers);
        let mut episode_rewards = Vec::new();
        for batch in batches {
            trajectory.extend(batch.trajectory);
            episode_rewards.extend(batch.episode_rewards);
            filter.absorb(&batch.observed);
        }

        let stats = CollectStats::from_episodes(
            trajectory.len(),
            &episode_rewards,
            start.elapsed().as_secs_f64(),
        );
        debug!(
            workers = num_workers,
            steps = stats.num_steps,
            episodes = stats.num_episodes,
            "collection finished"
        );
        Ok((trajectory, stats))
    }

    /// Number of workers
    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    /// Close every worker environment
    pub fn close(&mut self) {
        for worker in &mut self.workers {
            worker.env.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        env::{cartpole::CartPole, Action, SpaceInfo, SpaceType, StepInfo, StepResult},
        policy::{CategoricalPolicy, MlpConfig, StochasticPolicy},
        train::{AgentConfig, TrpoAgent},
        utils::NullSink,
    };

    /// Four-dimensional discrete environment whose simulator breaks mid-episode
    #[derive(Debug, Default)]
    struct FailingEnv {
        steps: usize,
    }

    impl Environment for FailingEnv {
        fn id(&self) -> &str {
            "Failing-v0"
        }

        fn reset(&mut self) -> Result<Vec<f64>> {
            self.steps = 0;
            Ok(vec![0.0; 4])
        }

        fn step(&mut self, _action: &Action) -> Result<StepResult> {
            self.steps += 1;
            if self.steps > 3 {
                bail!("simulator diverged");
            }
            Ok(StepResult {
                observation: vec![self.steps as f64; 4],
                reward: 1.0,
                terminated: false,
                truncated: false,
                info: StepInfo { episode_steps: self.steps },
            })
        }

        fn seed(&mut self, _seed: u64) {}

        fn observation_space(&self) -> SpaceInfo {
            SpaceInfo { shape: vec![4], space_type: SpaceType::Continuous }
        }

        fn action_space(&self) -> SpaceInfo {
            SpaceInfo { shape: vec![], space_type: SpaceType::Discrete(2) }
        }
    }

    fn snapshot() -> PolicySnapshot {
        CategoricalPolicy::new(4, 2, &MlpConfig { hidden_sizes: vec![8], ..Default::default() })
            .snapshot()
            .unwrap()
    }

    #[test]
    fn test_collects_whole_episodes() {
        let mut collector = Collector::new(CartPole::new, 3, 7).unwrap();
        let mut filter = ZFilter::new(4, Some(5.0));
        let (batch, stats) = collector.collect(&snapshot(), &mut filter, 200).unwrap();

        assert!(batch.len() >= 200);
        assert_eq!(stats.num_steps, batch.len());
        assert_eq!(stats.num_episodes, batch.num_episodes());
        assert_eq!(batch.masks().last(), Some(&0.0));
        assert!(stats.min_episode_reward <= stats.avg_reward);
        assert!(stats.avg_reward <= stats.max_episode_reward);
        // CartPole pays 1 per step, so rewards add up to the step count
        assert!((stats.total_reward - batch.len() as f64).abs() < 1e-9);
    }

    #[test]
    fn test_filter_absorbs_every_observation() {
        let mut collector = Collector::new(CartPole::new, 2, 1).unwrap();
        let mut filter = ZFilter::new(4, Some(5.0));
        let (batch, stats) = collector.collect(&snapshot(), &mut filter, 50).unwrap();
        // One reset observation per episode plus one per step
        assert_eq!(filter.stats().count() as usize, batch.len() + stats.num_episodes);
        assert!(batch.states().iter().flatten().all(|x| x.abs() <= 5.0));
    }

    #[test]
    fn test_same_seed_same_batch() {
        let snap = snapshot();
        let run = || {
            let mut collector = Collector::new(CartPole::new, 2, 42).unwrap();
            let mut filter = ZFilter::new(4, Some(5.0));
            collector.collect(&snap, &mut filter, 100).unwrap().0
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_environment_error_is_fatal() {
        let mut collector = Collector::new(FailingEnv::default, 2, 0).unwrap();
        let mut filter = ZFilter::new(4, Some(5.0));
        let err = collector.collect(&snapshot(), &mut filter, 50).unwrap_err();
        assert!(err.to_string().contains("simulator diverged"), "{}", err);
        // Nothing is absorbed from a failed round
        assert_eq!(filter.stats().count(), 0);
    }

    #[test]
    fn test_environment_error_aborts_learning() {
        let config = AgentConfig::new("Failing-v0")
            .min_batch_size(32)
            .num_workers(2)
            .hidden_sizes(vec![8]);
        let mut agent = TrpoAgent::new(config, FailingEnv::default).unwrap();
        let before = agent.policy().flat_params().unwrap();

        assert!(agent.learn(0, &mut NullSink).is_err());
        assert_eq!(agent.policy().flat_params().unwrap(), before);
    }

    #[test]
    fn test_zero_workers_rejected() {
        assert!(Collector::new(CartPole::new, 0, 0).is_err());
    }
}
