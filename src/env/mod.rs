//! Environment traits and implementations
//!
//! This module defines the core environment interface consumed by the
//! trajectory collector and provides small built-in environments for
//! training and tests.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Action passed to [`Environment::step`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Action {
    /// Index into a finite action set
    Discrete(i64),

    /// Real-valued action vector
    Continuous(Vec<f64>),
}

impl Action {
    /// Discrete index, if this is a discrete action
    pub fn as_discrete(&self) -> Option<i64> {
        match self {
            Action::Discrete(a) => Some(*a),
            Action::Continuous(_) => None,
        }
    }

    /// Action vector, if this is a continuous action
    pub fn as_continuous(&self) -> Option<&[f64]> {
        match self {
            Action::Discrete(_) => None,
            Action::Continuous(a) => Some(a),
        }
    }
}

/// Core trait for RL environments
pub trait Environment {
    /// Identifier used to key persisted models (e.g. `CartPole-v1`)
    fn id(&self) -> &str;

    /// Reset the environment and return the initial observation
    fn reset(&mut self) -> Result<Vec<f64>>;

    /// Step the environment with an action
    fn step(&mut self, action: &Action) -> Result<StepResult>;

    /// Reseed the environment's random number generator
    fn seed(&mut self, seed: u64);

    /// Render the current state (no-op for headless environments)
    fn render(&mut self) {}

    /// Release any resources held by the environment
    fn close(&mut self) {}

    /// Get the observation space dimensions
    fn observation_space(&self) -> SpaceInfo;

    /// Get the action space dimensions
    fn action_space(&self) -> SpaceInfo;
}

/// Result of an environment step
#[derive(Debug, Clone)]
pub struct StepResult {
    /// Next observation
    pub observation: Vec<f64>,

    /// Reward received
    pub reward: f64,

    /// Whether the episode terminated
    pub terminated: bool,

    /// Whether the episode was truncated
    pub truncated: bool,

    /// Additional info
    pub info: StepInfo,
}

impl StepResult {
    /// Whether this step ended the episode for any reason
    pub fn done(&self) -> bool {
        self.terminated || self.truncated
    }
}

/// Space information for observations and actions
#[derive(Debug, Clone, PartialEq)]
pub struct SpaceInfo {
    /// Shape of the space
    pub shape: Vec<usize>,

    /// Data type
    pub space_type: SpaceType,
}

impl SpaceInfo {
    /// Flat dimensionality of one element of the space
    ///
    /// For a discrete space this is the number of choices.
    pub fn dim(&self) -> usize {
        match self.space_type {
            SpaceType::Discrete(n) => n,
            SpaceType::Continuous => self.shape.iter().product(),
        }
    }

    /// Whether the space is continuous
    pub fn is_continuous(&self) -> bool {
        matches!(self.space_type, SpaceType::Continuous)
    }
}

/// Space data types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpaceType {
    /// Discrete space with n options
    Discrete(usize),

    /// Continuous space (Box)
    Continuous,
}

/// Additional step information
#[derive(Debug, Clone, Default)]
pub struct StepInfo {
    /// Number of steps taken in the current episode
    pub episode_steps: usize,
}

/// One of the built-in environments, selected at runtime by id
#[derive(Debug, Clone)]
pub enum BuiltinEnv {
    /// `CartPole-v1`
    CartPole(cartpole::CartPole),
    /// `Pendulum-v1`
    Pendulum(pendulum::Pendulum),
}

/// Ids accepted by [`make`]
pub const BUILTIN_IDS: [&str; 2] = ["CartPole-v1", "Pendulum-v1"];

/// Build a built-in environment from its id
pub fn make(id: &str) -> Result<BuiltinEnv> {
    match id {
        "CartPole-v1" => Ok(BuiltinEnv::CartPole(cartpole::CartPole::new())),
        "Pendulum-v1" => Ok(BuiltinEnv::Pendulum(pendulum::Pendulum::new())),
        other => bail!("unknown environment {:?}, expected one of {:?}", other, BUILTIN_IDS),
    }
}

impl BuiltinEnv {
    fn inner(&self) -> &dyn Environment {
        match self {
            BuiltinEnv::CartPole(env) => env,
            BuiltinEnv::Pendulum(env) => env,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Environment {
        match self {
            BuiltinEnv::CartPole(env) => env,
            BuiltinEnv::Pendulum(env) => env,
        }
    }
}

impl Environment for BuiltinEnv {
    fn id(&self) -> &str {
        self.inner().id()
    }

    fn reset(&mut self) -> Result<Vec<f64>> {
        self.inner_mut().reset()
    }

    fn step(&mut self, action: &Action) -> Result<StepResult> {
        self.inner_mut().step(action)
    }

    fn seed(&mut self, seed: u64) {
        self.inner_mut().seed(seed)
    }

    fn render(&mut self) {
        self.inner_mut().render()
    }

    fn close(&mut self) {
        self.inner_mut().close()
    }

    fn observation_space(&self) -> SpaceInfo {
        self.inner().observation_space()
    }

    fn action_space(&self) -> SpaceInfo {
        self.inner().action_space()
    }
}

pub mod cartpole;
pub mod pendulum;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_space_dim() {
        let discrete = SpaceInfo { shape: vec![], space_type: SpaceType::Discrete(3) };
        assert_eq!(discrete.dim(), 3);
        assert!(!discrete.is_continuous());

        let boxed = SpaceInfo { shape: vec![2, 3], space_type: SpaceType::Continuous };
        assert_eq!(boxed.dim(), 6);
        assert!(boxed.is_continuous());
    }

    #[test]
    fn test_action_accessors() {
        assert_eq!(Action::Discrete(1).as_discrete(), Some(1));
        assert!(Action::Discrete(1).as_continuous().is_none());
        let a = Action::Continuous(vec![0.5]);
        assert_eq!(a.as_continuous(), Some(&[0.5][..]));
    }

    #[test]
    fn test_make_builtin() {
        for id in BUILTIN_IDS {
            let mut env = make(id).unwrap();
            assert_eq!(env.id(), id);
            assert_eq!(env.reset().unwrap().len(), env.observation_space().dim());
        }
        assert!(make("MountainCar-v0").is_err());
    }
}
