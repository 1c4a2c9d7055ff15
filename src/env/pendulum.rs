//! Pendulum-v1 environment
//!
//! Swing-up task with a continuous torque action. The observation is
//! `[cos θ, sin θ, θ̇]` to avoid the discontinuity of a wrapped angle.
//!
//! Reward: `-(θ² + 0.1·θ̇² + 0.001·u²)` with θ measured from upright.
//! Episodes never terminate; they are truncated after `max_steps` (200).

use std::f64::consts::PI;

use anyhow::{bail, Result};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::env::{Action, Environment, SpaceInfo, SpaceType, StepInfo, StepResult};

const MAX_SPEED: f64 = 8.0;
const MAX_TORQUE: f64 = 2.0;
const DT: f64 = 0.05;
const G: f64 = 10.0;
const M: f64 = 1.0;
const L: f64 = 1.0;

/// Classic inverted pendulum with continuous torque control
#[derive(Debug, Clone)]
pub struct Pendulum {
    theta: f64,
    theta_dot: f64,
    last_torque: f64,
    steps: usize,
    max_steps: usize,
    rng: StdRng,
}

impl Pendulum {
    /// Create a pendulum with the standard 200-step horizon
    pub fn new() -> Self {
        Self {
            theta: 0.0,
            theta_dot: 0.0,
            last_torque: 0.0,
            steps: 0,
            max_steps: 200,
            rng: StdRng::from_entropy(),
        }
    }

    /// Override the episode length limit
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    fn observation(&self) -> Vec<f64> {
        vec![self.theta.cos(), self.theta.sin(), self.theta_dot]
    }

    fn angle_normalize(x: f64) -> f64 {
        (x + PI).rem_euclid(2.0 * PI) - PI
    }
}

impl Default for Pendulum {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for Pendulum {
    fn id(&self) -> &str {
        "Pendulum-v1"
    }

    fn reset(&mut self) -> Result<Vec<f64>> {
        self.theta = self.rng.gen_range(-PI..PI);
        self.theta_dot = self.rng.gen_range(-1.0..1.0);
        self.last_torque = 0.0;
        self.steps = 0;
        Ok(self.observation())
    }

    fn step(&mut self, action: &Action) -> Result<StepResult> {
        let torque = match action {
            Action::Continuous(u) if u.len() == 1 => u[0].clamp(-MAX_TORQUE, MAX_TORQUE),
            other => bail!("Pendulum expects a 1-D continuous action, got {:?}", other),
        };
        if !torque.is_finite() {
            bail!("Pendulum received a non-finite torque");
        }

        let cost = Self::angle_normalize(self.theta).powi(2)
            + 0.1 * self.theta_dot.powi(2)
            + 0.001 * torque.powi(2);

        // θ̈ = (3g / 2L)·sin θ + (3 / mL²)·u
        let theta_acc = 3.0 * G / (2.0 * L) * self.theta.sin() + 3.0 / (M * L * L) * torque;
        self.theta_dot = (self.theta_dot + theta_acc * DT).clamp(-MAX_SPEED, MAX_SPEED);
        self.theta += self.theta_dot * DT;
        self.last_torque = torque;
        self.steps += 1;

        Ok(StepResult {
            observation: self.observation(),
            reward: -cost,
            terminated: false,
            truncated: self.steps >= self.max_steps,
            info: StepInfo { episode_steps: self.steps },
        })
    }

    fn seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    fn render(&mut self) {
        tracing::trace!(
            theta = Self::angle_normalize(self.theta),
            theta_dot = self.theta_dot,
            torque = self.last_torque,
            "pendulum"
        );
    }

    fn observation_space(&self) -> SpaceInfo {
        SpaceInfo { shape: vec![3], space_type: SpaceType::Continuous }
    }

    fn action_space(&self) -> SpaceInfo {
        SpaceInfo { shape: vec![1], space_type: SpaceType::Continuous }
    }
}
