//! CartPole-v1 environment
//!
//! A classic reinforcement learning benchmark where a pole is balanced on a
//! cart. The goal is to prevent the pole from falling over by applying forces
//! to the cart.
//!
//! # Physics
//!
//! The cart-pole system follows these dynamics:
//! - State: [x, x_dot, theta, theta_dot] (cart position, cart velocity, pole
//!   angle, pole angular velocity)
//! - Actions: 0 (push left) or 1 (push right)
//! - Reward: +1 for every step taken, including the terminal one
//! - Termination: Pole angle > 12° or cart position > 2.4
//!
//! # Reference
//!
//! Based on OpenAI Gym CartPole-v1:
//! <https://github.com/openai/gym/blob/master/gym/envs/classic_control/cartpole.py>

use anyhow::{bail, Result};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::env::{Action, Environment, SpaceInfo, SpaceType, StepInfo, StepResult};

/// CartPole-v1 environment
///
/// A pole is attached to a cart moving along a frictionless track.
/// The goal is to balance the pole by applying forces to the cart.
#[derive(Debug, Clone)]
pub struct CartPole {
    // State variables
    x: f64,         // Cart position
    x_dot: f64,     // Cart velocity
    theta: f64,     // Pole angle (radians)
    theta_dot: f64, // Pole angular velocity

    // Episode tracking
    steps: usize,
    max_steps: usize,

    // Physics constants (matching Gym CartPole-v1)
    gravity: f64,
    mass_pole: f64,
    total_mass: f64,
    length: f64,           // Half-length of pole
    pole_mass_length: f64, // pole_mass * length
    force_mag: f64,
    tau: f64, // Time step

    // Thresholds
    theta_threshold: f64,
    x_threshold: f64,

    rng: StdRng,
}

impl CartPole {
    /// Create a new CartPole environment with default parameters
    ///
    /// Physics constants match OpenAI Gym CartPole-v1:
    /// - gravity = 9.8 m/s²
    /// - cart mass = 1.0 kg
    /// - pole mass = 0.1 kg
    /// - pole half-length = 0.5 m
    /// - force magnitude = 10.0 N
    /// - timestep = 0.02 s
    pub fn new() -> Self {
        let mass_cart = 1.0;
        let mass_pole = 0.1;
        let length = 0.5;

        Self {
            x: 0.0,
            x_dot: 0.0,
            theta: 0.0,
            theta_dot: 0.0,
            steps: 0,
            max_steps: 500,
            gravity: 9.8,
            mass_pole,
            total_mass: mass_cart + mass_pole,
            length,
            pole_mass_length: mass_pole * length,
            force_mag: 10.0,
            tau: 0.02,
            theta_threshold: 12.0 * 2.0 * std::f64::consts::PI / 360.0, // ~0.2094 radians
            x_threshold: 2.4,
            rng: StdRng::from_entropy(),
        }
    }

    /// Override the episode length limit
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Reset state to random initial conditions
    ///
    /// All state variables are initialized with small random perturbations
    /// around equilibrium (uniform distribution in [-0.05, 0.05])
    fn reset_state(&mut self) {
        self.x = self.rng.gen_range(-0.05..0.05);
        self.x_dot = self.rng.gen_range(-0.05..0.05);
        self.theta = self.rng.gen_range(-0.05..0.05);
        self.theta_dot = self.rng.gen_range(-0.05..0.05);
    }

    /// Perform one physics simulation step using Euler integration
    ///
    /// ```text
    /// temp = (force + pole_mass_length * theta_dot² * sin(theta)) / total_mass
    /// theta_acc = (g * sin(theta) - cos(theta) * temp) /
    ///             (length * (4/3 - mass_pole * cos²(theta) / total_mass))
    /// x_acc = temp - pole_mass_length * theta_acc * cos(theta) / total_mass
    /// ```
    fn physics_step(&mut self, push_right: bool) {
        let force = if push_right { self.force_mag } else { -self.force_mag };

        let cos_theta = self.theta.cos();
        let sin_theta = self.theta.sin();

        let temp = (force + self.pole_mass_length * self.theta_dot * self.theta_dot * sin_theta)
            / self.total_mass;
        let theta_acc = (self.gravity * sin_theta - cos_theta * temp)
            / (self.length
                * (4.0 / 3.0 - self.mass_pole * cos_theta * cos_theta / self.total_mass));
        let x_acc = temp - self.pole_mass_length * theta_acc * cos_theta / self.total_mass;

        self.x += self.tau * self.x_dot;
        self.x_dot += self.tau * x_acc;
        self.theta += self.tau * self.theta_dot;
        self.theta_dot += self.tau * theta_acc;
    }

    fn is_terminated(&self) -> bool {
        self.x.abs() > self.x_threshold || self.theta.abs() > self.theta_threshold
    }

    fn observation(&self) -> Vec<f64> {
        vec![self.x, self.x_dot, self.theta, self.theta_dot]
    }
}

impl Default for CartPole {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for CartPole {
    fn id(&self) -> &str {
        "CartPole-v1"
    }

    fn reset(&mut self) -> Result<Vec<f64>> {
        self.reset_state();
        self.steps = 0;
        Ok(self.observation())
    }

    fn step(&mut self, action: &Action) -> Result<StepResult> {
        let push_right = match action {
            Action::Discrete(0) => false,
            Action::Discrete(1) => true,
            other => bail!("CartPole expects a discrete action in {{0, 1}}, got {:?}", other),
        };

        self.physics_step(push_right);
        self.steps += 1;

        let terminated = self.is_terminated();
        let truncated = !terminated && self.steps >= self.max_steps;

        Ok(StepResult {
            observation: self.observation(),
            reward: 1.0,
            terminated,
            truncated,
            info: StepInfo { episode_steps: self.steps },
        })
    }

    fn seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    fn observation_space(&self) -> SpaceInfo {
        SpaceInfo { shape: vec![4], space_type: SpaceType::Continuous }
    }

    fn action_space(&self) -> SpaceInfo {
        SpaceInfo { shape: vec![], space_type: SpaceType::Discrete(2) }
    }
}
