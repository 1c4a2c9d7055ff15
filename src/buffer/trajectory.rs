//! Transition storage for one batch of experience
//!
//! Transitions are stored in collection order. Episodes are laid out back to
//! back; an episode ends exactly at a transition whose mask is zero.

use anyhow::{bail, Result};
use tch::Tensor;

use crate::env::Action;

/// Ordered `(state, action, reward, mask, log_prob)` transitions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trajectory {
    states: Vec<Vec<f64>>,
    actions: Vec<Action>,
    rewards: Vec<f64>,
    masks: Vec<f64>,
    log_probs: Vec<f64>,
}

impl Trajectory {
    /// Create an empty trajectory
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty trajectory with room for `capacity` transitions
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            states: Vec::with_capacity(capacity),
            actions: Vec::with_capacity(capacity),
            rewards: Vec::with_capacity(capacity),
            masks: Vec::with_capacity(capacity),
            log_probs: Vec::with_capacity(capacity),
        }
    }

    /// Append one transition
    ///
    /// `mask` is 0.0 when the episode ended at this step, 1.0 otherwise.
    pub fn push(&mut self, state: Vec<f64>, action: Action, reward: f64, mask: f64, log_prob: f64) {
        self.states.push(state);
        self.actions.push(action);
        self.rewards.push(reward);
        self.masks.push(mask);
        self.log_probs.push(log_prob);
    }

    /// Append all transitions of `other`
    pub fn extend(&mut self, other: Trajectory) {
        self.states.extend(other.states);
        self.actions.extend(other.actions);
        self.rewards.extend(other.rewards);
        self.masks.extend(other.masks);
        self.log_probs.extend(other.log_probs);
    }

    /// Number of transitions
    pub fn len(&self) -> usize {
        self.rewards.len()
    }

    /// Whether no transitions are stored
    pub fn is_empty(&self) -> bool {
        self.rewards.is_empty()
    }

    /// Number of completed episodes (transitions with a zero mask)
    pub fn num_episodes(&self) -> usize {
        self.masks.iter().filter(|&&m| m == 0.0).count()
    }

    /// States in collection order
    pub fn states(&self) -> &[Vec<f64>] {
        &self.states
    }

    /// Actions in collection order
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Rewards in collection order
    pub fn rewards(&self) -> &[f64] {
        &self.rewards
    }

    /// Continuation masks in collection order
    pub fn masks(&self) -> &[f64] {
        &self.masks
    }

    /// Log-probabilities of the actions under the collecting policy
    pub fn log_probs(&self) -> &[f64] {
        &self.log_probs
    }

    /// States as a `[N, obs_dim]` double tensor
    pub fn states_tensor(&self) -> Result<Tensor> {
        let obs_dim = match self.states.first() {
            Some(s) => s.len(),
            None => bail!("cannot build a tensor from an empty trajectory"),
        };
        if self.states.iter().any(|s| s.len() != obs_dim) {
            bail!("states have inconsistent dimensions");
        }
        let flat: Vec<f64> = self.states.iter().flatten().copied().collect();
        Ok(Tensor::f_from_slice(&flat)?.view([self.states.len() as i64, obs_dim as i64]))
    }

    /// Actions as a tensor
    ///
    /// Discrete actions become an int64 tensor `[N]`; continuous actions a
    /// double tensor `[N, action_dim]`.
    pub fn actions_tensor(&self) -> Result<Tensor> {
        match self.actions.first() {
            None => bail!("cannot build a tensor from an empty trajectory"),
            Some(Action::Discrete(_)) => {
                let indices = self
                    .actions
                    .iter()
                    .map(|a| match a {
                        Action::Discrete(i) => Ok(*i),
                        Action::Continuous(_) => bail!("mixed discrete and continuous actions"),
                    })
                    .collect::<Result<Vec<i64>>>()?;
                Ok(Tensor::f_from_slice(&indices)?)
            }
            Some(Action::Continuous(first)) => {
                let dim = first.len();
                let mut flat = Vec::with_capacity(self.actions.len() * dim);
                for action in &self.actions {
                    match action {
                        Action::Continuous(a) if a.len() == dim => flat.extend_from_slice(a),
                        Action::Continuous(_) => bail!("actions have inconsistent dimensions"),
                        Action::Discrete(_) => bail!("mixed discrete and continuous actions"),
                    }
                }
                Ok(Tensor::f_from_slice(&flat)?.view([self.actions.len() as i64, dim as i64]))
            }
        }
    }

    /// Log-probabilities as a double tensor `[N]`
    pub fn log_probs_tensor(&self) -> Result<Tensor> {
        Ok(Tensor::f_from_slice(&self.log_probs)?)
    }
}

#[cfg(test)]
mod tests {
    use tch::Kind;

    use super::*;

    fn sample() -> Trajectory {
        let mut t = Trajectory::new();
        t.push(vec![0.0, 1.0], Action::Discrete(1), 1.0, 1.0, -0.5);
        t.push(vec![2.0, 3.0], Action::Discrete(0), 1.0, 0.0, -0.7);
        t.push(vec![4.0, 5.0], Action::Discrete(1), 0.5, 1.0, -0.1);
        t
    }

    #[test]
    fn test_counts() {
        let t = sample();
        assert_eq!(t.len(), 3);
        assert_eq!(t.num_episodes(), 1);
        assert!(!t.is_empty());
        assert!(Trajectory::new().is_empty());
    }

    #[test]
    fn test_extend_preserves_order() {
        let mut a = sample();
        let b = sample();
        a.extend(b);
        assert_eq!(a.len(), 6);
        assert_eq!(a.num_episodes(), 2);
        assert_eq!(a.states()[3], vec![0.0, 1.0]);
        assert_eq!(a.log_probs()[5], -0.1);
    }

    #[test]
    fn test_tensors() {
        let t = sample();
        let states = t.states_tensor().unwrap();
        assert_eq!(states.size(), vec![3, 2]);
        assert_eq!(states.kind(), Kind::Double);

        let actions = t.actions_tensor().unwrap();
        assert_eq!(actions.size(), vec![3]);
        assert_eq!(actions.kind(), Kind::Int64);

        let mut c = Trajectory::new();
        c.push(vec![0.0], Action::Continuous(vec![0.1, 0.2]), 0.0, 0.0, 0.0);
        assert_eq!(c.actions_tensor().unwrap().size(), vec![1, 2]);
    }

    #[test]
    fn test_mixed_actions_rejected() {
        let mut t = sample();
        t.push(vec![0.0, 0.0], Action::Continuous(vec![1.0]), 0.0, 0.0, 0.0);
        assert!(t.actions_tensor().is_err());
        assert!(Trajectory::new().states_tensor().is_err());
    }
}
