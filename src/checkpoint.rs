//! Persisted training state
//!
//! A checkpoint bundles the policy parameters, the value parameters and the
//! observation filter into one bincode file, `{dir}/{env_id}_trpo.bin`. The
//! file is written to a temporary sibling and renamed into place, so readers
//! see either the previous checkpoint or the new one, never a partial write.

use std::{
    fs,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::{error::TrpoError, policy::MlpConfig, utils::ZFilter};

/// Version written by this build
pub const FORMAT_VERSION: u32 = 1;

/// Location of the checkpoint for `env_id` inside `dir`
pub fn checkpoint_path<P: AsRef<Path>>(dir: P, env_id: &str) -> PathBuf {
    dir.as_ref().join(format!("{}_trpo.bin", env_id))
}

/// Shape of the action space a checkpoint was trained for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    /// Number of discrete actions
    Discrete(usize),
    /// Continuous action dimensionality
    Continuous(usize),
}

/// Policy, value network and observation filter saved as one unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// File format version
    pub format_version: u32,
    /// Environment the model was trained on
    pub env_id: String,
    /// Save time, RFC 3339
    pub saved_at: String,
    /// Observation dimensionality
    pub obs_dim: usize,
    /// Action space
    pub action: ActionKind,
    /// Network architecture
    pub mlp: MlpConfig,
    /// Flat policy parameters
    pub policy: Vec<f64>,
    /// Flat value parameters
    pub value: Vec<f64>,
    /// Observation filter with its running statistics
    pub normalizer: ZFilter,
}

impl Checkpoint {
    /// Assemble a checkpoint stamped with the current time
    pub fn new(
        env_id: &str,
        obs_dim: usize,
        action: ActionKind,
        mlp: MlpConfig,
        policy: Vec<f64>,
        value: Vec<f64>,
        normalizer: ZFilter,
    ) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            env_id: env_id.to_string(),
            saved_at: chrono::Utc::now().to_rfc3339(),
            obs_dim,
            action,
            mlp,
            policy,
            value,
            normalizer,
        }
    }

    /// Write atomically to `{dir}/{env_id}_trpo.bin`, creating `dir` if needed
    pub fn save<P: AsRef<Path>>(&self, dir: P) -> Result<PathBuf> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create checkpoint directory {}", dir.display()))?;
        let path = checkpoint_path(dir, &self.env_id);

        let tmp = NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            bincode::serialize_into(&mut writer, self)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&path)
            .with_context(|| format!("failed to move checkpoint into {}", path.display()))?;

        tracing::info!(path = %path.display(), "saved checkpoint");
        Ok(path)
    }

    /// Read `{dir}/{env_id}_trpo.bin`
    ///
    /// Every failure is reported as [`TrpoError::ModelLoad`].
    pub fn load<P: AsRef<Path>>(dir: P, env_id: &str) -> Result<Self, TrpoError> {
        let path = checkpoint_path(dir, env_id);
        let fail = |reason: String| TrpoError::ModelLoad { path: path.clone(), reason };

        let bytes = fs::read(&path).map_err(|e| fail(e.to_string()))?;
        let checkpoint: Checkpoint =
            bincode::deserialize(&bytes).map_err(|e| fail(e.to_string()))?;

        if checkpoint.format_version != FORMAT_VERSION {
            return Err(fail(format!(
                "format version {} is not supported (expected {})",
                checkpoint.format_version, FORMAT_VERSION
            )));
        }
        if checkpoint.env_id != env_id {
            return Err(fail(format!(
                "checkpoint was trained on {}, not {}",
                checkpoint.env_id, env_id
            )));
        }
        if checkpoint.normalizer.dim() != checkpoint.obs_dim {
            return Err(fail("normalizer dimension does not match observations".to_string()));
        }
        Ok(checkpoint)
    }

    /// Check that the checkpoint fits a model with the given layout
    ///
    /// Returns the reason for the first mismatch found.
    pub fn ensure_compatible(
        &self,
        obs_dim: usize,
        action: ActionKind,
        mlp: &MlpConfig,
        policy_params: usize,
        value_params: usize,
    ) -> Result<(), String> {
        let mismatch = if self.obs_dim != obs_dim {
            Some(format!("observation dimension {} != {}", self.obs_dim, obs_dim))
        } else if self.action != action {
            Some(format!("action space {:?} != {:?}", self.action, action))
        } else if self.mlp.hidden_sizes != mlp.hidden_sizes {
            Some(format!(
                "hidden sizes {:?} != {:?}",
                self.mlp.hidden_sizes, mlp.hidden_sizes
            ))
        } else if self.mlp.activation != mlp.activation {
            Some(format!(
                "activation {:?} != {:?}",
                self.mlp.activation, mlp.activation
            ))
        } else if self.policy.len() != policy_params {
            Some(format!(
                "policy has {} parameters, model has {}",
                self.policy.len(),
                policy_params
            ))
        } else if self.value.len() != value_params {
            Some(format!(
                "value has {} parameters, model has {}",
                self.value.len(),
                value_params
            ))
        } else {
            None
        };

        match mismatch {
            Some(reason) => Err(reason),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::Activation;

    fn sample() -> Checkpoint {
        let mut normalizer = ZFilter::new(3, Some(5.0));
        normalizer.apply(&[1.0, 2.0, 3.0], true);
        Checkpoint::new(
            "Test-v0",
            3,
            ActionKind::Discrete(2),
            MlpConfig::default(),
            vec![0.5, -0.25, 1.0],
            vec![2.0],
            normalizer,
        )
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint = sample();
        let path = checkpoint.save(dir.path()).unwrap();
        assert_eq!(path, dir.path().join("Test-v0_trpo.bin"));

        let loaded = Checkpoint::load(dir.path(), "Test-v0").unwrap();
        assert_eq!(loaded, checkpoint);
        assert!(chrono::DateTime::parse_from_rfc3339(&loaded.saved_at).is_ok());
    }

    #[test]
    fn test_save_overwrites_and_creates_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("models");
        sample().save(&nested).unwrap();

        let mut second = sample();
        second.policy = vec![9.0, 9.0, 9.0];
        second.save(&nested).unwrap();

        assert_eq!(Checkpoint::load(&nested, "Test-v0").unwrap().policy, vec![9.0; 3]);
        assert_eq!(fs::read_dir(&nested).unwrap().count(), 1);
    }

    #[test]
    fn test_missing_and_corrupt_files() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Checkpoint::load(dir.path(), "Test-v0"),
            Err(TrpoError::ModelLoad { .. })
        ));

        fs::write(checkpoint_path(dir.path(), "Test-v0"), b"not a checkpoint").unwrap();
        assert!(matches!(
            Checkpoint::load(dir.path(), "Test-v0"),
            Err(TrpoError::ModelLoad { .. })
        ));
    }

    #[test]
    fn test_compatibility_checks() {
        let checkpoint = sample();
        let mlp = MlpConfig::default();
        assert!(checkpoint.ensure_compatible(3, ActionKind::Discrete(2), &mlp, 3, 1).is_ok());
        assert!(checkpoint.ensure_compatible(4, ActionKind::Discrete(2), &mlp, 3, 1).is_err());
        assert!(checkpoint.ensure_compatible(3, ActionKind::Continuous(2), &mlp, 3, 1).is_err());
        assert!(checkpoint.ensure_compatible(3, ActionKind::Discrete(2), &mlp, 4, 1).is_err());
    }

    #[test]
    fn test_architecture_mismatch_is_reported() {
        let checkpoint = sample();
        let tanh = MlpConfig { activation: Activation::Tanh, ..MlpConfig::default() };
        let relu = MlpConfig { activation: Activation::ReLU, ..MlpConfig::default() };
        assert!(checkpoint.ensure_compatible(3, ActionKind::Discrete(2), &tanh, 3, 1).is_ok());

        let reason = checkpoint
            .ensure_compatible(3, ActionKind::Discrete(2), &relu, 3, 1)
            .unwrap_err();
        assert!(reason.contains("activation"), "{}", reason);

        let narrower = MlpConfig { hidden_sizes: vec![64, 64], ..tanh };
        let reason = checkpoint
            .ensure_compatible(3, ActionKind::Discrete(2), &narrower, 3, 1)
            .unwrap_err();
        assert!(reason.contains("hidden sizes"), "{}", reason);
    }
}
