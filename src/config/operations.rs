//! Config loading, validation, and derived values.

use super::model::Config;
use crate::error::{PullGuardError, Result};
use crate::project_lock::LockRetryPolicy;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name looked up when no `--config` path is given.
pub const DEFAULT_CONFIG_FILE: &str = "pullguard.yaml";

impl Config {
    /// Load config from a YAML file.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    ///
    /// # Returns
    ///
    /// * `Ok(Config)` - Successfully loaded and validated config
    /// * `Err(PullGuardError::UserError)` - Read error, parse error or validation failure
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            PullGuardError::UserError(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)
            .map_err(|e| PullGuardError::UserError(format!("failed to parse config YAML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| {
            PullGuardError::UserError(format!("failed to serialize config to YAML: {}", e))
        })
    }

    /// Validate config values and return error on invalid values.
    ///
    /// Validation rules:
    /// - `lock_retry_max_attempts` must be positive
    /// - `lock_retry_delay_ms` must be positive
    /// - `lock_stale_minutes` must be positive
    /// - `cancelled_pull_retention_minutes` must be positive
    /// - `data_dir` must be non-empty
    pub fn validate(&self) -> Result<()> {
        if self.lock_retry_max_attempts == 0 {
            return Err(PullGuardError::UserError(
                "config validation failed: lock_retry_max_attempts must be greater than 0"
                    .to_string(),
            ));
        }

        if self.lock_retry_delay_ms == 0 {
            return Err(PullGuardError::UserError(
                "config validation failed: lock_retry_delay_ms must be greater than 0".to_string(),
            ));
        }

        if self.lock_stale_minutes == 0 {
            return Err(PullGuardError::UserError(
                "config validation failed: lock_stale_minutes must be greater than 0".to_string(),
            ));
        }

        if self.cancelled_pull_retention_minutes == 0 {
            return Err(PullGuardError::UserError(
                "config validation failed: cancelled_pull_retention_minutes must be greater than 0"
                    .to_string(),
            ));
        }

        if self.data_dir.trim().is_empty() {
            return Err(PullGuardError::UserError(
                "config validation failed: data_dir must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Retry policy for project lock acquisition.
    pub fn retry_policy(&self) -> LockRetryPolicy {
        LockRetryPolicy::new(
            self.lock_retry_max_attempts,
            Duration::from_millis(self.lock_retry_delay_ms),
        )
    }

    /// How long a closed pull stays flagged as cancelled.
    pub fn cancelled_pull_retention(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.cancelled_pull_retention_minutes))
    }

    /// Directory holding file-backend lock records.
    pub fn locks_dir(&self) -> PathBuf {
        Path::new(&self.data_dir).join("locks")
    }

    /// Directory holding per-pull working directories.
    pub fn repos_dir(&self) -> PathBuf {
        Path::new(&self.data_dir).join("repos")
    }
}
