//! Config struct definition and default implementation.

use super::types::*;
use serde::{Deserialize, Serialize};

/// Configuration for the locking core.
///
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // =========================================================================
    // Project lock settings
    // =========================================================================
    /// Attempts made by `try_lock_with_retry` before reporting contention.
    #[serde(default = "default_lock_retry_max_attempts")]
    pub lock_retry_max_attempts: u32,

    /// Delay between lock attempts, in milliseconds.
    #[serde(default = "default_lock_retry_delay_ms")]
    pub lock_retry_delay_ms: u64,

    /// Minutes after which a file-backend lock is reported as stale.
    #[serde(default = "default_lock_stale_minutes")]
    pub lock_stale_minutes: u32,

    /// Minutes a closed pull stays flagged as cancelled before the flag is
    /// forgotten.
    #[serde(default = "default_cancelled_pull_retention_minutes")]
    pub cancelled_pull_retention_minutes: u32,

    // =========================================================================
    // Storage settings
    // =========================================================================
    /// Root directory for lock files (`<data_dir>/locks`) and working
    /// directories (`<data_dir>/repos`).
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    // =========================================================================
    // Queue settings
    // =========================================================================
    /// Whether plans that lose the project lock are queued.
    #[serde(default = "default_true")]
    pub queue_enabled: bool,

    /// Priority given to queue entries that do not request one.
    /// Lower values are served first.
    #[serde(default)]
    pub default_queue_priority: i32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lock_retry_max_attempts: default_lock_retry_max_attempts(),
            lock_retry_delay_ms: default_lock_retry_delay_ms(),
            lock_stale_minutes: default_lock_stale_minutes(),
            cancelled_pull_retention_minutes: default_cancelled_pull_retention_minutes(),
            data_dir: default_data_dir(),
            queue_enabled: default_true(),
            default_queue_priority: 0,
        }
    }
}
