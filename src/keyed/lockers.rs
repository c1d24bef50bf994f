//! Named lockers built on the keyed registry.

use super::registry::{KeyedLockGuard, KeyedLockRegistry};
use std::fmt;
use tracing::debug;

/// A lock that could not be taken because another caller holds it.
///
/// This is a control-flow value, not an error: `reason` is written for end
/// users and can be posted back to the pull request verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contention {
    /// The registry key that was contended.
    pub key: String,
    /// Human-readable explanation.
    pub reason: String,
}

impl fmt::Display for Contention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

fn acquire(
    registry: &KeyedLockRegistry,
    key: String,
    reason: impl FnOnce() -> String,
) -> Result<KeyedLockGuard, Contention> {
    match registry.try_lock(&key) {
        Some(guard) => Ok(guard),
        None => {
            debug!(key = %key, "lock held by another command");
            Err(Contention {
                key,
                reason: reason(),
            })
        }
    }
}

/// Serializes filesystem mutation of per-pull working directories.
///
/// Workspace-level keys (`repo/pull/workspace`) and the pull-wide key
/// (`repo/pull`) share a nested registry, so a pull-wide operation such as
/// deleting every clone of a closed pull excludes, and is excluded by, any
/// single-workspace operation.
#[derive(Debug, Clone)]
pub struct WorkingDirLocker {
    registry: KeyedLockRegistry,
}

impl Default for WorkingDirLocker {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkingDirLocker {
    pub fn new() -> Self {
        Self {
            registry: KeyedLockRegistry::nested(),
        }
    }

    /// Key for one workspace of a pull.
    pub fn workspace_key(repo_full_name: &str, pull_num: u64, workspace: &str) -> String {
        format!("{}/{}/{}", repo_full_name, pull_num, workspace)
    }

    /// Key for a whole pull.
    pub fn pull_key(repo_full_name: &str, pull_num: u64) -> String {
        format!("{}/{}", repo_full_name, pull_num)
    }

    /// Lock the working directory of one workspace.
    pub fn try_lock(
        &self,
        repo_full_name: &str,
        pull_num: u64,
        workspace: &str,
    ) -> Result<KeyedLockGuard, Contention> {
        acquire(
            &self.registry,
            Self::workspace_key(repo_full_name, pull_num, workspace),
            || {
                format!(
                    "The {} workspace is currently locked by another command that is running for this pull request.\n\
                     Wait until the previous command is complete and try again.",
                    workspace
                )
            },
        )
    }

    /// Lock every working directory of a pull.
    pub fn try_lock_pull(
        &self,
        repo_full_name: &str,
        pull_num: u64,
    ) -> Result<KeyedLockGuard, Contention> {
        acquire(
            &self.registry,
            Self::pull_key(repo_full_name, pull_num),
            || {
                "The pull request is currently locked by another command that is running for it.\n\
                 Wait until the previous command is complete and try again."
                    .to_string()
            },
        )
    }

    /// The underlying registry.
    pub fn registry(&self) -> &KeyedLockRegistry {
        &self.registry
    }
}

/// Serializes commands against a single named workspace of a pull.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceLocker {
    registry: KeyedLockRegistry,
}

impl WorkspaceLocker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Key layout: `repo/workspace/pull`.
    pub fn key(repo_full_name: &str, workspace: &str, pull_num: u64) -> String {
        format!("{}/{}/{}", repo_full_name, workspace, pull_num)
    }

    pub fn try_lock(
        &self,
        repo_full_name: &str,
        workspace: &str,
        pull_num: u64,
    ) -> Result<KeyedLockGuard, Contention> {
        acquire(
            &self.registry,
            Self::key(repo_full_name, workspace, pull_num),
            || {
                format!(
                    "The {} workspace is already in use by another command for pull #{}.\n\
                     Wait until the previous command is complete and try again.",
                    workspace, pull_num
                )
            },
        )
    }

    pub fn registry(&self) -> &KeyedLockRegistry {
        &self.registry
    }
}

/// Serializes commands against a deployment environment of a pull.
#[derive(Debug, Clone, Default)]
pub struct EnvironmentLocker {
    registry: KeyedLockRegistry,
}

impl EnvironmentLocker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Key layout: `repo/environment/pull`.
    pub fn key(repo_full_name: &str, environment: &str, pull_num: u64) -> String {
        format!("{}/{}/{}", repo_full_name, environment, pull_num)
    }

    pub fn try_lock(
        &self,
        repo_full_name: &str,
        environment: &str,
        pull_num: u64,
    ) -> Result<KeyedLockGuard, Contention> {
        acquire(
            &self.registry,
            Self::key(repo_full_name, environment, pull_num),
            || {
                format!(
                    "The {} environment is already locked by another command for pull #{}.\n\
                     Wait until the previous command is complete and try again.",
                    environment, pull_num
                )
            },
        )
    }

    pub fn registry(&self) -> &KeyedLockRegistry {
        &self.registry
    }
}
