//! Lock listing information.

use super::metadata::LockMetadata;
use crate::models::ProjectLock;
use std::path::PathBuf;

/// Information about a lock file.
#[derive(Debug, Clone)]
pub struct LockInfo {
    /// The lock file path.
    pub path: PathBuf,

    /// The backend lock key (e.g., `owner/repo/terraform/default`).
    pub lock_key: String,

    /// The project lock stored in the file.
    pub lock: ProjectLock,

    /// Host-side metadata of the lock file.
    pub metadata: LockMetadata,

    /// Whether the lock is older than the stale threshold.
    pub is_stale: bool,
}

impl std::fmt::Display for LockInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (pull: #{}, user: {}, age: {}{})",
            self.lock_key,
            self.lock.pull.num,
            self.lock.user.username,
            self.metadata.age_string(),
            if self.is_stale { ", STALE" } else { "" }
        )
    }
}
