//! Durable lock backend capability.

use crate::error::Result;
use crate::models::{Project, ProjectLock, PullRequest, User};

/// Result of a backend lock attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendLockResponse {
    /// Whether this call created the lock.
    pub acquired: bool,
    /// Backend key of the (project, workspace) lock.
    pub lock_key: String,
    /// The lock now in place: the new one when acquired, the existing holder
    /// otherwise.
    pub current_lock: Option<ProjectLock>,
}

/// Durable, cross-process project lock storage.
///
/// Implementations must be safe to call from many threads; they are
/// authoritative for which pull request holds a (project, workspace).
pub trait LockBackend: Send + Sync {
    /// Try to lock `project`/`workspace` for `pull`. Never blocks waiting for
    /// the current holder.
    fn try_lock(
        &self,
        project: &Project,
        workspace: &str,
        pull: &PullRequest,
        user: &User,
    ) -> Result<BackendLockResponse>;

    /// Release the lock stored under `lock_key`, returning it if it existed.
    fn unlock(&self, lock_key: &str) -> Result<Option<ProjectLock>>;

    /// Release every lock held by a pull request.
    fn unlock_by_pull(&self, repo_full_name: &str, pull_num: u64) -> Result<Vec<ProjectLock>>;

    /// The lock currently held on `project`/`workspace`, if any.
    fn get_lock(&self, project: &Project, workspace: &str) -> Result<Option<ProjectLock>>;

    /// Every lock currently held.
    fn list(&self) -> Result<Vec<ProjectLock>>;
}
