//! Retrying project lock acquisition behind an in-memory guard.

use super::backend::LockBackend;
use super::protection::{CancelHandle, WorkingDirProtection};
use crate::error::Result;
use crate::keyed::{KeyedLockGuard, KeyedLockRegistry};
use crate::models::{Project, ProjectLock, PullRequest, User};
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

/// Failure reason when another local thread is negotiating the same lock.
pub const IN_PROGRESS_REASON: &str = "Another operation is in progress for this project/workspace.\n\
     Wait until it is complete and try again.";

/// How often and how patiently to retry a contended backend lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockRetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl LockRetryPolicy {
    /// `max_attempts` below one is raised to one.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for LockRetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

/// In-memory guard key: `memory:{repo}:{path}:{workspace}`.
pub fn memory_lock_key(project: &Project, workspace: &str) -> String {
    format!(
        "memory:{}:{}:{}",
        project.repo_full_name, project.path, workspace
    )
}

/// Outcome of a project lock attempt.
///
/// Contention is an expected result, not an error; backend failures are
/// reported through the surrounding `Result` instead.
#[derive(Debug)]
pub enum LockOutcome {
    /// The lock is held by the requesting pull request.
    Acquired(ProjectLockHandle),
    /// Someone else holds the lock or is negotiating it right now.
    Contended {
        /// User-facing explanation.
        reason: String,
        /// The lock that blocked us, when the backend reported one.
        holder: Option<ProjectLock>,
    },
}

impl LockOutcome {
    pub fn is_acquired(&self) -> bool {
        matches!(self, LockOutcome::Acquired(_))
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            LockOutcome::Acquired(_) => None,
            LockOutcome::Contended { reason, .. } => Some(reason),
        }
    }
}

/// A project lock held by the caller.
///
/// The in-memory guard is released when the handle is dropped. The durable
/// backend lock is only released by `unlock`, so a plan's lock outlives the
/// request that created it.
pub struct ProjectLockHandle {
    lock_key: String,
    lock: Option<ProjectLock>,
    backend: Arc<dyn LockBackend>,
    _memory_guard: KeyedLockGuard,
}

impl ProjectLockHandle {
    /// Backend key of the held lock.
    pub fn lock_key(&self) -> &str {
        &self.lock_key
    }

    /// The lock record as reported by the backend.
    pub fn lock(&self) -> Option<&ProjectLock> {
        self.lock.as_ref()
    }

    /// Release both the backend lock and the in-memory guard.
    pub fn unlock(self) -> Result<Option<ProjectLock>> {
        debug!(lock_key = %self.lock_key, "releasing project lock");
        self.backend.unlock(&self.lock_key)
    }
}

impl fmt::Debug for ProjectLockHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectLockHandle")
            .field("lock_key", &self.lock_key)
            .field("lock", &self.lock)
            .finish_non_exhaustive()
    }
}

/// Combines the durable backend lock, the in-memory guard, the retry policy
/// and working directory protection.
pub struct ProjectLockCoordinator {
    backend: Arc<dyn LockBackend>,
    memory: KeyedLockRegistry,
    policy: LockRetryPolicy,
    protection: Arc<WorkingDirProtection>,
}

impl ProjectLockCoordinator {
    pub fn new(backend: Arc<dyn LockBackend>, policy: LockRetryPolicy) -> Self {
        Self {
            backend,
            memory: KeyedLockRegistry::new(),
            policy,
            protection: Arc::new(WorkingDirProtection::new()),
        }
    }

    pub fn backend(&self) -> &Arc<dyn LockBackend> {
        &self.backend
    }

    pub fn policy(&self) -> LockRetryPolicy {
        self.policy
    }

    /// Shared protection table, for directory backends that must honor it.
    pub fn protection(&self) -> Arc<WorkingDirProtection> {
        Arc::clone(&self.protection)
    }

    /// Acquire the project lock for `pull`, retrying while another pull holds it.
    ///
    /// # Returns
    ///
    /// * `Ok(LockOutcome::Acquired)` - This pull holds the lock (newly, or already did)
    /// * `Ok(LockOutcome::Contended)` - Another local attempt is in progress, or
    ///   another pull still holds the lock after every attempt
    /// * `Err(_)` - The backend failed; no retry is made
    pub fn try_lock_with_retry(
        &self,
        project: &Project,
        workspace: &str,
        pull: &PullRequest,
        user: &User,
    ) -> Result<LockOutcome> {
        let memory_key = memory_lock_key(project, workspace);
        let mut holder = None;

        for attempt in 1..=self.policy.max_attempts {
            let Some(guard) = self.memory.try_lock(&memory_key) else {
                debug!(key = %memory_key, attempt, "project lock is being negotiated locally");
                return Ok(LockOutcome::Contended {
                    reason: IN_PROGRESS_REASON.to_string(),
                    holder: None,
                });
            };

            let response = self.backend.try_lock(project, workspace, pull, user)?;
            let held_by_us = response
                .current_lock
                .as_ref()
                .is_some_and(|lock| &lock.pull == pull);

            if response.acquired || held_by_us {
                if !response.acquired {
                    debug!(lock_key = %response.lock_key, %pull, "project already locked by this pull");
                }
                return Ok(LockOutcome::Acquired(ProjectLockHandle {
                    lock_key: response.lock_key,
                    lock: response.current_lock,
                    backend: Arc::clone(&self.backend),
                    _memory_guard: guard,
                }));
            }

            guard.release();
            holder = response.current_lock;
            if attempt < self.policy.max_attempts {
                debug!(
                    lock_key = %response.lock_key,
                    attempt,
                    max_attempts = self.policy.max_attempts,
                    "project locked by another pull; retrying"
                );
                thread::sleep(self.policy.delay);
            }
        }

        let reason = match &holder {
            Some(lock) => format!(
                "This project is currently locked by an unapplied plan from pull #{}. \
                 To continue, delete the lock or apply that plan and merge the pull request.\n\n\
                 Once the lock is released, comment `plan` here to re-plan.",
                lock.pull.num
            ),
            None => "This project is currently locked by another pull request.".to_string(),
        };
        info!(
            project = %project,
            workspace,
            %pull,
            holder = ?holder.as_ref().map(|lock| lock.pull.num),
            "project lock contended"
        );
        Ok(LockOutcome::Contended { reason, holder })
    }

    /// Release a backend lock by key.
    pub fn unlock(&self, lock_key: &str) -> Result<Option<ProjectLock>> {
        self.backend.unlock(lock_key)
    }

    /// Release every backend lock of a pull and drop its protections.
    pub fn unlock_by_pull(&self, repo_full_name: &str, pull_num: u64) -> Result<Vec<ProjectLock>> {
        let released = self.backend.unlock_by_pull(repo_full_name, pull_num)?;
        self.cleanup_all_locks(repo_full_name, pull_num);
        info!(repo = repo_full_name, pull = pull_num, released = released.len(), "released pull locks");
        Ok(released)
    }

    pub fn get_lock(&self, project: &Project, workspace: &str) -> Result<Option<ProjectLock>> {
        self.backend.get_lock(project, workspace)
    }

    /// Guard a working directory against deletion until the handle is cancelled.
    pub fn protect_working_dir(
        &self,
        repo_full_name: &str,
        pull_num: u64,
        workspace: &str,
    ) -> CancelHandle {
        self.protection.protect(repo_full_name, pull_num, workspace)
    }

    pub fn is_working_dir_protected(
        &self,
        repo_full_name: &str,
        pull_num: u64,
        workspace: &str,
    ) -> bool {
        self.protection.is_protected(repo_full_name, pull_num, workspace)
    }

    pub fn cleanup_working_dir_protection(
        &self,
        repo_full_name: &str,
        pull_num: u64,
        workspace: &str,
    ) {
        self.protection.cleanup(repo_full_name, pull_num, workspace);
    }

    /// Cancel and remove every protection guard of a pull.
    pub fn cleanup_all_locks(&self, repo_full_name: &str, pull_num: u64) {
        self.protection.cleanup_all(repo_full_name, pull_num);
    }
}
