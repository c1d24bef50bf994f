//! One instance of every locking component, wired together.
//!
//! `LockingCore` owns the lockers, the operation tracker, the drainer, the
//! project lock coordinator, the plan queue and the working directory store.
//! All of them share a single lock backend and notifier passed in by the
//! caller.

use crate::config::Config;
use crate::drainer::Drainer;
use crate::error::Result;
use crate::keyed::{EnvironmentLocker, WorkingDirLocker, WorkspaceLocker};
use crate::models::{Project, ProjectLock, PullRequest, User};
use crate::operations::{OperationKey, OperationState, OperationTracker};
use crate::project_lock::{LockBackend, LockOutcome, ProjectLockCoordinator, ProjectLockHandle};
use crate::queue::{Notifier, PlanQueueManager, QueueEntry};
use crate::working_dir::FileWorkingDir;
use std::sync::Arc;
use tracing::{info, warn};

/// Result of asking for a project lock on behalf of a plan.
#[derive(Debug)]
pub enum Acquisition {
    /// The plan holds the project lock and its operation is running.
    Acquired(ProjectLockHandle),
    /// The lock is busy; the plan waits in the queue.
    Queued { position: usize, reason: String },
    /// The lock is busy and queueing is disabled, or the pull has been
    /// cancelled.
    Rejected { reason: String },
}

pub struct LockingCore {
    config: Config,
    working_dir_locker: WorkingDirLocker,
    workspace_locker: WorkspaceLocker,
    environment_locker: EnvironmentLocker,
    tracker: OperationTracker,
    drainer: Drainer,
    coordinator: ProjectLockCoordinator,
    queue: PlanQueueManager,
    working_dirs: FileWorkingDir,
}

impl LockingCore {
    pub fn new(config: Config, backend: Arc<dyn LockBackend>, notifier: Arc<dyn Notifier>) -> Self {
        let coordinator = ProjectLockCoordinator::new(Arc::clone(&backend), config.retry_policy());
        let working_dirs = FileWorkingDir::from_config(&config, coordinator.protection());
        let queue = PlanQueueManager::new(backend, notifier);
        Self {
            config,
            working_dir_locker: WorkingDirLocker::new(),
            workspace_locker: WorkspaceLocker::new(),
            environment_locker: EnvironmentLocker::new(),
            tracker: OperationTracker::new(),
            drainer: Drainer::new(),
            coordinator,
            queue,
            working_dirs,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn working_dir_locker(&self) -> &WorkingDirLocker {
        &self.working_dir_locker
    }

    pub fn workspace_locker(&self) -> &WorkspaceLocker {
        &self.workspace_locker
    }

    pub fn environment_locker(&self) -> &EnvironmentLocker {
        &self.environment_locker
    }

    pub fn tracker(&self) -> &OperationTracker {
        &self.tracker
    }

    pub fn drainer(&self) -> &Drainer {
        &self.drainer
    }

    pub fn coordinator(&self) -> &ProjectLockCoordinator {
        &self.coordinator
    }

    pub fn queue(&self) -> &PlanQueueManager {
        &self.queue
    }

    pub fn working_dirs(&self) -> &FileWorkingDir {
        &self.working_dirs
    }

    /// Acquire the project lock for a plan, queueing it on contention.
    ///
    /// The operation is tracked as `Running` when the lock is acquired and as
    /// `Queued` when the plan joins the queue. A cancelled pull is rejected
    /// without touching the backend, and a pull whose own earlier plan still
    /// holds the lock is rejected instead of being queued behind itself.
    pub fn acquire_or_enqueue(
        &self,
        op: &OperationKey,
        project: &Project,
        workspace: &str,
        user: &User,
    ) -> Result<Acquisition> {
        let pull = &op.pull;
        if self.tracker.is_pull_request_cancelled(pull) {
            return Ok(Acquisition::Rejected {
                reason: format!("Pull #{} has been closed; the plan will not run.", pull.num),
            });
        }

        let reason = match self
            .coordinator
            .try_lock_with_retry(project, workspace, pull, user)?
        {
            LockOutcome::Acquired(handle) => {
                self.tracker
                    .track_operation(op.clone(), OperationState::Running);
                return Ok(Acquisition::Acquired(handle));
            }
            LockOutcome::Contended { reason, holder } => {
                let holder = match holder {
                    Some(lock) => Some(lock),
                    None => self.coordinator.get_lock(project, workspace)?,
                };
                if holder.is_some_and(|lock| &lock.pull == pull) {
                    info!(%project, workspace, %pull, "pull already holds project lock; not queueing");
                    return Ok(Acquisition::Rejected { reason });
                }
                reason
            }
        };

        if !self.config.queue_enabled {
            return Ok(Acquisition::Rejected { reason });
        }

        let entry = QueueEntry::new(project.clone(), workspace, pull.clone(), user.clone())
            .with_priority(self.config.default_queue_priority);
        let position = self.queue.add_to_queue(entry);
        self.tracker.track_operation(op.clone(), OperationState::Queued);
        info!(%project, workspace, %pull, position, "plan queued behind project lock");
        Ok(Acquisition::Queued { position, reason })
    }

    /// Release a held project lock and hand it to the next queued plan.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(entry))` - The lock moved to `entry`
    /// * `Ok(None)` - Nobody was waiting, or only closed pulls were
    /// * `Err(_)` - Unlocking or the transfer failed; a failed transfer leaves
    ///   the waiter at the head of its queue
    pub fn release_project_lock(&self, handle: ProjectLockHandle) -> Result<Option<QueueEntry>> {
        let held = handle.lock().cloned();
        let released = handle.unlock()?;
        let Some(lock) = released.or(held) else {
            return Ok(None);
        };
        self.queue
            .transfer_lock_to_eligible(&lock.project, &lock.workspace, |entry| {
                !self.tracker.is_pull_request_cancelled(&entry.pull)
            })
            .inspect_err(|err| {
                warn!(
                    project = %lock.project,
                    workspace = %lock.workspace,
                    error = %err,
                    "project lock released but not transferred"
                );
            })
    }

    /// Forget everything held on behalf of a closed pull request.
    ///
    /// Cancels the pull and its queued operations, removes it from every plan
    /// queue of the repository, releases its backend locks and protections,
    /// and clears its tracked operations. Cancellation flags older than the
    /// configured retention are forgotten. Returns the released locks.
    pub fn close_pull(&self, pull: &PullRequest) -> Result<Vec<ProjectLock>> {
        let cancelled = self.tracker.cancel_pull_request(pull);
        let dequeued = self.queue.cleanup_queue(&pull.repo_full_name, pull.num);
        let released = self
            .coordinator
            .unlock_by_pull(&pull.repo_full_name, pull.num)?;
        self.tracker.clear_operations(pull);
        let forgotten = self
            .tracker
            .prune_cancelled_pulls(self.config.cancelled_pull_retention());
        info!(
            %pull,
            cancelled,
            dequeued,
            released = released.len(),
            forgotten,
            "closed pull request"
        );
        Ok(released)
    }
}
