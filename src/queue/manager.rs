//! Plan queue manager.

use super::notifier::Notifier;
use super::types::QueueEntry;
use crate::error::{PullGuardError, Result};
use crate::models::{Project, PullRequest, User};
use crate::project_lock::LockBackend;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct QueueKey {
    project: Project,
    workspace: String,
}

impl QueueKey {
    fn new(project: &Project, workspace: &str) -> Self {
        Self {
            project: project.clone(),
            workspace: workspace.to_string(),
        }
    }
}

/// Ordered waiting lists of pull requests per (project, workspace).
///
/// The internal lock is never held while calling the backend or a notifier.
pub struct PlanQueueManager {
    queues: RwLock<HashMap<QueueKey, Vec<QueueEntry>>>,
    backend: Arc<dyn LockBackend>,
    notifier: Arc<dyn Notifier>,
}

impl PlanQueueManager {
    pub fn new(backend: Arc<dyn LockBackend>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            queues: RwLock::new(HashMap::new()),
            backend,
            notifier,
        }
    }

    /// Insert `entry` in priority/arrival order and notify its owner of the
    /// position. Re-adding a pull already in the queue changes nothing.
    ///
    /// Returns the 1-based position of the pull in the queue.
    pub fn add_to_queue(&self, entry: QueueEntry) -> usize {
        let key = QueueKey::new(&entry.project, &entry.workspace);
        let position = {
            let mut queues = self.write();
            let queue = queues.entry(key).or_default();
            if let Some(index) = queue.iter().position(|e| e.pull == entry.pull) {
                debug!(pull = %entry.pull, position = index + 1, "pull already queued");
                return index + 1;
            }
            let index = queue.partition_point(|e| e.sort_key() <= entry.sort_key());
            queue.insert(index, entry.clone());
            index + 1
        };

        info!(
            project = %entry.project,
            workspace = %entry.workspace,
            pull = %entry.pull,
            position,
            "plan queued"
        );
        self.notify_queue_position(&entry, position);
        position
    }

    /// Remove the entry of `pull`, deleting the queue once empty.
    /// Returns whether an entry was removed.
    pub fn remove_from_queue(&self, project: &Project, workspace: &str, pull: &PullRequest) -> bool {
        let key = QueueKey::new(project, workspace);
        let mut queues = self.write();
        let Some(queue) = queues.get_mut(&key) else {
            return false;
        };
        let before = queue.len();
        queue.retain(|e| &e.pull != pull);
        let removed = queue.len() != before;
        if queue.is_empty() {
            queues.remove(&key);
        }
        removed
    }

    /// The entry that will be served next.
    pub fn get_next_in_queue(&self, project: &Project, workspace: &str) -> Option<QueueEntry> {
        self.read()
            .get(&QueueKey::new(project, workspace))
            .and_then(|queue| queue.first().cloned())
    }

    pub fn is_in_queue(&self, project: &Project, workspace: &str, pull: &PullRequest) -> bool {
        self.queue_position(project, workspace, pull).is_some()
    }

    /// 1-based position of `pull` in the queue.
    pub fn queue_position(
        &self,
        project: &Project,
        workspace: &str,
        pull: &PullRequest,
    ) -> Option<usize> {
        self.read()
            .get(&QueueKey::new(project, workspace))
            .and_then(|queue| queue.iter().position(|e| &e.pull == pull))
            .map(|index| index + 1)
    }

    /// Copy of the queue, in service order.
    pub fn get_queue_status(&self, project: &Project, workspace: &str) -> Vec<QueueEntry> {
        self.read()
            .get(&QueueKey::new(project, workspace))
            .cloned()
            .unwrap_or_default()
    }

    /// Hand the project lock to the head of the queue.
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - The queue is empty
    /// * `Ok(Some(entry))` - `entry` now holds the lock and has left the queue
    /// * `Err(_)` - The backend failed or still reports another holder; the
    ///   entry is back at the head of the queue
    pub fn transfer_lock(&self, project: &Project, workspace: &str) -> Result<Option<QueueEntry>> {
        self.transfer_lock_to_eligible(project, workspace, |_| true)
    }

    /// Hand the project lock to the first queued entry accepted by `eligible`.
    ///
    /// Rejected entries are dropped from the queue. `eligible` is asked again
    /// once the backend has granted the lock: an entry withdrawn in the
    /// meantime gets its fresh lock released and the next entry is tried.
    /// It runs under the queue lock and must not call back into the manager.
    pub fn transfer_lock_to_eligible<F>(
        &self,
        project: &Project,
        workspace: &str,
        eligible: F,
    ) -> Result<Option<QueueEntry>>
    where
        F: Fn(&QueueEntry) -> bool,
    {
        let key = QueueKey::new(project, workspace);
        loop {
            let Some(entry) = self.pop_eligible_head(&key, &eligible) else {
                return Ok(None);
            };

            let response = match self
                .backend
                .try_lock(&entry.project, &entry.workspace, &entry.pull, &entry.user)
            {
                Ok(response) => response,
                Err(err) => {
                    warn!(pull = %entry.pull, error = %err, "lock transfer failed; restoring queue head");
                    self.restore_head_if(key, entry, &eligible);
                    return Err(err);
                }
            };

            let held_by_entry = response
                .current_lock
                .as_ref()
                .is_some_and(|lock| lock.pull == entry.pull);
            if !response.acquired && !held_by_entry {
                let holder = response
                    .current_lock
                    .as_ref()
                    .map(|lock| format!("pull #{}", lock.pull.num))
                    .unwrap_or_else(|| "another pull request".to_string());
                let message = format!(
                    "project {} workspace {} is still locked by {}; pull #{} stays at the head of the queue",
                    entry.project, entry.workspace, holder, entry.pull.num
                );
                warn!(pull = %entry.pull, %holder, "lock transfer refused; restoring queue head");
                self.restore_head_if(key, entry, &eligible);
                return Err(PullGuardError::QueueError(message));
            }

            if !eligible(&entry) {
                info!(
                    pull = %entry.pull,
                    lock_key = %response.lock_key,
                    "queued plan withdrawn during transfer; releasing its lock"
                );
                self.backend.unlock(&response.lock_key)?;
                continue;
            }

            info!(
                project = %entry.project,
                workspace = %entry.workspace,
                pull = %entry.pull,
                "project lock transferred to next queued plan"
            );
            self.notify_lock_acquired(&entry);
            return Ok(Some(entry));
        }
    }

    /// Remove `pull` from every queue of the repository.
    /// Returns how many entries were removed.
    pub fn cleanup_queue(&self, repo_full_name: &str, pull_num: u64) -> usize {
        let mut queues = self.write();
        let mut removed = 0;
        queues.retain(|key, queue| {
            if key.project.repo_full_name == repo_full_name {
                let before = queue.len();
                queue.retain(|e| !(e.pull.repo_full_name == repo_full_name && e.pull.num == pull_num));
                removed += before - queue.len();
            }
            !queue.is_empty()
        });
        if removed > 0 {
            info!(repo = repo_full_name, pull = pull_num, removed, "removed pull from plan queues");
        }
        removed
    }

    /// Send `message` to the owner of every entry queued for the project.
    pub fn notify_queue_update(&self, project: &Project, workspace: &str, message: &str) {
        for entry in self.get_queue_status(project, workspace) {
            self.notify_user(entry.pull, entry.user, message.to_string());
        }
    }

    /// Post `message` to a requester on a detached thread.
    pub fn notify_user(&self, pull: PullRequest, user: User, message: String) {
        let notifier = Arc::clone(&self.notifier);
        let spawned = thread::Builder::new()
            .name("pullguard-notify".to_string())
            .spawn(move || {
                if let Err(err) = notifier.notify(&pull, &user, &message) {
                    warn!(%pull, user = %user.username, error = %err, "failed to notify user");
                }
            });
        if let Err(err) = spawned {
            warn!(error = %err, "failed to spawn notification thread");
        }
    }

    fn notify_queue_position(&self, entry: &QueueEntry, position: usize) {
        let message = format!(
            "Your plan for project {} workspace {} is queued at position {}. \
             It will run once the project lock is released.",
            entry.project, entry.workspace, position
        );
        self.notify_user(entry.pull.clone(), entry.user.clone(), message);
    }

    fn notify_lock_acquired(&self, entry: &QueueEntry) {
        let message = format!(
            "The lock for project {} workspace {} has been transferred to this pull request. \
             Comment `plan` to run your queued plan.",
            entry.project, entry.workspace
        );
        self.notify_user(entry.pull.clone(), entry.user.clone(), message);
    }

    /// Take the first entry accepted by `eligible`, dropping the ones before it.
    fn pop_eligible_head<F>(&self, key: &QueueKey, eligible: &F) -> Option<QueueEntry>
    where
        F: Fn(&QueueEntry) -> bool,
    {
        let mut queues = self.write();
        let queue = queues.get_mut(key)?;
        let mut popped = None;
        while !queue.is_empty() {
            let entry = queue.remove(0);
            if eligible(&entry) {
                popped = Some(entry);
                break;
            }
            debug!(pull = %entry.pull, "dropping withdrawn plan from queue");
        }
        if queue.is_empty() {
            queues.remove(key);
        }
        popped
    }

    fn restore_head_if<F>(&self, key: QueueKey, entry: QueueEntry, eligible: &F)
    where
        F: Fn(&QueueEntry) -> bool,
    {
        let mut queues = self.write();
        if !eligible(&entry) {
            debug!(pull = %entry.pull, "withdrawn plan not restored to queue");
            return;
        }
        let queue = queues.entry(key).or_default();
        // The pull may have re-queued itself while the lock was negotiated.
        queue.retain(|e| e.pull != entry.pull);
        queue.insert(0, entry);
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<QueueKey, Vec<QueueEntry>>> {
        self.queues.read().unwrap_or_else(|poison| poison.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<QueueKey, Vec<QueueEntry>>> {
        self.queues.write().unwrap_or_else(|poison| poison.into_inner())
    }
}
