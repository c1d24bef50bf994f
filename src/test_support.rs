use crate::error::{PullGuardError, Result};
use crate::models::{Project, ProjectLock, PullRequest, User, lock_key};
use crate::project_lock::{BackendLockResponse, LockBackend};
use crate::queue::Notifier;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Generous bound for waiting on background notification threads.
pub(crate) const NOTIFY_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) fn project() -> Project {
    Project::new("test/repo", "terraform")
}

pub(crate) fn pull(num: u64) -> PullRequest {
    PullRequest::new("test/repo", num)
}

pub(crate) fn user(name: &str) -> User {
    User::new(name)
}

/// Gate that parks the next `try_lock` call until released.
struct Gate {
    entered: Sender<()>,
    release: Receiver<()>,
}

/// In-memory `LockBackend` with failure injection.
#[derive(Default)]
pub(crate) struct MemoryBackend {
    locks: Mutex<BTreeMap<String, ProjectLock>>,
    fail_next: Mutex<Option<String>>,
    gate: Mutex<Option<Gate>>,
    try_lock_calls: AtomicUsize,
}

impl MemoryBackend {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make the next `try_lock` fail with a backend error.
    pub(crate) fn fail_next_try_lock(&self, message: &str) {
        *self.fail_next.lock().unwrap() = Some(message.to_string());
    }

    /// Park the next `try_lock` call. Returns a receiver signalled once the
    /// call is parked and a sender that lets it continue.
    pub(crate) fn install_gate(&self) -> (Receiver<()>, Sender<()>) {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        *self.gate.lock().unwrap() = Some(Gate {
            entered: entered_tx,
            release: release_rx,
        });
        (entered_rx, release_tx)
    }

    pub(crate) fn try_lock_calls(&self) -> usize {
        self.try_lock_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn holder(&self, project: &Project, workspace: &str) -> Option<u64> {
        self.locks
            .lock()
            .unwrap()
            .get(&lock_key(project, workspace))
            .map(|lock| lock.pull.num)
    }
}

impl LockBackend for MemoryBackend {
    fn try_lock(
        &self,
        project: &Project,
        workspace: &str,
        pull: &PullRequest,
        user: &User,
    ) -> Result<BackendLockResponse> {
        self.try_lock_calls.fetch_add(1, Ordering::SeqCst);

        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.entered.send(()).unwrap();
            gate.release.recv().unwrap();
        }

        if let Some(message) = self.fail_next.lock().unwrap().take() {
            return Err(PullGuardError::BackendError(message));
        }

        let key = lock_key(project, workspace);
        let mut locks = self.locks.lock().unwrap();
        if let Some(existing) = locks.get(&key) {
            return Ok(BackendLockResponse {
                acquired: false,
                lock_key: key,
                current_lock: Some(existing.clone()),
            });
        }
        let lock = ProjectLock::new(project.clone(), workspace, pull.clone(), user.clone());
        locks.insert(key.clone(), lock.clone());
        Ok(BackendLockResponse {
            acquired: true,
            lock_key: key,
            current_lock: Some(lock),
        })
    }

    fn unlock(&self, lock_key: &str) -> Result<Option<ProjectLock>> {
        Ok(self.locks.lock().unwrap().remove(lock_key))
    }

    fn unlock_by_pull(&self, repo_full_name: &str, pull_num: u64) -> Result<Vec<ProjectLock>> {
        let mut locks = self.locks.lock().unwrap();
        let keys: Vec<String> = locks
            .iter()
            .filter(|(_, lock)| {
                lock.pull.repo_full_name == repo_full_name && lock.pull.num == pull_num
            })
            .map(|(key, _)| key.clone())
            .collect();
        Ok(keys.iter().filter_map(|key| locks.remove(key)).collect())
    }

    fn get_lock(&self, project: &Project, workspace: &str) -> Result<Option<ProjectLock>> {
        Ok(self
            .locks
            .lock()
            .unwrap()
            .get(&lock_key(project, workspace))
            .cloned())
    }

    fn list(&self) -> Result<Vec<ProjectLock>> {
        Ok(self.locks.lock().unwrap().values().cloned().collect())
    }
}

/// A notification captured by `RecordingNotifier`.
#[derive(Debug, Clone)]
pub(crate) struct Sent {
    pub(crate) pull: PullRequest,
    pub(crate) message: String,
}

/// Notifier that forwards every message to a channel, optionally failing.
pub(crate) struct RecordingNotifier {
    sent: Mutex<Sender<Sent>>,
    fail: bool,
}

impl RecordingNotifier {
    pub(crate) fn new() -> (Arc<Self>, Receiver<Sent>) {
        Self::build(false)
    }

    /// Records the attempt, then reports failure.
    pub(crate) fn failing() -> (Arc<Self>, Receiver<Sent>) {
        Self::build(true)
    }

    fn build(fail: bool) -> (Arc<Self>, Receiver<Sent>) {
        let (tx, rx) = mpsc::channel();
        (
            Arc::new(Self {
                sent: Mutex::new(tx),
                fail,
            }),
            rx,
        )
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, pull: &PullRequest, _user: &User, message: &str) -> Result<()> {
        let _ = self.sent.lock().unwrap().send(Sent {
            pull: pull.clone(),
            message: message.to_string(),
        });
        if self.fail {
            return Err(PullGuardError::BackendError("comment API unavailable".to_string()));
        }
        Ok(())
    }
}
