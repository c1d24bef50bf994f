//! Cancellable protection of working directories against deletion.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Cancellation handle for a protection guard.
///
/// Clones share the same flag. Cancelling is idempotent.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ProtectionKey {
    repo_full_name: String,
    pull_num: u64,
    workspace: String,
}

impl ProtectionKey {
    fn new(repo_full_name: &str, pull_num: u64, workspace: &str) -> Self {
        Self {
            repo_full_name: repo_full_name.to_string(),
            pull_num,
            workspace: workspace.to_string(),
        }
    }

    fn is_pull(&self, repo_full_name: &str, pull_num: u64) -> bool {
        self.repo_full_name == repo_full_name && self.pull_num == pull_num
    }
}

/// Active protection guards per (repo, pull, workspace).
///
/// Guards of different workspaces are independent: cancelling or cleaning up
/// one never affects another.
#[derive(Debug, Default)]
pub struct WorkingDirProtection {
    guards: Mutex<HashMap<ProtectionKey, CancelHandle>>,
}

impl WorkingDirProtection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Protect a working directory until the returned handle is cancelled.
    ///
    /// Protecting an already protected triple installs a fresh guard;
    /// cancelling an earlier handle then no longer lifts the protection.
    pub fn protect(&self, repo_full_name: &str, pull_num: u64, workspace: &str) -> CancelHandle {
        let handle = CancelHandle::new();
        self.guards().insert(
            ProtectionKey::new(repo_full_name, pull_num, workspace),
            handle.clone(),
        );
        debug!(repo = repo_full_name, pull = pull_num, workspace, "protecting working dir");
        handle
    }

    /// Whether a non-cancelled guard exists for the triple.
    pub fn is_protected(&self, repo_full_name: &str, pull_num: u64, workspace: &str) -> bool {
        self.guards()
            .get(&ProtectionKey::new(repo_full_name, pull_num, workspace))
            .is_some_and(|handle| !handle.is_cancelled())
    }

    /// Whether any workspace of the pull has a non-cancelled guard.
    pub fn is_pull_protected(&self, repo_full_name: &str, pull_num: u64) -> bool {
        self.guards()
            .iter()
            .any(|(key, handle)| key.is_pull(repo_full_name, pull_num) && !handle.is_cancelled())
    }

    /// Cancel and forget the guard for one triple.
    pub fn cleanup(&self, repo_full_name: &str, pull_num: u64, workspace: &str) {
        if let Some(handle) = self
            .guards()
            .remove(&ProtectionKey::new(repo_full_name, pull_num, workspace))
        {
            handle.cancel();
        }
    }

    /// Cancel and forget every guard of a pull. Returns how many were removed.
    pub fn cleanup_all(&self, repo_full_name: &str, pull_num: u64) -> usize {
        let mut guards = self.guards();
        let before = guards.len();
        guards.retain(|key, handle| {
            if key.is_pull(repo_full_name, pull_num) {
                handle.cancel();
                false
            } else {
                true
            }
        });
        let removed = before - guards.len();
        if removed > 0 {
            debug!(repo = repo_full_name, pull = pull_num, removed, "cleared working dir protections");
        }
        removed
    }

    fn guards(&self) -> MutexGuard<'_, HashMap<ProtectionKey, CancelHandle>> {
        self.guards.lock().unwrap_or_else(|poison| poison.into_inner())
    }
}
