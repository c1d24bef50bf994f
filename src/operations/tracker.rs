//! In-memory operation table and pull cancellation flags.

use super::types::{OperationKey, OperationState};
use crate::models::PullRequest;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

#[derive(Debug, Default)]
struct TrackerState {
    operations: HashMap<OperationKey, OperationState>,
    /// Cancelled pulls and when they were cancelled.
    cancelled_pulls: HashMap<PullRequest, DateTime<Utc>>,
}

/// Tracks operation states and per-pull cancellation flags.
///
/// All access goes through one reader/writer lock; no method blocks on
/// anything else.
#[derive(Debug, Default)]
pub struct OperationTracker {
    state: RwLock<TrackerState>,
}

impl OperationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an operation, replacing any prior entry for the same key.
    pub fn track_operation(&self, key: OperationKey, state: OperationState) {
        debug!(operation = %key, %state, "tracking operation");
        self.write().operations.insert(key, state);
    }

    /// Overwrite the state of an operation.
    pub fn update_operation_state(&self, key: &OperationKey, state: OperationState) {
        debug!(operation = %key, %state, "updating operation state");
        self.write().operations.insert(key.clone(), state);
    }

    /// Current state; `Queued` when the operation is not tracked.
    pub fn get_operation_state(&self, key: &OperationKey) -> OperationState {
        self.read()
            .operations
            .get(key)
            .copied()
            .unwrap_or_default()
    }

    pub fn is_operation_cancelled(&self, key: &OperationKey) -> bool {
        self.get_operation_state(key) == OperationState::Cancelled
    }

    /// Admission check: move a queued operation to `Running`.
    ///
    /// Returns false, leaving the state unchanged, when the operation is not
    /// queued or its pull request has been cancelled.
    pub fn admit(&self, key: &OperationKey) -> bool {
        let mut state = self.write();
        if state.cancelled_pulls.contains_key(&key.pull) {
            debug!(operation = %key, "pull request cancelled; not admitting operation");
            return false;
        }
        let current = state.operations.get(key).copied().unwrap_or_default();
        if current != OperationState::Queued {
            debug!(operation = %key, state = %current, "operation not queued; not admitting");
            return false;
        }
        state.operations.insert(key.clone(), OperationState::Running);
        true
    }

    /// Cancel every queued operation of `pull`. Running and finished
    /// operations are left untouched. Returns how many were cancelled.
    pub fn cancel_queued_operations(&self, pull: &PullRequest) -> usize {
        let cancelled = Self::cancel_queued(&mut self.write(), pull);
        if cancelled > 0 {
            info!(%pull, cancelled, "cancelled queued operations");
        }
        cancelled
    }

    /// Remove every tracked operation of `pull`.
    pub fn clear_operations(&self, pull: &PullRequest) {
        self.write().operations.retain(|key, _| &key.pull != pull);
    }

    /// Snapshot of the tracked operations of `pull`.
    pub fn operations_for_pull(&self, pull: &PullRequest) -> Vec<(OperationKey, OperationState)> {
        self.read()
            .operations
            .iter()
            .filter(|(key, _)| &key.pull == pull)
            .map(|(key, state)| (key.clone(), *state))
            .collect()
    }

    /// Flag `pull` as cancelled and cancel its queued operations.
    /// Returns how many queued operations were cancelled.
    ///
    /// The flag stays set until `clear_pull_request` (for a reopened pull)
    /// or until `prune_cancelled_pulls` drops it after the retention period.
    pub fn cancel_pull_request(&self, pull: &PullRequest) -> usize {
        let mut state = self.write();
        state.cancelled_pulls.entry(pull.clone()).or_insert_with(Utc::now);
        let cancelled = Self::cancel_queued(&mut state, pull);
        info!(%pull, cancelled, "pull request cancelled");
        cancelled
    }

    pub fn is_pull_request_cancelled(&self, pull: &PullRequest) -> bool {
        self.read().cancelled_pulls.contains_key(pull)
    }

    /// When `pull` was first flagged as cancelled.
    pub fn cancelled_at(&self, pull: &PullRequest) -> Option<DateTime<Utc>> {
        self.read().cancelled_pulls.get(pull).copied()
    }

    #[cfg(test)]
    pub(crate) fn backdate_cancellation(&self, pull: &PullRequest, at: DateTime<Utc>) {
        if let Some(cancelled_at) = self.write().cancelled_pulls.get_mut(pull) {
            *cancelled_at = at;
        }
    }

    /// Drop the cancellation flag of `pull`.
    pub fn clear_pull_request(&self, pull: &PullRequest) {
        self.write().cancelled_pulls.remove(pull);
    }

    /// Forget cancellation flags set more than `retention` ago.
    /// Returns how many flags were dropped.
    pub fn prune_cancelled_pulls(&self, retention: Duration) -> usize {
        let cutoff = Utc::now() - retention;
        let mut state = self.write();
        let before = state.cancelled_pulls.len();
        state
            .cancelled_pulls
            .retain(|_, cancelled_at| *cancelled_at > cutoff);
        let pruned = before - state.cancelled_pulls.len();
        if pruned > 0 {
            debug!(pruned, "dropped expired pull cancellation flags");
        }
        pruned
    }

    /// Number of pulls currently flagged as cancelled.
    pub fn cancelled_pull_count(&self) -> usize {
        self.read().cancelled_pulls.len()
    }

    fn cancel_queued(state: &mut TrackerState, pull: &PullRequest) -> usize {
        let mut cancelled = 0;
        for (key, op_state) in state.operations.iter_mut() {
            if &key.pull == pull && *op_state == OperationState::Queued {
                *op_state = OperationState::Cancelled;
                cancelled += 1;
            }
        }
        cancelled
    }

    fn read(&self) -> RwLockReadGuard<'_, TrackerState> {
        self.state.read().unwrap_or_else(|poison| poison.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, TrackerState> {
        self.state.write().unwrap_or_else(|poison| poison.into_inner())
    }
}
