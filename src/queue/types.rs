//! Queue entry definition.

use crate::models::{Project, PullRequest, User};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A pull request waiting for a project lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub project: Project,
    pub workspace: String,
    pub pull: PullRequest,
    pub user: User,
    pub enqueued_at: DateTime<Utc>,
    /// Lower values are served first.
    pub priority: i32,
}

impl QueueEntry {
    /// Create an entry stamped with the current time and priority 0.
    pub fn new(project: Project, workspace: impl Into<String>, pull: PullRequest, user: User) -> Self {
        Self {
            project,
            workspace: workspace.into(),
            pull,
            user,
            enqueued_at: Utc::now(),
            priority: 0,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_enqueued_at(mut self, enqueued_at: DateTime<Utc>) -> Self {
        self.enqueued_at = enqueued_at;
        self
    }

    pub(super) fn sort_key(&self) -> (i32, DateTime<Utc>) {
        (self.priority, self.enqueued_at)
    }
}
