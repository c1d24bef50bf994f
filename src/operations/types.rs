//! Operation identity and state definitions.

use crate::models::PullRequest;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one attempt to run automation.
///
/// Many operation keys can map to the same lock key over time (retries,
/// re-plans); the job id tells them apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationKey {
    pub pull: PullRequest,
    /// Project name, or an empty string for unnamed projects.
    pub project: String,
    pub workspace: String,
    pub repo_rel_dir: String,
    pub job_id: String,
}

impl OperationKey {
    pub fn new(
        pull: PullRequest,
        project: impl Into<String>,
        workspace: impl Into<String>,
        repo_rel_dir: impl Into<String>,
        job_id: impl Into<String>,
    ) -> Self {
        Self {
            pull,
            project: project.into(),
            workspace: workspace.into(),
            repo_rel_dir: repo_rel_dir.into(),
            job_id: job_id.into(),
        }
    }
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}:{}:{} job {}",
            self.pull, self.project, self.repo_rel_dir, self.workspace, self.job_id
        )
    }
}

/// Lifecycle state of a tracked operation.
///
/// Untracked operations report `Queued`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationState {
    #[default]
    Queued,
    Running,
    Cancelled,
    Completed,
}

impl OperationState {
    /// Whether no further transition is expected.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OperationState::Cancelled | OperationState::Completed)
    }
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationState::Queued => write!(f, "queued"),
            OperationState::Running => write!(f, "running"),
            OperationState::Cancelled => write!(f, "cancelled"),
            OperationState::Completed => write!(f, "completed"),
        }
    }
}
