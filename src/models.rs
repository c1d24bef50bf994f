//! Identity types shared by every locking component.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Workspace used when a request does not name one.
pub const DEFAULT_WORKSPACE: &str = "default";

/// Project path used for the repository root.
pub const DEFAULT_REPO_REL_DIR: &str = ".";

/// A (repository, root directory) pair identifying one deployable unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Project {
    /// Repository full name, e.g. `owner/repo`.
    pub repo_full_name: String,

    /// Directory of the project relative to the repository root.
    pub path: String,
}

impl Project {
    /// Create a project, normalizing an empty or `./`-prefixed path.
    pub fn new(repo_full_name: impl Into<String>, path: impl Into<String>) -> Self {
        let path = path.into();
        let trimmed = path.trim_start_matches("./").trim_end_matches('/');
        let path = if trimmed.is_empty() {
            DEFAULT_REPO_REL_DIR.to_string()
        } else {
            trimmed.to_string()
        };
        Self {
            repo_full_name: repo_full_name.into(),
            path,
        }
    }
}

impl fmt::Display for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.repo_full_name, self.path)
    }
}

/// A pull/merge request, identified by repository and number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PullRequest {
    pub repo_full_name: String,
    pub num: u64,
}

impl PullRequest {
    pub fn new(repo_full_name: impl Into<String>, num: u64) -> Self {
        Self {
            repo_full_name: repo_full_name.into(),
            num,
        }
    }
}

impl fmt::Display for PullRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.repo_full_name, self.num)
    }
}

/// The user who asked for an operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    pub username: String,
}

impl User {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }
}

/// A durable project lock held on behalf of a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectLock {
    pub project: Project,
    pub workspace: String,
    pub pull: PullRequest,
    pub user: User,
    pub time: DateTime<Utc>,
}

impl ProjectLock {
    /// Create a lock record stamped with the current time.
    pub fn new(project: Project, workspace: impl Into<String>, pull: PullRequest, user: User) -> Self {
        Self {
            project,
            workspace: workspace.into(),
            pull,
            user,
            time: Utc::now(),
        }
    }

    /// The backend key for this lock.
    pub fn key(&self) -> String {
        lock_key(&self.project, &self.workspace)
    }
}

/// Backend lock key for a (project, workspace) pair: `{repo}/{path}/{workspace}`.
pub fn lock_key(project: &Project, workspace: &str) -> String {
    format!("{}/{}/{}", project.repo_full_name, project.path, workspace)
}
