//! Per-pull working directories on disk.
//!
//! Each pull request gets a directory under `<root>/<repo>/<pull>`, with one
//! subdirectory per workspace. Deletion consults the shared
//! `WorkingDirProtection` table: a directory guarded by an in-flight
//! operation is never removed from under it.
//!
//! Every repository name segment and the workspace must be a single plain
//! path component. Anything else is a user error and never touches the disk.

use crate::config::Config;
use crate::error::{PullGuardError, Result};
use crate::models::PullRequest;
use crate::project_lock::WorkingDirProtection;
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Filesystem layout of pull request working directories.
#[derive(Debug, Clone)]
pub struct FileWorkingDir {
    root: PathBuf,
    protection: Arc<WorkingDirProtection>,
}

impl FileWorkingDir {
    pub fn new(root: impl Into<PathBuf>, protection: Arc<WorkingDirProtection>) -> Self {
        Self {
            root: root.into(),
            protection,
        }
    }

    /// Working directories rooted at the configured repos directory.
    pub fn from_config(config: &Config, protection: Arc<WorkingDirProtection>) -> Self {
        Self::new(config.repos_dir(), protection)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding every workspace of a pull.
    ///
    /// Fails with a user error when the repository name is not a plain
    /// relative path.
    pub fn pull_dir(&self, pull: &PullRequest) -> Result<PathBuf> {
        for segment in pull.repo_full_name.split('/') {
            check_segment("repository name", &pull.repo_full_name, segment)?;
        }
        Ok(self
            .root
            .join(&pull.repo_full_name)
            .join(pull.num.to_string()))
    }

    /// Fails with a user error unless `workspace` is a single plain path
    /// component.
    pub fn working_dir(&self, pull: &PullRequest, workspace: &str) -> Result<PathBuf> {
        check_segment("workspace", workspace, workspace)?;
        Ok(self.pull_dir(pull)?.join(workspace))
    }

    /// Create the working directory if needed and return its path.
    pub fn ensure_working_dir(&self, pull: &PullRequest, workspace: &str) -> Result<PathBuf> {
        let dir = self.working_dir(pull, workspace)?;
        fs::create_dir_all(&dir).map_err(|e| {
            PullGuardError::BackendError(format!(
                "failed to create working directory '{}': {}",
                dir.display(),
                e
            ))
        })?;
        debug!(%pull, workspace, path = %dir.display(), "working directory ready");
        Ok(dir)
    }

    /// Path of an existing working directory.
    ///
    /// # Returns
    ///
    /// * `Ok(path)` - The directory exists
    /// * `Err(PullGuardError::UserError)` - No working directory has been created
    pub fn get_working_dir(&self, pull: &PullRequest, workspace: &str) -> Result<PathBuf> {
        let dir = self.working_dir(pull, workspace)?;
        if !dir.is_dir() {
            return Err(PullGuardError::UserError(format!(
                "working directory for {} workspace '{}' does not exist: {}",
                pull,
                workspace,
                dir.display()
            )));
        }
        Ok(dir)
    }

    /// Remove one workspace's directory unless an operation protects it.
    ///
    /// A missing directory is not an error.
    pub fn delete_for_workspace(&self, pull: &PullRequest, workspace: &str) -> Result<()> {
        if self
            .protection
            .is_protected(&pull.repo_full_name, pull.num, workspace)
        {
            return Err(PullGuardError::WorkingDirProtected(format!(
                "{} workspace '{}' is in use by an in-flight operation",
                pull, workspace
            )));
        }
        let dir = self.working_dir(pull, workspace)?;
        if remove_dir(&dir)? {
            info!(%pull, workspace, path = %dir.display(), "deleted working directory");
        }
        Ok(())
    }

    /// Remove every workspace of a pull unless any of them is protected.
    pub fn delete(&self, pull: &PullRequest) -> Result<()> {
        if self
            .protection
            .is_pull_protected(&pull.repo_full_name, pull.num)
        {
            return Err(PullGuardError::WorkingDirProtected(format!(
                "{} has a workspace in use by an in-flight operation",
                pull
            )));
        }
        let dir = self.pull_dir(pull)?;
        if remove_dir(&dir)? {
            info!(%pull, path = %dir.display(), "deleted pull working directories");
        }
        Ok(())
    }
}

/// Reject anything but one normal path component: empty names, `.`, `..`,
/// roots, drive prefixes and separators.
fn check_segment(what: &str, value: &str, segment: &str) -> Result<()> {
    let mut components = Path::new(segment).components();
    let plain = !segment.contains(['/', '\\', '\0'])
        && matches!(components.next(), Some(Component::Normal(_)))
        && components.next().is_none();
    if plain {
        Ok(())
    } else {
        Err(PullGuardError::UserError(format!(
            "invalid {} '{}': must be a plain relative name",
            what, value
        )))
    }
}

/// Remove a directory tree. Returns false if it did not exist.
fn remove_dir(dir: &Path) -> Result<bool> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(PullGuardError::BackendError(format!(
            "failed to delete working directory '{}': {}",
            dir.display(),
            e
        ))),
    }
}
