//! Lock acquisition, release, listing, and clearing on the filesystem.

use super::metadata::LockRecord;
use super::types::LockInfo;
use crate::config::Config;
use crate::error::{PullGuardError, Result};
use crate::models::{Project, ProjectLock, PullRequest, User, lock_key};
use crate::project_lock::{BackendLockResponse, LockBackend};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

static STAGE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Link attempts before a constantly churning lock file is reported.
const PUBLISH_ATTEMPTS: usize = 64;

/// Durable lock backend storing one JSON file per lock key.
#[derive(Debug, Clone)]
pub struct FileLockBackend {
    locks_dir: PathBuf,
}

impl FileLockBackend {
    pub fn new(locks_dir: impl Into<PathBuf>) -> Self {
        Self {
            locks_dir: locks_dir.into(),
        }
    }

    /// Backend rooted at the configured locks directory.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.locks_dir())
    }

    pub fn locks_dir(&self) -> &Path {
        &self.locks_dir
    }

    /// Path of the lock file for a lock key.
    pub fn lock_path(&self, lock_key: &str) -> PathBuf {
        self.locks_dir.join(format!("{}.lock", encode_key(lock_key)))
    }

    /// List all lock files, marking those older than `stale_minutes`.
    ///
    /// Unreadable lock files are skipped with a warning.
    pub fn list_locks(&self, stale_minutes: u32) -> Result<Vec<LockInfo>> {
        let mut locks: Vec<LockInfo> = self
            .read_records()?
            .into_iter()
            .map(|(path, record)| LockInfo {
                path,
                lock_key: record.lock.key(),
                is_stale: record.metadata.is_stale(stale_minutes),
                lock: record.lock,
                metadata: record.metadata,
            })
            .collect();

        // Sort by key for consistent output
        locks.sort_by(|a, b| a.lock_key.cmp(&b.lock_key));
        Ok(locks)
    }

    /// Remove a lock file regardless of who holds it.
    ///
    /// The caller is responsible for verifying that clearing the lock is
    /// appropriate (e.g., checking --force).
    ///
    /// # Returns
    ///
    /// * `Ok(LockInfo)` - Information about the cleared lock
    /// * `Err(PullGuardError::UserError)` - No lock exists for the key
    pub fn clear_lock(&self, lock_key: &str, stale_minutes: u32) -> Result<LockInfo> {
        let path = self.lock_path(lock_key);
        let Some(record) = self.take_lock_file(&path)? else {
            return Err(PullGuardError::UserError(format!(
                "lock '{}' does not exist at: {}",
                lock_key,
                path.display()
            )));
        };

        Ok(LockInfo {
            path,
            lock_key: lock_key.to_string(),
            is_stale: record.metadata.is_stale(stale_minutes),
            lock: record.lock,
            metadata: record.metadata,
        })
    }

    fn ensure_locks_dir(&self) -> Result<()> {
        if !self.locks_dir.exists() {
            fs::create_dir_all(&self.locks_dir).map_err(|e| {
                PullGuardError::BackendError(format!(
                    "failed to create locks directory '{}': {}",
                    self.locks_dir.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Unique scratch path inside the locks directory. Never ends in `.lock`.
    fn scratch_path(&self) -> PathBuf {
        self.locks_dir.join(format!(
            ".{}.{}.tmp",
            std::process::id(),
            STAGE_COUNTER.fetch_add(1, Ordering::Relaxed)
        ))
    }

    /// Atomically move a lock file out of place and return its record.
    ///
    /// The rename decides which caller removes a given lock file, so the
    /// returned record is exactly the lock that was released. Returns
    /// `Ok(None)` if no lock file exists.
    fn take_lock_file(&self, path: &Path) -> Result<Option<LockRecord>> {
        self.take_lock_file_if(path, |_| true)
    }

    /// Like `take_lock_file`, but only releases a lock whose record matches.
    ///
    /// A lock that changed hands after it was listed is linked back into
    /// place and `Ok(None)` is returned.
    pub(super) fn take_lock_file_if<F>(&self, path: &Path, matches: F) -> Result<Option<LockRecord>>
    where
        F: Fn(&LockRecord) -> bool,
    {
        let taken = self.scratch_path();
        match fs::rename(path, &taken) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(PullGuardError::BackendError(format!(
                    "failed to remove lock file '{}': {}",
                    path.display(),
                    e
                )));
            }
        }
        let outcome = match LockRecord::from_file(&taken) {
            Ok(record) if !matches(&record) => {
                debug!(path = %path.display(), holder = record.lock.pull.num, "lock changed hands; putting it back");
                if let Err(e) = fs::hard_link(&taken, path) {
                    warn!(path = %path.display(), error = %e, "could not restore lock of another pull");
                }
                Ok(None)
            }
            other => other.map(Some),
        };
        let _ = fs::remove_file(&taken);
        outcome
    }

    fn stage_record(&self, record: &LockRecord) -> Result<PathBuf> {
        let staged = self.scratch_path();
        let json = record.to_json()?;

        let write = || -> std::io::Result<()> {
            let mut file = OpenOptions::new().write(true).create_new(true).open(&staged)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()
        };
        write().map_err(|e| {
            // Clean up the staged file on write failure
            let _ = fs::remove_file(&staged);
            PullGuardError::BackendError(format!(
                "failed to write lock record '{}': {}",
                staged.display(),
                e
            ))
        })?;
        Ok(staged)
    }

    /// Link `staged` into place at `path`.
    ///
    /// Returns `Ok(None)` once the link is made, or the record of the current
    /// holder. A holder that releases between the failed link and the read
    /// is not contention: the link is attempted again.
    fn publish(&self, staged: &Path, path: &Path) -> Result<Option<LockRecord>> {
        for _ in 0..PUBLISH_ATTEMPTS {
            match fs::hard_link(staged, path) {
                Ok(()) => return Ok(None),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if let Some(existing) = LockRecord::read_if_present(path)? {
                        return Ok(Some(existing));
                    }
                    debug!(path = %path.display(), "lock released during acquisition; relinking");
                }
                Err(e) => {
                    return Err(PullGuardError::BackendError(format!(
                        "failed to create lock file '{}': {}",
                        path.display(),
                        e
                    )));
                }
            }
        }
        Err(PullGuardError::BackendError(format!(
            "lock file '{}' kept changing during acquisition",
            path.display()
        )))
    }

    fn read_records(&self) -> Result<Vec<(PathBuf, LockRecord)>> {
        let mut records = Vec::new();
        if !self.locks_dir.exists() {
            return Ok(records);
        }

        let entries = fs::read_dir(&self.locks_dir).map_err(|e| {
            PullGuardError::BackendError(format!(
                "failed to read locks directory '{}': {}",
                self.locks_dir.display(),
                e
            ))
        })?;

        for entry in entries {
            let entry = entry.map_err(|e| {
                PullGuardError::BackendError(format!(
                    "failed to read locks directory entry: {}",
                    e
                ))
            })?;
            let path = entry.path();

            // Skip non-lock files
            if path.extension().and_then(|e| e.to_str()) != Some("lock") {
                continue;
            }

            // A lock released while listing is simply gone
            match LockRecord::read_if_present(&path) {
                Ok(Some(record)) => records.push((path, record)),
                Ok(None) => {}
                Err(err) => warn!(path = %path.display(), error = %err, "skipping unreadable lock file"),
            }
        }

        Ok(records)
    }
}

impl LockBackend for FileLockBackend {
    fn try_lock(
        &self,
        project: &Project,
        workspace: &str,
        pull: &PullRequest,
        user: &User,
    ) -> Result<BackendLockResponse> {
        self.ensure_locks_dir()?;

        let key = lock_key(project, workspace);
        let path = self.lock_path(&key);

        let record = LockRecord::new(ProjectLock::new(
            project.clone(),
            workspace,
            pull.clone(),
            user.clone(),
        ));

        // Write the full record aside, then link it into place so readers
        // never observe a partially written lock file.
        let staged = self.stage_record(&record)?;
        let outcome = self.publish(&staged, &path);
        let _ = fs::remove_file(&staged);

        if let Some(existing) = outcome? {
            debug!(lock_key = %key, holder = existing.lock.pull.num, "project lock held");
            return Ok(BackendLockResponse {
                acquired: false,
                lock_key: key,
                current_lock: Some(existing.lock),
            });
        }

        debug!(lock_key = %key, %pull, "project lock file created");
        Ok(BackendLockResponse {
            acquired: true,
            lock_key: key,
            current_lock: Some(record.lock),
        })
    }

    fn unlock(&self, lock_key: &str) -> Result<Option<ProjectLock>> {
        let path = self.lock_path(lock_key);
        Ok(self.take_lock_file(&path)?.map(|record| record.lock))
    }

    fn unlock_by_pull(&self, repo_full_name: &str, pull_num: u64) -> Result<Vec<ProjectLock>> {
        let belongs = |record: &LockRecord| {
            record.lock.pull.repo_full_name == repo_full_name && record.lock.pull.num == pull_num
        };
        let mut released = Vec::new();
        for (path, record) in self.read_records()? {
            if !belongs(&record) {
                continue;
            }
            if let Some(taken) = self.take_lock_file_if(&path, &belongs)? {
                released.push(taken.lock);
            }
        }
        Ok(released)
    }

    fn get_lock(&self, project: &Project, workspace: &str) -> Result<Option<ProjectLock>> {
        let path = self.lock_path(&lock_key(project, workspace));
        Ok(LockRecord::read_if_present(&path)?.map(|record| record.lock))
    }

    fn list(&self) -> Result<Vec<ProjectLock>> {
        Ok(self
            .read_records()?
            .into_iter()
            .map(|(_, record)| record.lock)
            .collect())
    }
}

/// Encode a lock key as a single file name component.
pub(super) fn encode_key(lock_key: &str) -> String {
    let mut encoded = String::with_capacity(lock_key.len());
    for c in lock_key.chars() {
        match c {
            '%' => encoded.push_str("%25"),
            '/' => encoded.push_str("%2F"),
            '\\' => encoded.push_str("%5C"),
            c => encoded.push(c),
        }
    }
    encoded
}
