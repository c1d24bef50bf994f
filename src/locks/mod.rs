//! File-based durable lock backend.
//!
//! `FileLockBackend` implements `LockBackend` with one lock file per
//! (project, workspace) in a locks directory, so several processes on the
//! same host (or sharing a filesystem) agree on who holds a project lock.
//!
//! # Lock Files
//!
//! Lock files are named after the backend lock key with `%` and `/`
//! percent-encoded, plus a `.lock` extension. A record is written to a staged
//! file first and then hard-linked into place, which fails if the lock file
//! already exists. Only one process can acquire a given lock at a time, and
//! readers never see a half-written record.
//!
//! # Lock Records
//!
//! Each lock file contains a JSON record:
//! - `lock`: the project lock (project, workspace, pull, user, time)
//! - `metadata.owner`: the host-side owner (e.g., `user@HOST`)
//! - `metadata.pid`: the process ID (optional)
//! - `metadata.created_at`: RFC3339 timestamp

mod metadata;
mod operations;
mod types;


pub use metadata::{LockMetadata, LockRecord};
pub use operations::FileLockBackend;
pub use types::LockInfo;
