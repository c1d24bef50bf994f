//! Project lock coordination.
//!
//! The durable lock backend is authoritative for who holds the lock on a
//! (project, workspace). The coordinator layers two things in front of it:
//!
//! - An in-memory guard keyed `memory:{repo}:{path}:{workspace}` so that at
//!   most one local thread is inside the backend `try_lock` call for a given
//!   project and workspace.
//! - A retry policy (attempt count and delay, both configured) applied only
//!   when the backend reports the lock held by a *different* pull request.
//!   Backend errors end the attempt immediately.
//!
//! It also owns working directory protection: cancellable guards that tell
//! the directory backend a workspace clone must not be deleted.

mod backend;
mod coordinator;
mod protection;


pub use backend::{BackendLockResponse, LockBackend};
pub use coordinator::{
    IN_PROGRESS_REASON, LockOutcome, LockRetryPolicy, ProjectLockCoordinator, ProjectLockHandle,
    memory_lock_key,
};
pub use protection::{CancelHandle, WorkingDirProtection};
