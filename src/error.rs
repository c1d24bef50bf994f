//! Error types for pullguard.
//!
//! Uses thiserror for derive macros. Lock contention is deliberately absent
//! here: contended acquisitions are reported as values
//! (`LockOutcome::Contended`, `Contention`) so callers can render them.

use crate::exit_codes;
use thiserror::Error;

/// Main error type for pullguard operations.
#[derive(Error, Debug)]
pub enum PullGuardError {
    /// Invalid arguments, invalid configuration, or missing state.
    #[error("{0}")]
    UserError(String),

    /// The durable lock backend failed.
    #[error("Lock backend failed: {0}")]
    BackendError(String),

    /// The project lock could not be handed to the next queued plan.
    #[error("Plan queue transfer failed: {0}")]
    QueueError(String),

    /// A lock could not be acquired (admin CLI paths only).
    #[error("Lock acquisition failed: {0}")]
    LockError(String),

    /// A working directory is protected by an in-flight operation.
    #[error("Working directory is protected: {0}")]
    WorkingDirProtected(String),
}

impl PullGuardError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            PullGuardError::UserError(_) => exit_codes::USER_ERROR,
            PullGuardError::BackendError(_) => exit_codes::BACKEND_FAILURE,
            PullGuardError::QueueError(_) => exit_codes::QUEUE_FAILURE,
            PullGuardError::LockError(_) => exit_codes::LOCK_FAILURE,
            PullGuardError::WorkingDirProtected(_) => exit_codes::WORKING_DIR_PROTECTED,
        }
    }
}

/// Result type alias for pullguard operations.
pub type Result<T> = std::result::Result<T, PullGuardError>;
