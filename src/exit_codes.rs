//! Exit code constants for the pullguard CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, invalid config, missing lock)
//! - 2: Lock backend failure
//! - 3: Plan queue transfer failure
//! - 4: Lock acquisition failure
//! - 5: Working directory is protected by an in-flight operation

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments, invalid config, or a lock that does not exist.
pub const USER_ERROR: i32 = 1;

/// The durable lock backend failed (storage unavailable, corrupt record, ...).
pub const BACKEND_FAILURE: i32 = 2;

/// The head of a plan queue could not be handed the project lock.
pub const QUEUE_FAILURE: i32 = 3;

/// Lock acquisition failure.
pub const LOCK_FAILURE: i32 = 4;

/// A working directory could not be deleted because an operation protects it.
pub const WORKING_DIR_PROTECTED: i32 = 5;
