//! Operation lifecycle tracking and cooperative cancellation.
//!
//! Every attempt to run automation for a project is tracked under an
//! `OperationKey` with an `OperationState`. Cancellation is cooperative:
//! marking an operation (or a whole pull request) cancelled never interrupts
//! a running thread. It stops queued work at its next admission check and is
//! observable to running work that polls `is_operation_cancelled` or
//! `is_pull_request_cancelled` between units of work.
//!
//! # State Machine
//!
//! ```text
//! Queued ──> Running ──> Completed
//!    │
//!    └────> Cancelled
//! ```
//!
//! `update_operation_state` overwrites unconditionally; keeping to the
//! transitions above is the caller's discipline. `cancel_queued_operations`
//! and `admit` only ever perform legal transitions.

mod tracker;
mod types;


pub use tracker::OperationTracker;
pub use types::{OperationKey, OperationState};
