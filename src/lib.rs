//! Pullguard: locking, cancellation and plan queueing for pull-request
//! automation that runs against shared working copies.
//!
//! The building blocks are usable on their own; `locking::LockingCore` wires
//! one of each together around a shared lock backend and notifier.

pub mod config;
pub mod drainer;
pub mod error;
pub mod exit_codes;
pub mod keyed;
pub mod locking;
pub mod locks;
pub mod models;
pub mod operations;
pub mod project_lock;
pub mod queue;
pub mod working_dir;

#[cfg(test)]
mod test_support;
