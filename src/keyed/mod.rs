//! Keyed in-process lock registry.
//!
//! A registry maps composite string keys to "held" status. Presence of a key
//! in the registry *is* the lock; there is no other state. Acquisition never
//! blocks: `try_lock` returns immediately with a guard or nothing, and retry
//! policy is left to callers such as the project lock coordinator.
//!
//! # Key Layout
//!
//! Keys are built from their fields in a fixed order joined by `/`, so two
//! semantically equal keys always compare equal. A *nested* registry also
//! treats a key as conflicting with every held key that is a `/`-segment
//! prefix of it (or that it is a prefix of). The working directory locker
//! relies on this: the pull-wide key `owner/repo/12` excludes
//! `owner/repo/12/default` and vice versa.
//!
//! # Named Lockers
//!
//! `WorkingDirLocker`, `WorkspaceLocker` and `EnvironmentLocker` are thin,
//! differently-keyed front ends over a registry of their own.

mod lockers;
mod registry;

#[cfg(test)]
mod tests;

pub use lockers::{Contention, EnvironmentLocker, WorkingDirLocker, WorkspaceLocker};
pub use registry::{KEY_DELIMITER, KeyedLockGuard, KeyedLockRegistry};
