//! Registry and RAII guard implementation.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::trace;

/// Delimiter between key fields.
pub const KEY_DELIMITER: char = '/';

/// Process-local exclusive locks keyed by string.
///
/// Cloning a registry yields another handle onto the same set of held keys.
#[derive(Debug, Clone, Default)]
pub struct KeyedLockRegistry {
    inner: Arc<RegistryInner>,
}

#[derive(Debug, Default)]
struct RegistryInner {
    /// Whether segment-prefix keys conflict with each other.
    nested: bool,
    held: Mutex<BTreeSet<String>>,
}

impl KeyedLockRegistry {
    /// Create a registry where keys conflict only on equality.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry where a key also conflicts with its segment prefixes
    /// and segment descendants.
    pub fn nested() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                nested: true,
                held: Mutex::new(BTreeSet::new()),
            }),
        }
    }

    /// Try to acquire `key` without blocking.
    ///
    /// Returns `None` if the key, or a conflicting key, is already held.
    pub fn try_lock(&self, key: &str) -> Option<KeyedLockGuard> {
        let mut held = self.held();
        if held
            .iter()
            .any(|existing| conflicts(existing, key, self.inner.nested))
        {
            trace!(key, "keyed lock contended");
            return None;
        }
        held.insert(key.to_string());
        trace!(key, "keyed lock acquired");
        Some(KeyedLockGuard {
            registry: self.clone(),
            key: key.to_string(),
            released: false,
        })
    }

    /// Release `key` unconditionally. Releasing an unheld key is a no-op.
    pub fn unlock(&self, key: &str) {
        if self.held().remove(key) {
            trace!(key, "keyed lock released");
        }
    }

    /// Whether exactly `key` is currently held.
    pub fn is_locked(&self, key: &str) -> bool {
        self.held().contains(key)
    }

    /// Snapshot of every held key, sorted.
    pub fn held_keys(&self) -> Vec<String> {
        self.held().iter().cloned().collect()
    }

    fn held(&self) -> MutexGuard<'_, BTreeSet<String>> {
        // The set stays consistent even if a holder panicked mid-call.
        self.inner
            .held
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }
}

fn conflicts(held: &str, key: &str, nested: bool) -> bool {
    held == key || (nested && (is_segment_prefix(held, key) || is_segment_prefix(key, held)))
}

fn is_segment_prefix(prefix: &str, key: &str) -> bool {
    key.len() > prefix.len()
        && key.starts_with(prefix)
        && key[prefix.len()..].starts_with(KEY_DELIMITER)
}

/// RAII guard for a held registry key.
///
/// When dropped, the key is released. Releasing is idempotent: a guard that
/// was already released never touches a key re-acquired by someone else.
#[derive(Debug)]
#[must_use = "dropping the guard releases the lock immediately"]
pub struct KeyedLockGuard {
    registry: KeyedLockRegistry,
    key: String,
    released: bool,
}

impl KeyedLockGuard {
    /// The held key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Release the lock before the guard goes out of scope.
    pub fn release(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if !self.released {
            self.released = true;
            self.registry.unlock(&self.key);
        }
    }
}

impl Drop for KeyedLockGuard {
    fn drop(&mut self) {
        self.release_once();
    }
}
