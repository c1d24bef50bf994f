//! Tests for the keyed lock registry and named lockers.

use super::*;
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn test_try_lock_and_unlock() {
    let registry = KeyedLockRegistry::new();

    let guard = registry.try_lock("owner/repo/1/default").unwrap();
    assert_eq!(guard.key(), "owner/repo/1/default");
    assert!(registry.is_locked("owner/repo/1/default"));

    // A second attempt before release fails.
    assert!(registry.try_lock("owner/repo/1/default").is_none());

    drop(guard);
    assert!(!registry.is_locked("owner/repo/1/default"));
    assert!(registry.try_lock("owner/repo/1/default").is_some());
}

#[test]
fn test_distinct_keys_are_independent() {
    let registry = KeyedLockRegistry::new();

    let _a = registry.try_lock("owner/repo/1/default").unwrap();
    let _b = registry.try_lock("owner/repo/1/staging").unwrap();
    let _c = registry.try_lock("owner/repo/2/default").unwrap();

    assert_eq!(
        registry.held_keys(),
        vec![
            "owner/repo/1/default".to_string(),
            "owner/repo/1/staging".to_string(),
            "owner/repo/2/default".to_string(),
        ]
    );
}

#[test]
fn test_flat_registry_ignores_prefixes() {
    let registry = KeyedLockRegistry::new();

    let _pull = registry.try_lock("owner/repo/1").unwrap();
    assert!(registry.try_lock("owner/repo/1/default").is_some());
}

#[test]
fn test_unlock_unheld_key_is_noop() {
    let registry = KeyedLockRegistry::new();
    registry.unlock("never/locked");
    assert!(registry.held_keys().is_empty());
}

#[test]
fn test_release_is_idempotent() {
    let registry = KeyedLockRegistry::new();
    let guard = registry.try_lock("k").unwrap();
    guard.release();
    assert!(!registry.is_locked("k"));

    let other = registry.try_lock("k").unwrap();
    assert!(registry.is_locked(other.key()));
}

#[test]
fn test_nested_registry_excludes_prefixes_both_ways() {
    let registry = KeyedLockRegistry::nested();

    let pull = registry.try_lock("owner/repo/12").unwrap();
    assert!(registry.try_lock("owner/repo/12/default").is_none());
    drop(pull);

    let ws = registry.try_lock("owner/repo/12/default").unwrap();
    assert!(registry.try_lock("owner/repo/12").is_none());
    drop(ws);

    assert!(registry.try_lock("owner/repo/12").is_some());
}

#[test]
fn test_nested_registry_respects_segment_boundaries() {
    let registry = KeyedLockRegistry::nested();

    let _pull = registry.try_lock("owner/repo/1").unwrap();
    // Pull 12 merely shares a textual prefix with pull 1.
    let _other = registry.try_lock("owner/repo/12/default").unwrap();
    assert!(registry.try_lock("owner/repo/12").is_none());
    assert!(registry.try_lock("owner/repo/1/default").is_none());
}

#[test]
fn test_clones_share_state() {
    let registry = KeyedLockRegistry::new();
    let clone = registry.clone();

    let _guard = registry.try_lock("shared").unwrap();
    assert!(clone.try_lock("shared").is_none());
}

#[test]
fn test_concurrent_try_lock_has_single_winner() {
    let registry = KeyedLockRegistry::new();
    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let registry = registry.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                // Keep the guard alive so losers observe it as held.
                registry.try_lock("contended").map(std::mem::forget).is_some()
            })
        })
        .collect();

    let winners = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|won| *won)
        .count();
    assert_eq!(winners, 1);
}

#[test]
fn test_working_dir_locker_workspace_and_pull_are_exclusive() {
    let locker = WorkingDirLocker::new();

    let ws = locker.try_lock("owner/repo", 7, "default").unwrap();
    let err = locker.try_lock_pull("owner/repo", 7).unwrap_err();
    assert_eq!(err.key, "owner/repo/7");
    assert!(err.reason.contains("pull request is currently locked"));
    drop(ws);

    let pull = locker.try_lock_pull("owner/repo", 7).unwrap();
    let err = locker.try_lock("owner/repo", 7, "staging").unwrap_err();
    assert_eq!(err.key, "owner/repo/7/staging");
    assert!(err.to_string().contains("staging workspace is currently locked"));
    drop(pull);

    assert!(locker.try_lock("owner/repo", 7, "staging").is_ok());
}

#[test]
fn test_working_dir_locker_workspaces_are_independent() {
    let locker = WorkingDirLocker::new();

    let _a = locker.try_lock("owner/repo", 7, "default").unwrap();
    let _b = locker.try_lock("owner/repo", 7, "staging").unwrap();
    let _c = locker.try_lock("owner/repo", 8, "default").unwrap();
    assert!(locker.try_lock("owner/repo", 7, "default").is_err());
    assert!(locker.try_lock_pull("owner/repo", 9).is_ok());
}

#[test]
fn test_workspace_locker_keys() {
    let locker = WorkspaceLocker::new();
    assert_eq!(WorkspaceLocker::key("o/r", "prod", 3), "o/r/prod/3");

    let guard = locker.try_lock("o/r", "prod", 3).unwrap();
    let err = locker.try_lock("o/r", "prod", 3).unwrap_err();
    assert!(err.reason.contains("pull #3"));
    assert!(locker.try_lock("o/r", "prod", 4).is_ok());
    drop(guard);
    assert!(locker.registry().held_keys().is_empty());
}

#[test]
fn test_environment_locker_keys() {
    let locker = EnvironmentLocker::new();
    assert_eq!(EnvironmentLocker::key("o/r", "staging", 9), "o/r/staging/9");

    let _guard = locker.try_lock("o/r", "staging", 9).unwrap();
    let err = locker.try_lock("o/r", "staging", 9).unwrap_err();
    assert!(err.reason.contains("staging environment"));
}

#[test]
fn test_named_lockers_use_separate_namespaces() {
    let working = WorkingDirLocker::new();
    let workspace = WorkspaceLocker::new();

    let _a = working.try_lock("o/r", 1, "default").unwrap();
    // Same textual shape, different registry.
    assert!(workspace.try_lock("o/r", "1", 0).is_ok());
}
