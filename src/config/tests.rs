//! Tests for config functionality.

use crate::config::Config;
use std::time::Duration;

#[test]
fn test_default_config() {
    let config = Config::default();

    assert_eq!(config.lock_retry_max_attempts, 3);
    assert_eq!(config.lock_retry_delay_ms, 1000);
    assert_eq!(config.lock_stale_minutes, 120);
    assert_eq!(config.cancelled_pull_retention_minutes, 1440);
    assert_eq!(config.data_dir, ".pullguard");
    assert!(config.queue_enabled);
    assert_eq!(config.default_queue_priority, 0);
    assert!(config.validate().is_ok());
}

#[test]
fn test_parse_minimal_yaml() {
    let config = Config::from_yaml("").unwrap();

    assert_eq!(config.lock_retry_max_attempts, 3);
    assert_eq!(config.data_dir, ".pullguard");
}

#[test]
fn test_parse_partial_yaml() {
    let yaml = r#"
lock_retry_max_attempts: 5
queue_enabled: false
"#;
    let config = Config::from_yaml(yaml).unwrap();

    assert_eq!(config.lock_retry_max_attempts, 5);
    assert!(!config.queue_enabled);

    // Unspecified values should use defaults
    assert_eq!(config.lock_retry_delay_ms, 1000);
    assert_eq!(config.lock_stale_minutes, 120);
}

#[test]
fn test_parse_full_yaml() {
    let yaml = r#"
lock_retry_max_attempts: 10
lock_retry_delay_ms: 250
lock_stale_minutes: 30
data_dir: /var/lib/pullguard
queue_enabled: true
default_queue_priority: 5
"#;
    let config = Config::from_yaml(yaml).unwrap();

    assert_eq!(config.lock_retry_max_attempts, 10);
    assert_eq!(config.lock_retry_delay_ms, 250);
    assert_eq!(config.lock_stale_minutes, 30);
    assert_eq!(config.data_dir, "/var/lib/pullguard");
    assert!(config.queue_enabled);
    assert_eq!(config.default_queue_priority, 5);
}

#[test]
fn test_unknown_fields_are_ignored() {
    let yaml = r#"
lock_retry_max_attempts: 2
future_setting: whatever
"#;
    let config = Config::from_yaml(yaml).unwrap();
    assert_eq!(config.lock_retry_max_attempts, 2);
}

#[test]
fn test_zero_attempts_is_rejected() {
    let err = Config::from_yaml("lock_retry_max_attempts: 0").unwrap_err();
    assert!(err.to_string().contains("lock_retry_max_attempts"));
}

#[test]
fn test_zero_delay_is_rejected() {
    let err = Config::from_yaml("lock_retry_delay_ms: 0").unwrap_err();
    assert!(err.to_string().contains("lock_retry_delay_ms"));
}

#[test]
fn test_zero_stale_minutes_is_rejected() {
    let err = Config::from_yaml("lock_stale_minutes: 0").unwrap_err();
    assert!(err.to_string().contains("lock_stale_minutes"));
}

#[test]
fn test_zero_cancelled_pull_retention_is_rejected() {
    let err = Config::from_yaml("cancelled_pull_retention_minutes: 0").unwrap_err();
    assert!(err.to_string().contains("cancelled_pull_retention_minutes"));
}

#[test]
fn test_cancelled_pull_retention_duration() {
    let config = Config::from_yaml("cancelled_pull_retention_minutes: 90").unwrap();
    assert_eq!(config.cancelled_pull_retention(), chrono::Duration::minutes(90));
}

#[test]
fn test_empty_data_dir_is_rejected() {
    let err = Config::from_yaml("data_dir: \"  \"").unwrap_err();
    assert!(err.to_string().contains("data_dir"));
}

#[test]
fn test_invalid_yaml_is_user_error() {
    let err = Config::from_yaml("lock_retry_max_attempts: [1, 2").unwrap_err();
    assert!(err.to_string().contains("failed to parse config YAML"));
}

#[test]
fn test_yaml_roundtrip_preserves_values() {
    let mut config = Config::default();
    config.lock_retry_delay_ms = 42;
    let yaml = config.to_yaml().unwrap();
    let parsed = Config::from_yaml(&yaml).unwrap();
    assert_eq!(parsed.lock_retry_delay_ms, 42);
}

#[test]
fn test_retry_policy_from_config() {
    let config = Config::from_yaml("lock_retry_max_attempts: 4\nlock_retry_delay_ms: 20").unwrap();
    let policy = config.retry_policy();
    assert_eq!(policy.max_attempts(), 4);
    assert_eq!(policy.delay(), Duration::from_millis(20));
}

#[test]
fn test_derived_directories() {
    let config = Config::from_yaml("data_dir: /srv/pg").unwrap();
    assert_eq!(config.locks_dir(), std::path::Path::new("/srv/pg/locks"));
    assert_eq!(config.repos_dir(), std::path::Path::new("/srv/pg/repos"));
}

#[test]
fn test_load_from_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("pullguard.yaml");
    std::fs::write(&path, "lock_retry_max_attempts: 7\n").unwrap();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.lock_retry_max_attempts, 7);
}

#[test]
fn test_load_missing_file_is_user_error() {
    let dir = tempfile::TempDir::new().unwrap();
    let err = Config::load(dir.path().join("missing.yaml")).unwrap_err();
    assert!(err.to_string().contains("failed to read config file"));
}
