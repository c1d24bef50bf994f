//! Default values for config fields.

pub(crate) fn default_lock_retry_max_attempts() -> u32 {
    3
}
pub(crate) fn default_lock_retry_delay_ms() -> u64 {
    1000
}
pub(crate) fn default_lock_stale_minutes() -> u32 {
    120
}
pub(crate) fn default_cancelled_pull_retention_minutes() -> u32 {
    1440
}
pub(crate) fn default_data_dir() -> String {
    ".pullguard".to_string()
}
pub(crate) fn default_true() -> bool {
    true
}
