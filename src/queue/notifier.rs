//! Requester notification capability.

use crate::error::Result;
use crate::models::{PullRequest, User};
use tracing::info;

/// Posts a message back to the requester of an operation, typically as a
/// pull request comment.
pub trait Notifier: Send + Sync {
    fn notify(&self, pull: &PullRequest, user: &User, message: &str) -> Result<()>;
}

/// Notifier that only writes the message to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, pull: &PullRequest, user: &User, message: &str) -> Result<()> {
        info!(%pull, user = %user.username, message, "notification");
        Ok(())
    }
}
