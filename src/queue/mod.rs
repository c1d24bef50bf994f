//! Per (project, workspace) plan queues.
//!
//! When a plan loses the race for a project lock it can wait in the queue for
//! that project and workspace. Queues are ordered by priority (lower first),
//! then by arrival time, hold at most one entry per pull request, and are
//! deleted once empty. When the holder releases the lock, `transfer_lock`
//! hands it to the head of the queue; a failed hand-off puts the entry back
//! at the head so no waiter is ever dropped.
//!
//! # Notifications
//!
//! Queue position and lock hand-off messages are sent on detached threads.
//! Each thread owns copies of the entry and message it needs, and a failed
//! send is logged and otherwise ignored.

mod manager;
mod notifier;
mod types;


pub use manager::PlanQueueManager;
pub use notifier::{LogNotifier, Notifier};
pub use types::QueueEntry;
