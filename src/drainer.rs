//! Graceful shutdown for in-flight operations.
//!
//! Every tracked operation calls `start_op` before doing work and `op_done`
//! when it finishes, on every exit path. Once `shutdown_blocking` has been
//! called, new operations are refused while the ones already started run to
//! completion. `try_start` hands out an `OpGuard` that pairs the two calls
//! automatically, including when the operation unwinds.

use serde::Serialize;
use std::sync::{Condvar, Mutex, MutexGuard};
use tracing::{info, warn};

/// Snapshot of the drainer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DrainStatus {
    pub shutting_down: bool,
    pub in_progress_ops: usize,
}

#[derive(Debug, Default)]
struct DrainState {
    shutting_down: bool,
    in_progress_ops: usize,
}

/// Counts in-flight operations and blocks shutdown until they finish.
#[derive(Debug, Default)]
pub struct Drainer {
    state: Mutex<DrainState>,
    idle: Condvar,
}

impl Drainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the start of an operation.
    ///
    /// Returns false, without side effects, once shutdown has begun.
    pub fn start_op(&self) -> bool {
        let mut state = self.state();
        if state.shutting_down {
            return false;
        }
        state.in_progress_ops += 1;
        true
    }

    /// Register the end of an operation started with `start_op`.
    pub fn op_done(&self) {
        let mut state = self.state();
        if state.in_progress_ops == 0 {
            warn!("op_done called with no operation in progress; counter stays at zero");
        } else {
            state.in_progress_ops -= 1;
        }
        if state.in_progress_ops == 0 {
            self.idle.notify_all();
        }
    }

    /// `start_op` returning a guard that calls `op_done` when dropped.
    pub fn try_start(&self) -> Option<OpGuard<'_>> {
        self.start_op().then_some(OpGuard { drainer: self })
    }

    /// Refuse new operations, then block until in-flight ones are done.
    pub fn shutdown_blocking(&self) {
        let mut state = self.state();
        state.shutting_down = true;
        if state.in_progress_ops > 0 {
            info!(
                in_progress = state.in_progress_ops,
                "waiting for in-progress operations to complete"
            );
        }
        while state.in_progress_ops > 0 {
            state = self
                .idle
                .wait(state)
                .unwrap_or_else(|poison| poison.into_inner());
        }
        info!("all in-progress operations complete; shutdown can proceed");
    }

    pub fn status(&self) -> DrainStatus {
        let state = self.state();
        DrainStatus {
            shutting_down: state.shutting_down,
            in_progress_ops: state.in_progress_ops,
        }
    }

    fn state(&self) -> MutexGuard<'_, DrainState> {
        self.state.lock().unwrap_or_else(|poison| poison.into_inner())
    }
}

/// Marks one in-flight operation; dropping it calls `op_done`.
#[derive(Debug)]
#[must_use = "dropping the guard ends the operation immediately"]
pub struct OpGuard<'a> {
    drainer: &'a Drainer,
}

impl Drop for OpGuard<'_> {
    fn drop(&mut self) {
        self.drainer.op_done();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn start_and_done_update_status() {
        let drainer = Drainer::new();
        assert!(drainer.start_op());
        assert!(drainer.start_op());
        assert_eq!(
            drainer.status(),
            DrainStatus {
                shutting_down: false,
                in_progress_ops: 2
            }
        );

        drainer.op_done();
        drainer.op_done();
        assert_eq!(drainer.status().in_progress_ops, 0);
    }

    #[test]
    fn op_done_clamps_at_zero() {
        let drainer = Drainer::new();
        drainer.op_done();
        assert_eq!(drainer.status().in_progress_ops, 0);

        assert!(drainer.start_op());
        assert_eq!(drainer.status().in_progress_ops, 1);
    }

    #[test]
    fn shutdown_with_no_work_returns_immediately() {
        let drainer = Drainer::new();
        drainer.shutdown_blocking();
        assert!(drainer.status().shutting_down);
    }

    #[test]
    fn start_op_refused_after_shutdown() {
        let drainer = Drainer::new();
        drainer.shutdown_blocking();

        for _ in 0..3 {
            assert!(!drainer.start_op());
        }
        assert!(drainer.try_start().is_none());
        assert_eq!(drainer.status().in_progress_ops, 0);
    }

    #[test]
    fn shutdown_waits_for_in_flight_operations() {
        let drainer = Arc::new(Drainer::new());
        assert!(drainer.start_op());

        let finished = Arc::new(AtomicBool::new(false));
        let waiter = {
            let drainer = Arc::clone(&drainer);
            let finished = Arc::clone(&finished);
            thread::spawn(move || {
                drainer.shutdown_blocking();
                finished.store(true, Ordering::SeqCst);
            })
        };

        // Wait until the shutdown flag is observed, then confirm it blocks.
        while !drainer.status().shutting_down {
            thread::sleep(Duration::from_millis(5));
        }
        thread::sleep(Duration::from_millis(50));
        assert!(!finished.load(Ordering::SeqCst));
        assert!(!drainer.start_op());

        drainer.op_done();
        waiter.join().unwrap();
        assert!(finished.load(Ordering::SeqCst));
    }

    #[test]
    fn guard_ends_operation_on_drop() {
        let drainer = Drainer::new();
        {
            let _guard = drainer.try_start().unwrap();
            assert_eq!(drainer.status().in_progress_ops, 1);
        }
        assert_eq!(drainer.status().in_progress_ops, 0);
    }

    #[test]
    fn guard_ends_operation_on_panic() {
        let drainer = Arc::new(Drainer::new());
        let worker = {
            let drainer = Arc::clone(&drainer);
            thread::spawn(move || {
                let _guard = drainer.try_start().unwrap();
                panic!("operation failed");
            })
        };
        assert!(worker.join().is_err());
        assert_eq!(drainer.status().in_progress_ops, 0);

        // Shutdown does not hang on the panicked operation.
        drainer.shutdown_blocking();
    }

    #[test]
    fn many_workers_drain_cleanly() {
        let drainer = Arc::new(Drainer::new());
        let workers: Vec<_> = (0..16)
            .map(|_| {
                let drainer = Arc::clone(&drainer);
                let guard_started = drainer.start_op();
                assert!(guard_started);
                thread::spawn(move || {
                    thread::sleep(Duration::from_millis(10));
                    drainer.op_done();
                })
            })
            .collect();

        drainer.shutdown_blocking();
        assert_eq!(drainer.status().in_progress_ops, 0);
        for worker in workers {
            worker.join().unwrap();
        }
    }
}
