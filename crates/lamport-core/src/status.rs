//! Readiness and completion flags shared with the RPC server.
//!
//! The event loop is the only writer. The server reads both flags on every
//! `ReadyCheck` / `FinishCheck` without taking a lock. Both flags only ever
//! go from `false` to `true`.

use std::sync::atomic::{AtomicBool, Ordering};

/// Lifecycle flags of one process, shared via [`Arc`](std::sync::Arc).
#[derive(Debug, Default)]
pub struct ProcessStatus {
    ready: AtomicBool,
    finished: AtomicBool,
}

impl ProcessStatus {
    /// Create a status with both flags unset.
    pub const fn new() -> Self {
        Self {
            ready: AtomicBool::new(false),
            finished: AtomicBool::new(false),
        }
    }

    /// Whether the RPC server is bound and listening.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Mark the server as listening.
    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }

    /// Whether the main loop has completed and all local work is flushed.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Mark the main loop as complete.
    pub fn mark_finished(&self) {
        self.finished.store(true, Ordering::Release);
    }
}
