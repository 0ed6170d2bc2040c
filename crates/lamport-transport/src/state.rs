//! Shared state behind the RPC handlers.

use std::sync::Arc;

use lamport_core::{Mailbox, ProcessId, ProcessStatus};

/// State shared by every request handler.
///
/// The mailbox and status are the same instances the process's event loop
/// and runtime hold, so a delivered message is visible to the next tick and
/// a flag set by the runtime is visible to the next probe.
#[derive(Debug)]
pub struct AppState {
    /// This process's id, used in acknowledgements.
    pub process_id: ProcessId,
    /// Inbound message queue.
    pub mailbox: Mailbox,
    /// Readiness and completion flags.
    pub status: Arc<ProcessStatus>,
}

impl AppState {
    /// Create state for `process_id` sharing `mailbox` and `status`.
    pub const fn new(process_id: ProcessId, mailbox: Mailbox, status: Arc<ProcessStatus>) -> Self {
        Self {
            process_id,
            mailbox,
            status,
        }
    }
}
