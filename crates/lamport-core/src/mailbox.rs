//! Inbound message queue shared by the RPC server and the event loop.
//!
//! The server pushes one [`InboundMessage`] per received clock message; the
//! event loop pops at most one per tick. The queue is unbounded and strictly
//! FIFO: nothing is reordered or dropped.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::ProcessId;

/// A clock message received from a peer, waiting to be processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// The peer that sent the message.
    pub sender_id: ProcessId,
    /// The sender's logical clock at the moment it sent.
    pub sender_logical_clock: u64,
    /// The sender's wall-clock timestamp, as carried on the wire.
    pub sent_at: DateTime<Utc>,
    /// Local wall-clock time at which the RPC server received the message.
    pub arrival_system_time: DateTime<Utc>,
}

/// Unbounded FIFO of [`InboundMessage`] values.
///
/// Cloning a `Mailbox` yields another handle to the same queue.
#[derive(Debug, Clone, Default)]
pub struct Mailbox {
    inner: Arc<Mutex<VecDeque<InboundMessage>>>,
}

impl Mailbox {
    /// Create an empty mailbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message at the back of the queue.
    ///
    /// Holds the lock only for the push itself; never waits on the consumer.
    pub fn push(&self, message: InboundMessage) {
        self.lock().push_back(message);
    }

    /// Remove and return the oldest message, if any.
    pub fn try_pop(&self) -> Option<InboundMessage> {
        self.lock().pop_front()
    }

    /// Current queue depth. A snapshot; it may change immediately after.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the queue is currently empty.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A panic while holding the lock cannot leave the deque half-modified,
    // so a poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, VecDeque<InboundMessage>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
