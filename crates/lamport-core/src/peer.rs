//! Peer client abstraction.
//!
//! The event loop and the barriers talk to other processes only through the
//! [`PeerClient`] trait. The production implementation is the HTTP client
//! in `lamport-transport`; tests use in-memory fakes that deliver straight
//! into another process's [`Mailbox`](crate::mailbox::Mailbox).
//!
//! Probes are fail-closed: an implementation must map every transport
//! failure to `false`, never to an error.

use std::future::Future;
use std::net::SocketAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::ProcessId;

/// A clock message as sent to a peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockMessage {
    /// The sending process.
    pub sender_id: ProcessId,
    /// The sender's logical clock at send time.
    pub sender_logical_clock: u64,
    /// The sender's wall-clock time at send time.
    pub sent_at: DateTime<Utc>,
}

/// Acknowledgement returned by a peer for a delivered clock message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    /// Human-readable acknowledgement text.
    pub message: String,
}

/// Failure to deliver an RPC to a peer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The peer could not be reached (refused, reset, timed out).
    #[error("peer {address} unreachable: {reason}")]
    Unreachable {
        /// The peer's address.
        address: SocketAddr,
        /// What went wrong.
        reason: String,
    },

    /// The peer answered with a non-success status.
    #[error("peer {address} rejected request with status {status}")]
    Rejected {
        /// The peer's address.
        address: SocketAddr,
        /// The HTTP status code.
        status: u16,
    },

    /// The peer's response could not be decoded.
    #[error("invalid response from {address}: {reason}")]
    InvalidResponse {
        /// The peer's address.
        address: SocketAddr,
        /// What went wrong.
        reason: String,
    },
}

/// Client side of the peer RPC surface.
///
/// Implementations never retry internally. Retry policy belongs to callers:
/// the event loop does not retry sends, and the barriers retry by polling.
pub trait PeerClient: Send + Sync {
    /// Deliver a clock message to the peer at `target`.
    fn send_clock_message(
        &self,
        target: SocketAddr,
        message: &ClockMessage,
    ) -> impl Future<Output = Result<Ack, TransportError>> + Send;

    /// Ask whether the peer at `target` is listening. Any failure is `false`.
    fn probe_ready(&self, target: SocketAddr) -> impl Future<Output = bool> + Send;

    /// Ask whether the peer at `target` has finished its run. Any failure is
    /// `false`. `caller` is reported to the peer for its own logging.
    fn probe_finished(
        &self,
        target: SocketAddr,
        caller: &ProcessId,
    ) -> impl Future<Output = bool> + Send;
}
