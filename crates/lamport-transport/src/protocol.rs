//! Request and response bodies for the peer RPC endpoints.
//!
//! The clock message itself and its acknowledgement are the core types
//! [`ClockMessage`] and [`Ack`]; this module adds the probe bodies and the
//! route paths shared by server and client.

use lamport_core::ProcessId;
use serde::{Deserialize, Serialize};

pub use lamport_core::peer::{Ack, ClockMessage};

/// Route for delivering a clock message.
pub const SEND_MESSAGE_PATH: &str = "/rpc/send-message";

/// Route for the readiness probe.
pub const READY_CHECK_PATH: &str = "/rpc/ready-check";

/// Route for the completion probe.
pub const FINISH_CHECK_PATH: &str = "/rpc/finish-check";

/// Response to a readiness probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadyResponse {
    /// Whether the process is listening.
    pub is_ready: bool,
}

/// Body of a completion probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishRequest {
    /// The process asking.
    pub sender_id: ProcessId,
}

/// Response to a completion probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishResponse {
    /// Whether the process has left its main loop.
    pub is_finished: bool,
}
