//! Peer RPC transport for the Lamport clock fleet.
//!
//! Every process runs one [`TransportServer`] and one [`HttpPeerClient`].
//! The server accepts clock messages into the process's
//! [`Mailbox`](lamport_core::Mailbox) and answers readiness and completion
//! probes from the shared [`ProcessStatus`](lamport_core::ProcessStatus).
//! The client implements [`PeerClient`](lamport_core::peer::PeerClient) so
//! the core event loop and barriers never see HTTP.
//!
//! # Wire protocol
//!
//! HTTP/1.1 with JSON bodies:
//!
//! - `POST /rpc/send-message` -- deliver a clock message, returns an ack
//! - `GET /rpc/ready-check` -- `{"is_ready": bool}`
//! - `POST /rpc/finish-check` -- `{"is_finished": bool}`

pub mod client;
pub mod error;
pub mod handlers;
pub mod protocol;
pub mod router;
pub mod server;
pub mod state;

pub use client::{ClientError, HttpPeerClient};
pub use router::build_router;
pub use server::{ServerError, TransportServer};
pub use state::AppState;
