//! Logical clock runtime for a small fleet of message-passing processes.
//!
//! Each process keeps a Lamport clock, runs at its own tick rate, and on
//! every tick either drains one inbound message or performs a random
//! action (send to one peer, send to all, or an internal step). Two polling
//! barriers bracket the run so that independently scheduled processes start
//! and stop together.
//!
//! # Modules
//!
//! - [`clock`] -- The Lamport clock and its two update rules.
//! - [`mailbox`] -- FIFO of inbound messages shared with the RPC server.
//! - [`status`] -- Atomic `is_ready` / `is_finished` flags.
//! - [`identity`] -- Process names, addresses, and peer sets.
//! - [`config`] -- `lamport-config.yaml` loading and run parameters.
//! - [`action`] -- Action kinds, the die-roll mapping, and [`ActionSource`].
//! - [`eventlog`] -- The append-only per-run event log.
//! - [`peer`] -- The [`PeerClient`] seam implemented by the transport.
//! - [`barrier`] -- Startup and shutdown polling barriers.
//! - [`runtime`] -- [`EventLoop`] and [`ProcessRuntime`].
//!
//! [`ActionSource`]: action::ActionSource
//! [`PeerClient`]: peer::PeerClient
//! [`EventLoop`]: runtime::EventLoop
//! [`ProcessRuntime`]: runtime::ProcessRuntime

pub mod action;
pub mod barrier;
pub mod clock;
pub mod config;
pub mod eventlog;
pub mod identity;
pub mod mailbox;
pub mod peer;
pub mod runtime;
pub mod status;

pub use clock::LogicalClock;
pub use identity::{Peer, ProcessId, ProcessIdentity};
pub use mailbox::{InboundMessage, Mailbox};
pub use status::ProcessStatus;
