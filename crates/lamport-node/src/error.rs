//! Error types for the `lamport-node` binary.

/// Top-level error for the node binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// Configuration loading or resolution failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: lamport_core::config::ConfigError,
    },

    /// The event log could not be created.
    #[error("event log error: {source}")]
    EventLog {
        /// The underlying event log error.
        #[from]
        source: lamport_core::eventlog::EventLogError,
    },

    /// The RPC server could not be started.
    #[error("server error: {source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: lamport_transport::ServerError,
    },

    /// The RPC client could not be built.
    #[error("client error: {source}")]
    Client {
        /// The underlying client error.
        #[from]
        source: lamport_transport::ClientError,
    },

    /// The run itself failed.
    #[error("runtime error: {source}")]
    Runtime {
        /// The underlying runtime error.
        #[from]
        source: lamport_core::runtime::RuntimeError,
    },
}
