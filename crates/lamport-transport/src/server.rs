//! RPC server lifecycle.
//!
//! [`TransportServer::bind`] binds the listening socket and marks the
//! process ready in one step, so a process is never reported ready before
//! it can accept a connection. Serving happens in a background task started
//! by [`TransportServer::spawn`].

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use lamport_core::ProcessId;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::router::build_router;
use crate::state::AppState;

/// Errors that can occur when starting or running the RPC server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to the network address.
    #[error("bind failed on {address}: {source}")]
    Bind {
        /// The address that could not be bound.
        address: SocketAddr,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The server encountered a fatal error while serving.
    #[error("serve error: {0}")]
    Serve(String),
}

/// A bound, ready RPC server that has not started serving yet.
#[derive(Debug)]
pub struct TransportServer {
    listener: TcpListener,
    router: Router,
    local_addr: SocketAddr,
    process_id: ProcessId,
}

impl TransportServer {
    /// Bind `address` and mark the process ready.
    ///
    /// Port 0 binds an ephemeral port; use
    /// [`local_addr`](Self::local_addr) to find it.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the socket cannot be bound. The ready
    /// flag is left unset in that case.
    pub async fn bind(
        address: SocketAddr,
        state: Arc<AppState>,
        max_concurrent_requests: usize,
    ) -> Result<Self, ServerError> {
        let bind_err = |source| ServerError::Bind { address, source };
        let listener = TcpListener::bind(address).await.map_err(bind_err)?;
        let local_addr = listener.local_addr().map_err(bind_err)?;

        state.status.mark_ready();
        info!(process = %state.process_id, addr = %local_addr, "RPC server listening");

        Ok(Self {
            listener,
            router: build_router(Arc::clone(&state), max_concurrent_requests),
            local_addr,
            process_id: state.process_id.clone(),
        })
    }

    /// The address the server is listening on.
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve requests until the task is dropped or an I/O error occurs.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Serve`] if the accept loop fails.
    pub async fn serve(self) -> Result<(), ServerError> {
        axum::serve(self.listener, self.router)
            .await
            .map_err(|e| ServerError::Serve(e.to_string()))
    }

    /// Serve in a background task. Serve errors are logged.
    pub fn spawn(self) -> JoinHandle<()> {
        let process_id = self.process_id.clone();
        tokio::spawn(async move {
            if let Err(e) = self.serve().await {
                error!(process = %process_id, error = %e, "RPC server stopped");
            }
        })
    }
}
