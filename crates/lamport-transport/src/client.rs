//! HTTP implementation of [`PeerClient`].
//!
//! One [`reqwest::Client`] is shared across all peers so connections are
//! pooled. Every request carries the configured timeout. Sends report
//! failures as [`TransportError`]; probes log them at debug level and
//! answer `false`.

use std::net::SocketAddr;
use std::time::Duration;

use lamport_core::peer::{PeerClient, TransportError};
use lamport_core::ProcessId;
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::protocol::{
    Ack, ClockMessage, FinishRequest, FinishResponse, ReadyResponse, FINISH_CHECK_PATH,
    READY_CHECK_PATH, SEND_MESSAGE_PATH,
};

/// Errors constructing the HTTP client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The underlying HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

/// Peer client speaking the JSON RPC protocol over HTTP.
#[derive(Debug, Clone)]
pub struct HttpPeerClient {
    client: reqwest::Client,
}

impl HttpPeerClient {
    /// Create a client whose requests time out after `request_timeout`.
    ///
    /// Proxy environment variables are ignored; peers are always dialed
    /// directly.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Build`] if the HTTP client cannot be built.
    pub fn new(request_timeout: Duration) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .no_proxy()
            .build()?;
        Ok(Self { client })
    }

    /// Send `request` and decode a successful JSON response.
    async fn call<T: DeserializeOwned>(
        request: RequestBuilder,
        target: SocketAddr,
    ) -> Result<T, TransportError> {
        let response = request
            .send()
            .await
            .map_err(|e| TransportError::Unreachable {
                address: target,
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Rejected {
                address: target,
                status: status.as_u16(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| TransportError::InvalidResponse {
                address: target,
                reason: e.to_string(),
            })
    }
}

fn url(target: SocketAddr, path: &str) -> String {
    format!("http://{target}{path}")
}

impl PeerClient for HttpPeerClient {
    async fn send_clock_message(
        &self,
        target: SocketAddr,
        message: &ClockMessage,
    ) -> Result<Ack, TransportError> {
        let request = self
            .client
            .post(url(target, SEND_MESSAGE_PATH))
            .json(message);
        Self::call(request, target).await
    }

    async fn probe_ready(&self, target: SocketAddr) -> bool {
        let request = self.client.get(url(target, READY_CHECK_PATH));
        match Self::call::<ReadyResponse>(request, target).await {
            Ok(response) => response.is_ready,
            Err(e) => {
                debug!(%target, error = %e, "ready probe failed");
                false
            }
        }
    }

    async fn probe_finished(&self, target: SocketAddr, caller: &ProcessId) -> bool {
        let body = FinishRequest {
            sender_id: caller.clone(),
        };
        let request = self
            .client
            .post(url(target, FINISH_CHECK_PATH))
            .json(&body);
        match Self::call::<FinishResponse>(request, target).await {
            Ok(response) => response.is_finished,
            Err(e) => {
                debug!(%target, error = %e, "finish probe failed");
                false
            }
        }
    }
}
