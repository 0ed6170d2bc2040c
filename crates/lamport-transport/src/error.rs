//! Error responses for the RPC server.
//!
//! [`RpcError`] converts into an HTTP response with a JSON body of the form
//! `{"error": "...", "status": 400}`.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors returned by the RPC handlers.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// The request body was missing or not the expected JSON.
    #[error("malformed request: {0}")]
    BadRequest(String),
}

impl From<JsonRejection> for RpcError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
