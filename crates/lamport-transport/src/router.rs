//! Axum router construction for the peer RPC server.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::protocol::{FINISH_CHECK_PATH, READY_CHECK_PATH, SEND_MESSAGE_PATH};
use crate::state::AppState;

/// Build the RPC router.
///
/// The router includes:
/// - `POST /rpc/send-message` -- queue a clock message
/// - `GET /rpc/ready-check` -- readiness probe
/// - `POST /rpc/finish-check` -- completion probe
///
/// At most `max_concurrent_requests` requests are handled at once across
/// all routes; further requests wait for a slot. A limit of zero is treated
/// as one.
pub fn build_router(state: Arc<AppState>, max_concurrent_requests: usize) -> Router {
    Router::new()
        .route(SEND_MESSAGE_PATH, post(handlers::send_message))
        .route(READY_CHECK_PATH, get(handlers::ready_check))
        .route(FINISH_CHECK_PATH, post(handlers::finish_check))
        .layer(GlobalConcurrencyLimitLayer::new(max_concurrent_requests.max(1)))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
