//! RPC endpoint handlers.
//!
//! Handlers never touch the logical clock. A delivered message is stamped
//! with its arrival time and queued; the event loop applies the receive
//! rule when it pops it.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use chrono::Utc;
use lamport_core::InboundMessage;
use tracing::{debug, info};

use crate::error::RpcError;
use crate::protocol::{Ack, ClockMessage, FinishRequest, FinishResponse, ReadyResponse};
use crate::state::AppState;

/// Queue a clock message from a peer and acknowledge it.
///
/// # Route
///
/// `POST /rpc/send-message`
///
/// # Errors
///
/// Returns [`RpcError::BadRequest`] if the body is not a clock message.
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ClockMessage>, JsonRejection>,
) -> Result<Json<Ack>, RpcError> {
    let Json(message) = payload?;
    debug!(
        from = %message.sender_id,
        clock = message.sender_logical_clock,
        "clock message received"
    );

    state.mailbox.push(InboundMessage {
        sender_id: message.sender_id,
        sender_logical_clock: message.sender_logical_clock,
        sent_at: message.sent_at,
        arrival_system_time: Utc::now(),
    });

    Ok(Json(Ack {
        message: format!("Ack from {}", state.process_id),
    }))
}

/// Report whether this process is listening.
///
/// # Route
///
/// `GET /rpc/ready-check`
pub async fn ready_check(State(state): State<Arc<AppState>>) -> Json<ReadyResponse> {
    Json(ReadyResponse {
        is_ready: state.status.is_ready(),
    })
}

/// Report whether this process has finished its main loop.
///
/// # Route
///
/// `POST /rpc/finish-check`
///
/// # Errors
///
/// Returns [`RpcError::BadRequest`] if the body does not name the caller.
pub async fn finish_check(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<FinishRequest>, JsonRejection>,
) -> Result<Json<FinishResponse>, RpcError> {
    let Json(request) = payload?;
    let is_finished = state.status.is_finished();
    info!(caller = %request.sender_id, is_finished, "finish check");
    Ok(Json(FinishResponse { is_finished }))
}
