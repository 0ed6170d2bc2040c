//! Integration tests for the RPC endpoints.
//!
//! Tests use Axum's `Router` directly via `tower::ServiceExt` without
//! starting a TCP server.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use lamport_core::{Mailbox, ProcessId, ProcessStatus};
use lamport_transport::router::build_router;
use lamport_transport::state::AppState;
use serde_json::{json, Value};
use tower::ServiceExt;

struct Harness {
    router: Router,
    mailbox: Mailbox,
    status: Arc<ProcessStatus>,
}

fn harness(id: &str) -> Harness {
    let mailbox = Mailbox::new();
    let status = Arc::new(ProcessStatus::new());
    let state = Arc::new(AppState::new(
        ProcessId::new(id).unwrap(),
        mailbox.clone(),
        Arc::clone(&status),
    ));
    Harness {
        router: build_router(state, 3),
        mailbox,
        status,
    }
}

fn post_json(path: &str, body: &Value) -> Request<Body> {
    Request::post(path)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_ready_check_follows_status() {
    let h = harness("A");

    let response = h
        .router
        .clone()
        .oneshot(Request::get("/rpc/ready-check").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_to_json(response.into_body()).await, json!({"is_ready": false}));

    h.status.mark_ready();
    let response = h
        .router
        .oneshot(Request::get("/rpc/ready-check").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(body_to_json(response.into_body()).await, json!({"is_ready": true}));
}

#[tokio::test]
async fn test_send_message_queues_and_acks() {
    let h = harness("B");
    let sent_at = Utc::now();
    let before = Utc::now();

    let response = h
        .router
        .oneshot(post_json(
            "/rpc/send-message",
            &json!({
                "sender_id": "A",
                "sender_logical_clock": 7,
                "sent_at": sent_at,
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_to_json(response.into_body()).await,
        json!({"message": "Ack from B"})
    );

    assert_eq!(h.mailbox.len(), 1);
    let message = h.mailbox.try_pop().unwrap();
    assert_eq!(message.sender_id.as_str(), "A");
    assert_eq!(message.sender_logical_clock, 7);
    assert_eq!(message.sent_at, sent_at);
    assert!(message.arrival_system_time >= before);
}

#[tokio::test]
async fn test_messages_queue_in_arrival_order() {
    let h = harness("C");
    for clock in 1..=3_u64 {
        let response = h
            .router
            .clone()
            .oneshot(post_json(
                "/rpc/send-message",
                &json!({
                    "sender_id": "A",
                    "sender_logical_clock": clock,
                    "sent_at": Utc::now(),
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let clocks: Vec<u64> = std::iter::from_fn(|| h.mailbox.try_pop())
        .map(|m| m.sender_logical_clock)
        .collect();
    assert_eq!(clocks, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_finish_check_follows_status() {
    let h = harness("A");

    let response = h
        .router
        .clone()
        .oneshot(post_json("/rpc/finish-check", &json!({"sender_id": "C"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_to_json(response.into_body()).await,
        json!({"is_finished": false})
    );

    h.status.mark_finished();
    let response = h
        .router
        .oneshot(post_json("/rpc/finish-check", &json!({"sender_id": "C"})))
        .await
        .unwrap();
    assert_eq!(
        body_to_json(response.into_body()).await,
        json!({"is_finished": true})
    );
}

#[tokio::test]
async fn test_malformed_message_is_bad_request() {
    let h = harness("A");

    let response = h
        .router
        .clone()
        .oneshot(post_json(
            "/rpc/send-message",
            &json!({"sender_id": "B", "sender_logical_clock": "seven"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_to_json(response.into_body()).await;
    assert_eq!(body["status"], 400);
    assert!(body["error"].is_string());
    assert!(h.mailbox.is_empty());

    let response = h
        .router
        .oneshot(
            Request::post("/rpc/finish-check")
                .body(Body::from("not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_invalid_sender_id_is_rejected() {
    let h = harness("A");
    let response = h
        .router
        .oneshot(post_json(
            "/rpc/send-message",
            &json!({
                "sender_id": "not a name",
                "sender_logical_clock": 1,
                "sent_at": Utc::now(),
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(h.mailbox.is_empty());
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let h = harness("A");
    let response = h
        .router
        .oneshot(Request::get("/rpc/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_concurrency_limit_spans_all_routes() {
    let mailbox = Mailbox::new();
    let status = Arc::new(ProcessStatus::new());
    status.mark_ready();
    let state = Arc::new(AppState::new(ProcessId::new("A").unwrap(), mailbox, status));
    let router = build_router(state, 1);

    // A send whose body never arrives holds the only slot.
    let stalled_body =
        Body::from_stream(futures::stream::pending::<Result<String, std::io::Error>>());
    let held = tokio::spawn(
        router.clone().oneshot(
            Request::post("/rpc/send-message")
                .header(header::CONTENT_TYPE, "application/json")
                .body(stalled_body)
                .unwrap(),
        ),
    );
    tokio::time::sleep(Duration::from_millis(50)).await;

    let ready = || Request::get("/rpc/ready-check").body(Body::empty()).unwrap();
    let blocked =
        tokio::time::timeout(Duration::from_millis(300), router.clone().oneshot(ready())).await;
    assert!(blocked.is_err(), "ready-check ran while the only slot was held");

    held.abort();
    let _ = held.await;

    let response = tokio::time::timeout(Duration::from_secs(2), router.oneshot(ready()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
