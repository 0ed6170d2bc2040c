//! Integration tests against live RPC servers.
//!
//! Each test binds real servers on ephemeral loopback ports and talks to
//! them through [`HttpPeerClient`].

#![allow(clippy::unwrap_used)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use lamport_core::action::{Action, RandomActionSource, ScriptedActionSource};
use lamport_core::barrier::{self, BarrierError, BarrierSettings};
use lamport_core::config::{RunParameters, TickRate};
use lamport_core::eventlog::{EventKind, EventLog};
use lamport_core::peer::{ClockMessage, PeerClient, TransportError};
use lamport_core::runtime::{EventLoop, ProcessRuntime};
use lamport_core::{Mailbox, Peer, ProcessId, ProcessIdentity, ProcessStatus};
use lamport_transport::{AppState, HttpPeerClient, ServerError, TransportServer};
use tokio::task::JoinHandle;

struct Node {
    id: ProcessId,
    addr: SocketAddr,
    mailbox: Mailbox,
    status: Arc<ProcessStatus>,
    server: JoinHandle<()>,
}

impl Drop for Node {
    fn drop(&mut self) {
        self.server.abort();
    }
}

fn pid(name: &str) -> ProcessId {
    ProcessId::new(name).unwrap()
}

fn loopback() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 0))
}

fn client() -> HttpPeerClient {
    HttpPeerClient::new(Duration::from_millis(500)).unwrap()
}

async fn start_node(name: &str) -> Node {
    let id = pid(name);
    let mailbox = Mailbox::new();
    let status = Arc::new(ProcessStatus::new());
    let state = Arc::new(AppState::new(id.clone(), mailbox.clone(), Arc::clone(&status)));
    let server = TransportServer::bind(loopback(), state, 3).await.unwrap();
    let addr = server.local_addr();
    Node {
        id,
        addr,
        mailbox,
        status,
        server: server.spawn(),
    }
}

fn identity_of(node: &Node, fleet: &[&Node]) -> ProcessIdentity {
    let peers = fleet
        .iter()
        .map(|other| Peer {
            id: other.id.clone(),
            address: other.addr,
        })
        .collect();
    ProcessIdentity::from_parts(node.id.clone(), node.addr, peers)
}

/// An address nothing is listening on.
fn dead_address() -> SocketAddr {
    let listener = std::net::TcpListener::bind(loopback()).unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

fn fast_params(tick_rate: f64, max_ticks: u64) -> RunParameters {
    RunParameters::new(TickRate::new(tick_rate).unwrap(), 10, Duration::from_secs(30))
        .unwrap()
        .with_max_ticks(Some(max_ticks))
        .with_barrier(BarrierSettings {
            poll_interval: Duration::from_millis(50),
            max_rounds: Some(200),
        })
}

/// Parse `(kind, depth, clock)` from every entry line of a log.
fn entries(log: EventLog<Vec<u8>>) -> Vec<(String, u64, u64)> {
    let text = String::from_utf8(log.into_inner()).unwrap();
    let mut lines = text.lines();
    assert!(lines.next().unwrap().starts_with("Clock Rate: "));
    assert!(lines.next().unwrap().chars().all(|c| c == '-'));
    lines
        .map(|line| {
            let fields: Vec<&str> = line.split(" | ").collect();
            assert_eq!(fields.len(), 4, "bad log line {line:?}");
            (
                fields[0].to_owned(),
                fields[2].parse().unwrap(),
                fields[3].parse().unwrap(),
            )
        })
        .collect()
}

#[tokio::test]
async fn test_probes_fail_closed_when_unreachable() {
    let client = client();
    let target = dead_address();

    assert!(!client.probe_ready(target).await);
    assert!(!client.probe_finished(target, &pid("A")).await);

    let message = ClockMessage {
        sender_id: pid("A"),
        sender_logical_clock: 1,
        sent_at: Utc::now(),
    };
    let err = client.send_clock_message(target, &message).await.unwrap_err();
    assert!(matches!(err, TransportError::Unreachable { address, .. } if address == target));
}

#[tokio::test]
async fn test_probes_report_live_status() {
    let node = start_node("B").await;
    let client = client();

    assert!(node.status.is_ready());
    assert!(client.probe_ready(node.addr).await);
    assert!(!client.probe_finished(node.addr, &pid("A")).await);

    node.status.mark_finished();
    assert!(client.probe_finished(node.addr, &pid("A")).await);
}

#[tokio::test]
async fn test_send_delivers_into_mailbox() {
    let node = start_node("B").await;
    let client = client();

    let message = ClockMessage {
        sender_id: pid("A"),
        sender_logical_clock: 4,
        sent_at: Utc::now(),
    };
    let ack = client.send_clock_message(node.addr, &message).await.unwrap();
    assert_eq!(ack.message, "Ack from B");

    let queued = node.mailbox.try_pop().unwrap();
    assert_eq!(queued.sender_id, pid("A"));
    assert_eq!(queued.sender_logical_clock, 4);
    assert!(queued.arrival_system_time >= queued.sent_at);
}

#[tokio::test]
async fn test_bind_failure_leaves_process_not_ready() {
    let holder = tokio::net::TcpListener::bind(loopback()).await.unwrap();
    let taken = holder.local_addr().unwrap();

    let status = Arc::new(ProcessStatus::new());
    let state = Arc::new(AppState::new(pid("A"), Mailbox::new(), Arc::clone(&status)));
    let err = TransportServer::bind(taken, state, 3).await.unwrap_err();

    assert!(matches!(err, ServerError::Bind { address, .. } if address == taken));
    assert!(!status.is_ready());
}

#[tokio::test]
async fn test_startup_barrier_over_http() {
    let a = start_node("A").await;
    let b = start_node("B").await;
    let identity = identity_of(&a, &[&b]);
    let settings = BarrierSettings {
        poll_interval: Duration::from_millis(20),
        max_rounds: Some(50),
    };

    let outcome = barrier::await_peers_ready(&client(), identity.id(), identity.peers(), &settings)
        .await
        .unwrap();
    assert_eq!(outcome.rounds, 1);

    let gone = Peer {
        id: pid("C"),
        address: dead_address(),
    };
    let settings = BarrierSettings {
        poll_interval: Duration::from_millis(10),
        max_rounds: Some(3),
    };
    let err = barrier::await_peers_ready(&client(), identity.id(), &[gone], &settings)
        .await
        .unwrap_err();
    assert!(matches!(err, BarrierError::Exhausted { ref pending, .. } if pending == &[pid("C")]));
}

#[tokio::test]
async fn test_cross_process_send_updates_receiver() {
    let a = start_node("A").await;
    let b = start_node("B").await;

    let mut sender = EventLoop::new(
        identity_of(&a, &[&b]),
        a.mailbox.clone(),
        client(),
        ScriptedActionSource::new(vec![Action::SendOne(pid("B"))]),
        EventLog::new(Vec::new()),
    );
    let mut receiver = EventLoop::new(
        identity_of(&b, &[&a]),
        b.mailbox.clone(),
        client(),
        ScriptedActionSource::internal_only(),
        EventLog::new(Vec::new()),
    );

    let sent = sender.step().await.unwrap();
    assert_eq!(sent.kind, EventKind::Send { to: pid("B") });
    assert_eq!(sent.logical_clock, 1);
    assert_eq!(sender.summary().failed_sends, 0);
    assert_eq!(b.mailbox.len(), 1);

    let received = receiver.step().await.unwrap();
    assert_eq!(received.kind, EventKind::Receive { from: pid("A") });
    assert_eq!(received.logical_clock, 2);
    assert_eq!(received.mailbox_depth, 0);
}

#[tokio::test]
async fn test_three_processes_internal_only() {
    let a = start_node("A").await;
    let b = start_node("B").await;
    let c = start_node("C").await;

    let runtime = |node: &Node, peers: &[&Node]| {
        let event_loop = EventLoop::new(
            identity_of(node, peers),
            node.mailbox.clone(),
            client(),
            ScriptedActionSource::internal_only(),
            EventLog::new(Vec::new()),
        );
        ProcessRuntime::new(event_loop, fast_params(1.0, 3), Arc::clone(&node.status))
    };

    let (ra, rb, rc) = tokio::join!(
        runtime(&a, &[&b, &c]).run(),
        runtime(&b, &[&a, &c]).run(),
        runtime(&c, &[&a, &b]).run(),
    );

    for (node, result) in [(&a, ra), (&b, rb), (&c, rc)] {
        let (report, log) = result.unwrap();
        assert_eq!(report.summary.ticks, 3);
        assert_eq!(report.summary.internals, 3);
        assert_eq!(report.summary.final_clock, 3);
        assert!(node.status.is_finished());
        assert_eq!(
            entries(log),
            vec![
                ("INTERNAL".to_owned(), 0, 1),
                ("INTERNAL".to_owned(), 0, 2),
                ("INTERNAL".to_owned(), 0, 3),
            ]
        );
    }
}

#[tokio::test]
async fn test_random_traffic_keeps_clocks_increasing() {
    let a = start_node("A").await;
    let b = start_node("B").await;
    let c = start_node("C").await;

    let runtime = |node: &Node, peers: &[&Node], rate: f64, seed: u64| {
        let event_loop = EventLoop::new(
            identity_of(node, peers),
            node.mailbox.clone(),
            client(),
            RandomActionSource::new(4, Some(seed)),
            EventLog::new(Vec::new()),
        );
        ProcessRuntime::new(event_loop, fast_params(rate, 20), Arc::clone(&node.status))
    };

    let (ra, rb, rc) = tokio::join!(
        runtime(&a, &[&b, &c], 20.0, 1).run(),
        runtime(&b, &[&a, &c], 30.0, 2).run(),
        runtime(&c, &[&a, &b], 40.0, 3).run(),
    );

    let mut sends = 0;
    let mut receives = 0;
    for result in [ra, rb, rc] {
        let (report, log) = result.unwrap();
        assert_eq!(report.summary.failed_sends, 0);
        sends += report.summary.sends + 2 * report.summary.send_alls;
        receives += report.summary.receives;

        let clocks: Vec<u64> = entries(log).into_iter().map(|(_, _, clock)| clock).collect();
        assert_eq!(clocks.len(), 20);
        assert!(clocks.windows(2).all(|w| w[0] < w[1]));
    }
    assert!(sends > 0);
    assert!(receives <= sends);
}
