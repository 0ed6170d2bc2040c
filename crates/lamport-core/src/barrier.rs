//! Startup and shutdown barriers.
//!
//! Both barriers share one polling shape: sleep for the poll interval, probe
//! every peer, and exit once every probe in a single round came back `true`.
//! Probes are fail-closed, so an unreachable peer holds the barrier.
//!
//! - The **startup** barrier probes `ReadyCheck` and returns once every peer's
//!   RPC server is listening.
//! - The **shutdown** barrier probes `FinishCheck` with this process's id and
//!   returns once every peer has finished its main loop.
//!
//! With `max_rounds: None` a barrier waits forever for a peer that never
//! comes up or never finishes. Setting `max_rounds` turns that into a
//! [`BarrierError::Exhausted`] after the given number of unsatisfied rounds.

use std::collections::BTreeSet;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, info};

use crate::identity::{Peer, ProcessId};
use crate::peer::PeerClient;

/// Which barrier is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierKind {
    /// Wait for every peer's server to listen.
    Startup,
    /// Wait for every peer to finish its main loop.
    Shutdown,
}

impl std::fmt::Display for BarrierKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Startup => f.write_str("startup"),
            Self::Shutdown => f.write_str("shutdown"),
        }
    }
}

/// Barrier polling cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarrierSettings {
    /// Delay before each poll round.
    pub poll_interval: Duration,
    /// Maximum number of unsatisfied rounds before giving up. `None` waits
    /// indefinitely.
    pub max_rounds: Option<u32>,
}

impl Default for BarrierSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            max_rounds: None,
        }
    }
}

/// Result of a satisfied barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarrierOutcome {
    /// Which barrier completed.
    pub kind: BarrierKind,
    /// Number of poll rounds it took, including the satisfying one.
    pub rounds: u32,
}

/// Errors from a barrier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BarrierError {
    /// `max_rounds` elapsed with some peers still not satisfied.
    #[error("{kind} barrier gave up after {rounds} rounds; still waiting on {pending:?}")]
    Exhausted {
        /// Which barrier gave up.
        kind: BarrierKind,
        /// Rounds attempted.
        rounds: u32,
        /// Peers that never reported success.
        pending: Vec<ProcessId>,
    },
}

/// Block until every peer reports ready.
///
/// `local` is this process's id; it only appears in log lines.
///
/// # Errors
///
/// Returns [`BarrierError::Exhausted`] if `settings.max_rounds` is set and
/// reached first.
pub async fn await_peers_ready<C: PeerClient>(
    client: &C,
    local: &ProcessId,
    peers: &[Peer],
    settings: &BarrierSettings,
) -> Result<BarrierOutcome, BarrierError> {
    run_barrier(client, BarrierKind::Startup, local, peers, settings).await
}

/// Block until every peer reports finished.
///
/// Each probe carries `local` as the requester identity.
///
/// # Errors
///
/// Returns [`BarrierError::Exhausted`] if `settings.max_rounds` is set and
/// reached first.
pub async fn await_peers_finished<C: PeerClient>(
    client: &C,
    local: &ProcessId,
    peers: &[Peer],
    settings: &BarrierSettings,
) -> Result<BarrierOutcome, BarrierError> {
    run_barrier(client, BarrierKind::Shutdown, local, peers, settings).await
}

async fn run_barrier<C: PeerClient>(
    client: &C,
    kind: BarrierKind,
    local: &ProcessId,
    peers: &[Peer],
    settings: &BarrierSettings,
) -> Result<BarrierOutcome, BarrierError> {
    info!(
        barrier = %kind,
        process = %local,
        peers = peers.len(),
        poll_interval_ms = settings.poll_interval.as_millis(),
        max_rounds = ?settings.max_rounds,
        "barrier started"
    );

    let mut rounds: u32 = 0;
    let mut reported: BTreeSet<ProcessId> = BTreeSet::new();

    loop {
        tokio::time::sleep(settings.poll_interval).await;
        rounds = rounds.saturating_add(1);

        let results = join_all(peers.iter().map(|peer| async move {
            let ok = probe(client, kind, local, peer).await;
            (peer, ok)
        }))
        .await;

        let mut pending = Vec::new();
        for (peer, ok) in results {
            if ok {
                if reported.insert(peer.id.clone()) {
                    info!(barrier = %kind, peer = %peer.id, round = rounds, "peer satisfied");
                }
            } else {
                pending.push(peer.id.clone());
            }
        }

        if pending.is_empty() {
            info!(barrier = %kind, process = %local, rounds, "barrier satisfied");
            return Ok(BarrierOutcome { kind, rounds });
        }

        info!(
            barrier = %kind,
            round = rounds,
            pending = ?pending.iter().map(ProcessId::as_str).collect::<Vec<_>>(),
            "still waiting"
        );

        if settings.max_rounds.is_some_and(|max| rounds >= max) {
            return Err(BarrierError::Exhausted {
                kind,
                rounds,
                pending,
            });
        }
    }
}

async fn probe<C: PeerClient>(client: &C, kind: BarrierKind, local: &ProcessId, peer: &Peer) -> bool {
    let ok = match kind {
        BarrierKind::Startup => client.probe_ready(peer.address).await,
        BarrierKind::Shutdown => client.probe_finished(peer.address, local).await,
    };
    debug!(barrier = %kind, peer = %peer.id, address = %peer.address, ok, "probe");
    ok
}
