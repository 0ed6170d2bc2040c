//! The per-process event loop and its three-phase runtime.
//!
//! [`EventLoop`] owns the logical clock, the consuming end of the mailbox,
//! the peer client, the action source, and the event log. Each call to
//! [`EventLoop::step`] performs exactly one tick:
//!
//! 1. If the mailbox has a message, pop it, apply the Lamport receive rule,
//!    and log `RECEIVE`.
//! 2. Otherwise draw an action. Sends bump the clock once *before* any
//!    network call, so clock progress never depends on delivery. A broadcast
//!    sends the same clock value to every peer.
//!
//! The log line is written right after the clock changes. Failed sends are
//! logged as warnings and counted, never retried.
//!
//! [`ProcessRuntime`] wraps an event loop in the full lifecycle: startup
//! barrier, the timed main loop, `is_finished`, and the shutdown barrier.

use std::io::Write;
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::action::{Action, ActionSource};
use crate::barrier::{self, BarrierError, BarrierOutcome};
use crate::clock::LogicalClock;
use crate::config::RunParameters;
use crate::eventlog::{EventKind, EventLog, EventLogEntry, EventLogError};
use crate::identity::{Peer, ProcessId, ProcessIdentity};
use crate::mailbox::Mailbox;
use crate::peer::{ClockMessage, PeerClient};
use crate::status::ProcessStatus;

/// Errors that end a run.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The event log could not be written.
    #[error("event log error: {source}")]
    EventLog {
        /// The underlying log error.
        #[from]
        source: EventLogError,
    },

    /// A barrier gave up.
    #[error("barrier error: {source}")]
    Barrier {
        /// The underlying barrier error.
        #[from]
        source: BarrierError,
    },

    /// The action source named a process that is not a peer.
    #[error("action targets unknown peer {id}")]
    UnknownPeer {
        /// The unknown id.
        id: ProcessId,
    },

    /// The runtime was started before the RPC server was listening.
    #[error("RPC server is not listening; refusing to start the run")]
    NotReady,
}

/// Per-run counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Main-loop iterations executed.
    pub ticks: u64,
    /// Receive events.
    pub receives: u64,
    /// Single-peer send events.
    pub sends: u64,
    /// Broadcast events.
    pub send_alls: u64,
    /// Internal events.
    pub internals: u64,
    /// Individual deliveries that failed.
    pub failed_sends: u64,
    /// Logical clock after the last tick.
    pub final_clock: u64,
}

impl RunSummary {
    fn record(&mut self, kind: &EventKind, clock: u64) {
        self.ticks = self.ticks.saturating_add(1);
        let counter = match kind {
            EventKind::Receive { .. } => &mut self.receives,
            EventKind::Send { .. } => &mut self.sends,
            EventKind::SendAll => &mut self.send_alls,
            EventKind::Internal => &mut self.internals,
        };
        *counter = counter.saturating_add(1);
        self.final_clock = clock;
    }
}

/// Tick-driven scheduler for one process.
#[derive(Debug)]
pub struct EventLoop<C, A, W>
where
    C: PeerClient,
    A: ActionSource,
    W: Write,
{
    identity: ProcessIdentity,
    clock: LogicalClock,
    mailbox: Mailbox,
    client: C,
    actions: A,
    log: EventLog<W>,
    summary: RunSummary,
}

impl<C, A, W> EventLoop<C, A, W>
where
    C: PeerClient,
    A: ActionSource,
    W: Write + Send,
{
    /// Assemble an event loop. The clock starts at zero.
    pub const fn new(
        identity: ProcessIdentity,
        mailbox: Mailbox,
        client: C,
        actions: A,
        log: EventLog<W>,
    ) -> Self {
        Self {
            identity,
            clock: LogicalClock::new(),
            mailbox,
            client,
            actions,
            log,
            summary: RunSummary {
                ticks: 0,
                receives: 0,
                sends: 0,
                send_alls: 0,
                internals: 0,
                failed_sends: 0,
                final_clock: 0,
            },
        }
    }

    /// This process's identity.
    pub const fn identity(&self) -> &ProcessIdentity {
        &self.identity
    }

    /// Current logical clock.
    pub const fn clock(&self) -> LogicalClock {
        self.clock
    }

    /// Handle to the mailbox this loop consumes.
    pub const fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }

    /// The peer client.
    pub const fn client(&self) -> &C {
        &self.client
    }

    /// Counters so far.
    pub const fn summary(&self) -> RunSummary {
        self.summary
    }

    /// Write the log header. Call once, before the first tick.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::EventLog`] if the sink fails.
    pub fn write_header(&mut self, params: &RunParameters) -> Result<(), RuntimeError> {
        self.log.write_header(params.tick_rate)?;
        Ok(())
    }

    /// Run one tick without waiting. Returns the logged entry.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::EventLog`] if the entry cannot be written, or
    /// [`RuntimeError::UnknownPeer`] if the action source targets a process
    /// outside the peer set.
    pub async fn step(&mut self) -> Result<EventLogEntry, RuntimeError> {
        if let Some(message) = self.mailbox.try_pop() {
            let value = self.clock.merge_received(message.sender_logical_clock);
            debug!(
                from = %message.sender_id,
                remote_clock = message.sender_logical_clock,
                clock = value,
                queued_ms = Utc::now()
                    .signed_duration_since(message.arrival_system_time)
                    .num_milliseconds(),
                "received"
            );
            return self.record(EventKind::Receive {
                from: message.sender_id,
            });
        }

        match self.actions.next_action(self.identity.peers()) {
            Action::SendOne(target) => {
                let peer = self
                    .identity
                    .peer(&target)
                    .cloned()
                    .ok_or(RuntimeError::UnknownPeer { id: target })?;
                let value = self.clock.bump_local();
                let entry = self.record(EventKind::Send {
                    to: peer.id.clone(),
                })?;
                self.deliver(std::slice::from_ref(&peer), value).await;
                Ok(entry)
            }
            Action::SendAll => {
                let value = self.clock.bump_local();
                let entry = self.record(EventKind::SendAll)?;
                let peers = self.identity.peers().to_vec();
                self.deliver(&peers, value).await;
                Ok(entry)
            }
            Action::Internal => {
                self.clock.bump_local();
                self.record(EventKind::Internal)
            }
        }
    }

    /// Run ticks at `params.tick_rate` until `params.run_duration` elapses or
    /// `params.max_ticks` ticks have run.
    ///
    /// Tick deadlines advance by one interval each iteration, so time spent
    /// inside a tick does not lower the effective rate. After an overrun the
    /// next tick starts immediately.
    ///
    /// # Errors
    ///
    /// Propagates any error from [`step`](Self::step).
    pub async fn run_main_loop(
        &mut self,
        params: &RunParameters,
    ) -> Result<RunSummary, RuntimeError> {
        let interval = params.tick_rate.interval();
        let started = Instant::now();
        let end = started.checked_add(params.run_duration);
        let mut next_tick = started.checked_add(interval);
        let mut ticks: u64 = 0;

        info!(
            process = %self.identity.id(),
            tick_rate = %params.tick_rate,
            interval_ms = interval.as_millis(),
            run_duration_secs = params.run_duration.as_secs(),
            max_ticks = ?params.max_ticks,
            "main loop starting"
        );

        while let Some(deadline) = next_tick {
            if params.max_ticks.is_some_and(|max| ticks >= max) {
                break;
            }
            if end.is_some_and(|end| deadline > end) {
                break;
            }

            tokio::time::sleep_until(deadline).await;
            self.step().await?;
            ticks = ticks.saturating_add(1);

            next_tick = deadline
                .checked_add(interval)
                .map(|next| next.max(Instant::now()));
        }

        info!(
            process = %self.identity.id(),
            ticks,
            clock = self.clock.value(),
            pending_messages = self.mailbox.len(),
            "main loop finished"
        );
        Ok(self.summary)
    }

    /// Consume the loop and return its event log.
    pub fn into_log(self) -> EventLog<W> {
        self.log
    }

    fn record(&mut self, kind: EventKind) -> Result<EventLogEntry, RuntimeError> {
        let entry = EventLogEntry {
            kind,
            wall_clock_time: Utc::now(),
            mailbox_depth: self.mailbox.len(),
            logical_clock: self.clock.value(),
        };
        self.log.append(&entry)?;
        self.summary.record(&entry.kind, entry.logical_clock);
        debug!(process = %self.identity.id(), event = %entry, "tick");
        Ok(entry)
    }

    async fn deliver(&mut self, peers: &[Peer], value: u64) {
        let message = ClockMessage {
            sender_id: self.identity.id().clone(),
            sender_logical_clock: value,
            sent_at: Utc::now(),
        };
        let client = &self.client;
        let message = &message;
        let results = join_all(peers.iter().map(|peer| async move {
            (peer, client.send_clock_message(peer.address, message).await)
        }))
        .await;

        for (peer, result) in results {
            match result {
                Ok(ack) => debug!(to = %peer.id, clock = value, ack = %ack.message, "sent"),
                Err(e) => {
                    self.summary.failed_sends = self.summary.failed_sends.saturating_add(1);
                    warn!(to = %peer.id, clock = value, error = %e, "send failed; not retrying");
                }
            }
        }
    }
}

/// Outcome of a complete run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    /// Startup barrier result.
    pub startup: BarrierOutcome,
    /// Main-loop counters.
    pub summary: RunSummary,
    /// Shutdown barrier result.
    pub shutdown: BarrierOutcome,
}

/// A process's full lifecycle around an [`EventLoop`].
#[derive(Debug)]
pub struct ProcessRuntime<C, A, W>
where
    C: PeerClient,
    A: ActionSource,
    W: Write,
{
    event_loop: EventLoop<C, A, W>,
    params: RunParameters,
    status: Arc<ProcessStatus>,
}

impl<C, A, W> ProcessRuntime<C, A, W>
where
    C: PeerClient,
    A: ActionSource,
    W: Write + Send,
{
    /// Create a runtime. `status` must be the same instance the RPC server
    /// reports from.
    pub const fn new(
        event_loop: EventLoop<C, A, W>,
        params: RunParameters,
        status: Arc<ProcessStatus>,
    ) -> Self {
        Self {
            event_loop,
            params,
            status,
        }
    }

    /// Run the startup barrier, the main loop, and the shutdown barrier.
    ///
    /// The RPC server must already be listening (`status.is_ready()`).
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::NotReady`] if the server is not listening,
    /// or any barrier or event log error.
    pub async fn run(self) -> Result<(RunReport, EventLog<W>), RuntimeError> {
        let Self {
            mut event_loop,
            params,
            status,
        } = self;

        if !status.is_ready() {
            return Err(RuntimeError::NotReady);
        }

        let local = event_loop.identity().id().clone();
        let peers = event_loop.identity().peers().to_vec();

        info!(process = %local, "waiting for peers to start");
        let startup =
            barrier::await_peers_ready(event_loop.client(), &local, &peers, &params.barrier)
                .await?;

        event_loop.write_header(&params)?;
        let summary = event_loop.run_main_loop(&params).await?;

        status.mark_finished();
        info!(process = %local, "run finished; waiting for peers to finish");
        let shutdown =
            barrier::await_peers_finished(event_loop.client(), &local, &peers, &params.barrier)
                .await?;

        let report = RunReport {
            startup,
            summary,
            shutdown,
        };
        Ok((report, event_loop.into_log()))
    }
}
