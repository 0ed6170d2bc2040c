//! Process binary for the Lamport clock fleet.
//!
//! Runs one fleet member end to end. Start one instance per process id,
//! in any order:
//!
//! ```bash
//! lamport-node A 1 & lamport-node B 1 & lamport-node C 1
//! ```
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration and resolve this process's parameters
//! 3. Bind the RPC server (marks the process ready)
//! 4. Create the event log under `--log-dir`
//! 5. Run the startup barrier, the main loop, and the shutdown barrier
//! 6. Keep answering probes briefly so slower peers can finish, then exit

mod args;
mod error;

use std::fs::File;
use std::io::LineWriter;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use lamport_core::action::RandomActionSource;
use lamport_core::config::{SimulationConfig, DEFAULT_CONFIG_PATH};
use lamport_core::eventlog::{log_file_name, EventLog};
use lamport_core::runtime::{EventLoop, ProcessRuntime};
use lamport_core::{Mailbox, ProcessId, ProcessIdentity, ProcessStatus};
use lamport_transport::{AppState, HttpPeerClient, TransportServer};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::args::Args;
use crate::error::NodeError;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, startup, or the run itself fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let args = Args::parse();
    run(args).await?;
    Ok(())
}

async fn run(args: Args) -> Result<(), NodeError> {
    let config = load_config(args.config.as_deref())?;
    let (identity, params) = config.resolve(&args.process_id, &args.mode)?;
    info!(
        process = %identity.id(),
        run_id = args.run_id,
        mode = %args.mode,
        listen = %identity.listen_address(),
        peers = identity.peers().len(),
        tick_rate = %params.tick_rate,
        action_space_size = params.action_space_size,
        "Configuration loaded"
    );

    let mailbox = Mailbox::new();
    let status = Arc::new(ProcessStatus::new());
    let state = Arc::new(AppState::new(
        identity.id().clone(),
        mailbox.clone(),
        Arc::clone(&status),
    ));
    let (server, log) = bind_and_open_log(&args, &identity, &config, state).await?;
    let server_task = server.spawn();

    let client = HttpPeerClient::new(config.transport.request_timeout())?;
    let actions = RandomActionSource::new(
        params.action_space_size,
        params.seed.map(|seed| process_seed(seed, identity.id())),
    );
    let linger = params
        .barrier
        .poll_interval
        .saturating_mul(2)
        .saturating_add(config.transport.request_timeout());

    let event_loop = EventLoop::new(identity, mailbox, client, actions, log);
    let (report, _log) = ProcessRuntime::new(event_loop, params, status)
        .run()
        .await?;

    let summary = report.summary;
    info!(
        ticks = summary.ticks,
        final_clock = summary.final_clock,
        receives = summary.receives,
        sends = summary.sends,
        send_alls = summary.send_alls,
        internals = summary.internals,
        failed_sends = summary.failed_sends,
        startup_rounds = report.startup.rounds,
        shutdown_rounds = report.shutdown.rounds,
        "Run complete"
    );

    linger_for_peers(linger).await;
    server_task.abort();
    Ok(())
}

/// Bind the RPC server, then create (truncating) this run's event log.
///
/// A failed bind leaves any existing log for the same run untouched.
async fn bind_and_open_log(
    args: &Args,
    identity: &ProcessIdentity,
    config: &SimulationConfig,
    state: Arc<AppState>,
) -> Result<(TransportServer, EventLog<LineWriter<File>>), NodeError> {
    let server = TransportServer::bind(
        identity.listen_address(),
        state,
        config.transport.max_concurrent_requests,
    )
    .await?;

    let log_path = args
        .log_dir
        .join(log_file_name(identity.id(), args.run_id, &args.mode));
    let log = EventLog::create(&log_path)?;
    info!(path = %log_path.display(), "Event log created");
    Ok((server, log))
}

/// Load the configuration file.
///
/// An explicit path must exist. Without one, `lamport-config.yaml` is used
/// when present and the built-in defaults otherwise.
fn load_config(path: Option<&Path>) -> Result<SimulationConfig, NodeError> {
    if let Some(path) = path {
        return Ok(SimulationConfig::from_file(path)?);
    }
    let default_path = Path::new(DEFAULT_CONFIG_PATH);
    if default_path.exists() {
        Ok(SimulationConfig::from_file(default_path)?)
    } else {
        info!("Config file not found, using defaults");
        Ok(SimulationConfig::default())
    }
}

/// Derive a per-process RNG seed so processes sharing a configured seed do
/// not roll identical sequences.
fn process_seed(seed: u64, id: &ProcessId) -> u64 {
    id.as_str()
        .bytes()
        .fold(seed, |acc, byte| acc.rotate_left(8) ^ u64::from(byte))
}

/// Peers still in their shutdown barrier may probe this process once more
/// after it is satisfied; the server stays up long enough to answer.
async fn linger_for_peers(linger: Duration) {
    info!(linger_ms = linger.as_millis(), "Answering final peer probes");
    tokio::time::sleep(linger).await;
}
