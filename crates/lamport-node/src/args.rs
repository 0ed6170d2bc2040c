//! Command-line arguments for `lamport-node`.

use std::path::PathBuf;

use clap::Parser;
use lamport_core::config::DEFAULT_MODE;
use lamport_core::ProcessId;

/// Run one process of the Lamport clock fleet.
#[derive(Parser, Debug)]
#[command(name = "lamport-node", version, about)]
pub struct Args {
    /// Which fleet member to run (for example `A`).
    pub process_id: ProcessId,

    /// Run number, used in the log file name.
    pub run_id: u32,

    /// Parameter profile from the `modes` section of the config.
    #[arg(long, default_value = DEFAULT_MODE)]
    pub mode: String,

    /// Path to the YAML configuration file. When omitted,
    /// `lamport-config.yaml` is used if present, built-in defaults otherwise.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory the event log is written to.
    #[arg(long, default_value = "log")]
    pub log_dir: PathBuf,
}
