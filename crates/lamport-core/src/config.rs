//! Configuration loading and typed config structures.
//!
//! The canonical configuration lives in `lamport-config.yaml` next to the
//! binary's working directory. It describes the fixed fleet (member names and
//! addresses), run bounds, barrier cadence, transport limits, and a table of
//! named *modes*. A mode assigns each member its tick rate and action space.
//!
//! The file is read once at startup. [`SimulationConfig::resolve`] turns it
//! into the two immutable values a process runs with: its
//! [`ProcessIdentity`] and its [`RunParameters`]. Nothing consults the
//! config table after that.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::barrier::BarrierSettings;
use crate::identity::{ProcessId, ProcessIdentity};

/// Default configuration file name, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "lamport-config.yaml";

/// Mode used when none is given on the command line.
pub const DEFAULT_MODE: &str = "default";

/// Errors that can occur when loading or resolving configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The requested process is not a member of the fleet.
    #[error("unknown process id {id} (fleet: {known})")]
    UnknownProcess {
        /// The id that was requested.
        id: ProcessId,
        /// Comma-separated list of fleet members.
        known: String,
    },

    /// The requested mode is not in the mode table.
    #[error("unknown mode {mode:?} (available: {known})")]
    UnknownMode {
        /// The mode that was requested.
        mode: String,
        /// Comma-separated list of configured modes.
        known: String,
    },

    /// The mode exists but has no profile for this process.
    #[error("mode {mode:?} has no profile for process {id}")]
    MissingProfile {
        /// The mode that was requested.
        mode: String,
        /// The process lacking a profile.
        id: ProcessId,
    },

    /// A value is outside its allowed range.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration. Mirrors the structure of `lamport-config.yaml`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SimulationConfig {
    /// Every fleet member and the address its RPC server binds to.
    #[serde(default = "default_fleet")]
    pub fleet: BTreeMap<ProcessId, SocketAddr>,

    /// Run bounds shared by all modes.
    #[serde(default)]
    pub run: RunConfig,

    /// Startup and shutdown barrier cadence.
    #[serde(default)]
    pub barrier: BarrierConfig,

    /// RPC client and server limits.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Named profiles: mode name, then process id, then its parameters.
    #[serde(default = "default_modes")]
    pub modes: BTreeMap<String, BTreeMap<ProcessId, ProcessProfile>>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            fleet: default_fleet(),
            run: RunConfig::default(),
            barrier: BarrierConfig::default(),
            transport: TransportConfig::default(),
            modes: default_modes(),
        }
    }
}

impl SimulationConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Resolve the identity and run parameters for one process in one mode.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the process or mode is unknown, the mode
    /// lacks a profile for the process, or any value is out of range.
    pub fn resolve(
        &self,
        id: &ProcessId,
        mode: &str,
    ) -> Result<(ProcessIdentity, RunParameters), ConfigError> {
        let identity = ProcessIdentity::from_fleet(id, &self.fleet).ok_or_else(|| {
            ConfigError::UnknownProcess {
                id: id.clone(),
                known: join_keys(self.fleet.keys()),
            }
        })?;

        let profiles = self.modes.get(mode).ok_or_else(|| ConfigError::UnknownMode {
            mode: mode.to_owned(),
            known: join_keys(self.modes.keys()),
        })?;

        let profile = profiles.get(id).ok_or_else(|| ConfigError::MissingProfile {
            mode: mode.to_owned(),
            id: id.clone(),
        })?;

        let params = RunParameters::new(
            TickRate::new(profile.tick_rate)?,
            profile.action_space_size,
            self.run.run_duration(),
        )?
        .with_max_ticks(self.run.max_ticks)
        .with_seed(self.run.seed)
        .with_barrier(self.barrier.settings()?);

        Ok((identity, params))
    }
}

fn join_keys<K: std::fmt::Display>(keys: impl Iterator<Item = K>) -> String {
    keys.map(|k| k.to_string()).collect::<Vec<_>>().join(", ")
}

/// Per-process parameters within a mode.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ProcessProfile {
    /// Ticks per second.
    pub tick_rate: f64,

    /// Upper bound (inclusive) of the action die roll.
    #[serde(default = "default_action_space_size")]
    pub action_space_size: u32,
}

/// Run bounds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RunConfig {
    /// Wall-clock length of the main loop in seconds.
    #[serde(default = "default_run_duration_secs")]
    pub run_duration_secs: u64,

    /// Optional cap on main-loop iterations.
    #[serde(default)]
    pub max_ticks: Option<u64>,

    /// Optional RNG seed for reproducible action sequences.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl RunConfig {
    /// The main-loop duration.
    pub const fn run_duration(&self) -> Duration {
        Duration::from_secs(self.run_duration_secs)
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            run_duration_secs: default_run_duration_secs(),
            max_ticks: None,
            seed: None,
        }
    }
}

/// Barrier cadence.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BarrierConfig {
    /// Delay before each poll round in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Give up after this many unsatisfied rounds. `None` waits forever.
    #[serde(default)]
    pub max_rounds: Option<u32>,
}

impl BarrierConfig {
    /// Convert into validated [`BarrierSettings`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the poll interval is zero or
    /// `max_rounds` is zero.
    pub fn settings(&self) -> Result<BarrierSettings, ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                reason: "barrier.poll_interval_ms must be at least 1".to_owned(),
            });
        }
        if self.max_rounds == Some(0) {
            return Err(ConfigError::Invalid {
                reason: "barrier.max_rounds must be at least 1 when set".to_owned(),
            });
        }
        Ok(BarrierSettings {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            max_rounds: self.max_rounds,
        })
    }
}

impl Default for BarrierConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_rounds: None,
        }
    }
}

/// RPC client and server limits.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TransportConfig {
    /// Per-request timeout for outbound RPCs in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Maximum number of RPCs the server handles concurrently.
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
}

impl TransportConfig {
    /// The outbound request timeout.
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
            max_concurrent_requests: default_max_concurrent_requests(),
        }
    }
}

/// A validated tick rate in ticks per second.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct TickRate(f64);

impl TickRate {
    /// Validate a raw rate.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] unless the rate is finite and
    /// positive and its interval is representable as a [`Duration`].
    pub fn new(rate: f64) -> Result<Self, ConfigError> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(ConfigError::Invalid {
                reason: format!("tick_rate must be a positive number, got {rate}"),
            });
        }
        Duration::try_from_secs_f64(rate.recip()).map_err(|e| ConfigError::Invalid {
            reason: format!("tick_rate {rate} has no representable interval: {e}"),
        })?;
        Ok(Self(rate))
    }

    /// Ticks per second.
    pub const fn per_second(self) -> f64 {
        self.0
    }

    /// Time between ticks, `1 / rate`.
    pub fn interval(self) -> Duration {
        // Validated in `new`.
        Duration::try_from_secs_f64(self.0.recip()).unwrap_or(Duration::MAX)
    }
}

impl std::fmt::Display for TickRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // `f64` prints integral values without a fractional part.
        write!(f, "{}", self.0)
    }
}

/// Immutable parameters of one process's run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunParameters {
    /// Ticks per second.
    pub tick_rate: TickRate,
    /// Upper bound (inclusive) of the action die roll. Always at least 1.
    pub action_space_size: u32,
    /// Wall-clock length of the main loop.
    pub run_duration: Duration,
    /// Optional cap on main-loop iterations.
    pub max_ticks: Option<u64>,
    /// Optional RNG seed.
    pub seed: Option<u64>,
    /// Barrier cadence.
    pub barrier: BarrierSettings,
}

impl RunParameters {
    /// Create run parameters with default barrier settings and no tick cap.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `action_space_size` is zero.
    pub fn new(
        tick_rate: TickRate,
        action_space_size: u32,
        run_duration: Duration,
    ) -> Result<Self, ConfigError> {
        if action_space_size == 0 {
            return Err(ConfigError::Invalid {
                reason: "action_space_size must be at least 1".to_owned(),
            });
        }
        Ok(Self {
            tick_rate,
            action_space_size,
            run_duration,
            max_ticks: None,
            seed: None,
            barrier: BarrierSettings::default(),
        })
    }

    /// Cap the main loop at `max_ticks` iterations.
    pub const fn with_max_ticks(mut self, max_ticks: Option<u64>) -> Self {
        self.max_ticks = max_ticks;
        self
    }

    /// Seed the action RNG.
    pub const fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Replace the barrier settings.
    pub const fn with_barrier(mut self, barrier: BarrierSettings) -> Self {
        self.barrier = barrier;
        self
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn default_fleet() -> BTreeMap<ProcessId, SocketAddr> {
    [("A", 50051_u16), ("B", 50052), ("C", 50053)]
        .into_iter()
        .filter_map(|(name, port)| {
            let id = ProcessId::new(name).ok()?;
            Some((id, SocketAddr::from(([127, 0, 0, 1], port))))
        })
        .collect()
}

fn default_modes() -> BTreeMap<String, BTreeMap<ProcessId, ProcessProfile>> {
    let table: [(&str, [f64; 3], u32); 3] = [
        ("default", [1.0, 3.0, 6.0], 10),
        ("small_variation", [2.0, 3.0, 4.0], 10),
        ("low_internal", [1.0, 3.0, 6.0], 5),
    ];

    table
        .into_iter()
        .map(|(mode, rates, action_space_size)| {
            let profiles = ["A", "B", "C"]
                .into_iter()
                .zip(rates)
                .filter_map(|(name, tick_rate)| {
                    let id = ProcessId::new(name).ok()?;
                    Some((
                        id,
                        ProcessProfile {
                            tick_rate,
                            action_space_size,
                        },
                    ))
                })
                .collect();
            (mode.to_owned(), profiles)
        })
        .collect()
}

const fn default_action_space_size() -> u32 {
    10
}

const fn default_run_duration_secs() -> u64 {
    60
}

const fn default_poll_interval_ms() -> u64 {
    1000
}

const fn default_request_timeout_ms() -> u64 {
    2000
}

const fn default_max_concurrent_requests() -> usize {
    3
}
