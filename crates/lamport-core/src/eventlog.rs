//! Append-only event log, one file per process per run.
//!
//! The log is the artifact the analysis tooling reads, so its format is
//! fixed:
//!
//! ```text
//! Clock Rate: 3 ticks per second
//! ----------------------------------------
//! INTERNAL | 1718035200.123456 | 0 | 1
//! SEND to B | 1718035200.456789 | 0 | 2
//! RECEIVE from C | 1718035200.790123 | 1 | 7
//! ```
//!
//! Columns are `EVENT_KIND | WALL_CLOCK_TIME | MAILBOX_DEPTH | LOGICAL_CLOCK`,
//! wall-clock time in seconds since the Unix epoch. Every entry is flushed
//! as soon as it is written.

use std::fs::{File, OpenOptions};
use std::io::{LineWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::config::{DEFAULT_MODE, TickRate};
use crate::identity::ProcessId;

/// Separator line written after the header.
const SEPARATOR: &str = "----------------------------------------";

/// Errors writing the event log.
#[derive(Debug, thiserror::Error)]
pub enum EventLogError {
    /// The log file could not be created.
    #[error("failed to create event log {path}: {source}")]
    Create {
        /// Path that was being created.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Writing or flushing an entry failed.
    #[error("failed to write event log: {source}")]
    Write {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },
}

/// What happened on a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// A message from `from` was consumed from the mailbox.
    Receive {
        /// The message's sender.
        from: ProcessId,
    },
    /// The clock was sent to a single peer.
    Send {
        /// The destination peer.
        to: ProcessId,
    },
    /// The clock was sent to every peer.
    SendAll,
    /// An internal event.
    Internal,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Receive { from } => write!(f, "RECEIVE from {from}"),
            Self::Send { to } => write!(f, "SEND to {to}"),
            Self::SendAll => f.write_str("SEND_ALL"),
            Self::Internal => f.write_str("INTERNAL"),
        }
    }
}

/// One line of the event log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventLogEntry {
    /// Event kind.
    pub kind: EventKind,
    /// Wall-clock time the event was recorded.
    pub wall_clock_time: DateTime<Utc>,
    /// Mailbox depth when the event was recorded.
    pub mailbox_depth: usize,
    /// Logical clock after the event.
    pub logical_clock: u64,
}

impl std::fmt::Display for EventLogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} | {}.{:06} | {} | {}",
            self.kind,
            self.wall_clock_time.timestamp(),
            self.wall_clock_time.timestamp_subsec_micros(),
            self.mailbox_depth,
            self.logical_clock
        )
    }
}

/// File name of a run's log: `A1.log`, or `A1_<mode>.log` for non-default modes.
pub fn log_file_name(id: &ProcessId, run_id: u32, mode: &str) -> String {
    if mode == DEFAULT_MODE {
        format!("{id}{run_id}.log")
    } else {
        format!("{id}{run_id}_{mode}.log")
    }
}

/// Append-only writer for [`EventLogEntry`] lines.
#[derive(Debug)]
pub struct EventLog<W: Write> {
    sink: W,
    entries: u64,
}

impl EventLog<LineWriter<File>> {
    /// Create (or truncate) the log file at `path`, creating parent
    /// directories as needed.
    ///
    /// # Errors
    ///
    /// Returns [`EventLogError::Create`] if the directory or file cannot be
    /// created.
    pub fn create(path: &Path) -> Result<Self, EventLogError> {
        let create_err = |source| EventLogError::Create {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(create_err)?;
        }
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(create_err)?;
        Ok(Self::new(LineWriter::new(file)))
    }
}

impl<W: Write> EventLog<W> {
    /// Wrap an arbitrary sink.
    pub const fn new(sink: W) -> Self {
        Self { sink, entries: 0 }
    }

    /// Write the header block. Must precede every entry.
    ///
    /// # Errors
    ///
    /// Returns [`EventLogError::Write`] if the sink fails.
    pub fn write_header(&mut self, tick_rate: TickRate) -> Result<(), EventLogError> {
        writeln!(self.sink, "Clock Rate: {tick_rate} ticks per second")?;
        writeln!(self.sink, "{SEPARATOR}")?;
        self.sink.flush()?;
        Ok(())
    }

    /// Append one entry and flush it.
    ///
    /// # Errors
    ///
    /// Returns [`EventLogError::Write`] if the sink fails.
    pub fn append(&mut self, entry: &EventLogEntry) -> Result<(), EventLogError> {
        writeln!(self.sink, "{entry}")?;
        self.sink.flush()?;
        self.entries = self.entries.saturating_add(1);
        Ok(())
    }

    /// Number of entries appended so far.
    pub const fn entries_written(&self) -> u64 {
        self.entries
    }

    /// Consume the log and return its sink.
    pub fn into_inner(self) -> W {
        self.sink
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn pid(name: &str) -> ProcessId {
        ProcessId::new(name).unwrap()
    }

    fn at(secs: i64, micros: u32) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, micros * 1000).unwrap()
    }

    #[test]
    fn kinds_render_as_log_tokens() {
        assert_eq!(EventKind::Receive { from: pid("B") }.to_string(), "RECEIVE from B");
        assert_eq!(EventKind::Send { to: pid("C") }.to_string(), "SEND to C");
        assert_eq!(EventKind::SendAll.to_string(), "SEND_ALL");
        assert_eq!(EventKind::Internal.to_string(), "INTERNAL");
    }

    #[test]
    fn entry_line_format() {
        let entry = EventLogEntry {
            kind: EventKind::Send { to: pid("B") },
            wall_clock_time: at(1_700_000_000, 42),
            mailbox_depth: 3,
            logical_clock: 17,
        };
        assert_eq!(entry.to_string(), "SEND to B | 1700000000.000042 | 3 | 17");
    }

    #[test]
    fn header_precedes_entries() {
        let mut log = EventLog::new(Vec::new());
        log.write_header(TickRate::new(3.0).unwrap()).unwrap();
        log.append(&EventLogEntry {
            kind: EventKind::Internal,
            wall_clock_time: at(10, 500_000),
            mailbox_depth: 0,
            logical_clock: 1,
        })
        .unwrap();
        assert_eq!(log.entries_written(), 1);

        let text = String::from_utf8(log.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "Clock Rate: 3 ticks per second");
        assert!(lines[1].chars().all(|c| c == '-'));
        assert_eq!(lines[2], "INTERNAL | 10.500000 | 0 | 1");
    }

    #[test]
    fn file_names_follow_run_and_mode() {
        assert_eq!(log_file_name(&pid("A"), 1, DEFAULT_MODE), "A1.log");
        assert_eq!(log_file_name(&pid("C"), 12, "low_internal"), "C12_low_internal.log");
    }

    #[test]
    fn create_makes_parent_dirs_and_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("B2.log");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "stale contents\n").unwrap();

        let mut log = EventLog::create(&path).unwrap();
        log.write_header(TickRate::new(1.0).unwrap()).unwrap();
        drop(log);

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("Clock Rate: 1 ticks per second\n"));
        assert!(!text.contains("stale"));

        let fresh = dir.path().join("new").join("dir").join("C3.log");
        assert!(EventLog::create(&fresh).is_ok());
        assert!(fresh.exists());
    }
}
