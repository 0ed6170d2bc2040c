//! Lamport logical clock.
//!
//! The clock is owned by the event loop and is the only piece of per-process
//! state that carries causal order. It moves in exactly two ways:
//!
//! - a local event (internal step or send) advances it by one;
//! - a receive sets it to `max(local, remote) + 1`.
//!
//! Both paths use checked arithmetic. A clock at `u64::MAX` stays there
//! instead of wrapping.

use serde::{Deserialize, Serialize};

/// A Lamport logical clock value with its update rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LogicalClock {
    value: u64,
}

impl LogicalClock {
    /// Create a clock starting at zero.
    pub const fn new() -> Self {
        Self { value: 0 }
    }

    /// Create a clock at an explicit value (useful for tests and restores).
    pub const fn from_value(value: u64) -> Self {
        Self { value }
    }

    /// Return the current clock value.
    pub const fn value(&self) -> u64 {
        self.value
    }

    /// Advance the clock for a local event. Returns the new value.
    pub const fn bump_local(&mut self) -> u64 {
        self.value = self.value.saturating_add(1);
        self.value
    }

    /// Apply the Lamport receive rule for a message stamped `remote`.
    ///
    /// The clock becomes `max(local, remote) + 1`. A remote value behind the
    /// local one still advances the clock by one.
    pub fn merge_received(&mut self, remote: u64) -> u64 {
        self.value = self.value.max(remote).saturating_add(1);
        self.value
    }
}

impl std::fmt::Display for LogicalClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}
