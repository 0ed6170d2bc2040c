//! Per-tick action selection.
//!
//! When its mailbox is empty, a process picks one of three kinds of work:
//!
//! | Roll | Action |
//! |------|--------|
//! | `1..=P` | send to the `k`-th peer (peers ordered by id) |
//! | `P + 1` | send to every peer |
//! | anything else | internal event |
//!
//! where `P` is the number of peers. In the usual three-process fleet that
//! is rolls 1 and 2 for single sends, 3 for a broadcast, and the rest of
//! `[1, action_space_size]` for internal steps.
//!
//! [`select_action`] is the pure mapping. [`ActionSource`] is the seam the
//! event loop draws from: [`RandomActionSource`] rolls a die,
//! [`ScriptedActionSource`] replays a fixed cycle.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::identity::{Peer, ProcessId};

/// The work a process performs on a tick with an empty mailbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Send the current clock to one peer.
    SendOne(ProcessId),
    /// Send the current clock to every peer.
    SendAll,
    /// Advance the clock without sending.
    Internal,
}

/// Map a die roll to an action.
///
/// `roll` is expected in `[1, action_space_size]`; a roll of 0 or anything
/// past `peers.len() + 1` is internal.
pub fn select_action(roll: u32, peers: &[Peer]) -> Action {
    let Some(index) = roll.checked_sub(1) else {
        return Action::Internal;
    };
    let Ok(index) = usize::try_from(index) else {
        return Action::Internal;
    };
    match peers.get(index) {
        Some(peer) => Action::SendOne(peer.id.clone()),
        None if index == peers.len() && !peers.is_empty() => Action::SendAll,
        None => Action::Internal,
    }
}

/// A source of per-tick actions.
pub trait ActionSource: Send {
    /// Choose the action for the current tick.
    fn next_action(&mut self, peers: &[Peer]) -> Action;
}

/// Uniform die roll over `[1, action_space_size]`.
#[derive(Debug, Clone)]
pub struct RandomActionSource {
    rng: StdRng,
    action_space_size: u32,
}

impl RandomActionSource {
    /// Create a source seeded from the OS, or from `seed` when given.
    ///
    /// An `action_space_size` of zero is treated as one.
    pub fn new(action_space_size: u32, seed: Option<u64>) -> Self {
        let rng = seed.map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);
        Self {
            rng,
            action_space_size: action_space_size.max(1),
        }
    }

    /// Draw one roll.
    pub fn roll(&mut self) -> u32 {
        self.rng.random_range(1..=self.action_space_size)
    }
}

impl ActionSource for RandomActionSource {
    fn next_action(&mut self, peers: &[Peer]) -> Action {
        let roll = self.roll();
        select_action(roll, peers)
    }
}

/// Replays a fixed list of actions, cycling when it runs out.
///
/// An empty script always yields [`Action::Internal`].
#[derive(Debug, Clone, Default)]
pub struct ScriptedActionSource {
    script: Vec<Action>,
    position: usize,
}

impl ScriptedActionSource {
    /// Create a source that replays `script`.
    pub const fn new(script: Vec<Action>) -> Self {
        Self {
            script,
            position: 0,
        }
    }

    /// A source that only ever performs internal events.
    pub const fn internal_only() -> Self {
        Self::new(Vec::new())
    }
}

impl ActionSource for ScriptedActionSource {
    fn next_action(&mut self, _peers: &[Peer]) -> Action {
        let Some(action) = self.script.get(self.position).cloned() else {
            return Action::Internal;
        };
        self.position = self
            .position
            .saturating_add(1)
            .checked_rem(self.script.len())
            .unwrap_or(0);
        action
    }
}
