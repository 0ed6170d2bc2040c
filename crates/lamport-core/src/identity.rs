//! Process identity within a fixed fleet.
//!
//! Every process in a run is known by a short symbolic name (`A`, `B`, `C`
//! in the default fleet). The identity pairs that name with the address the
//! process listens on and the addresses of every other member. It is built
//! once at startup from configuration and never changes.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Errors produced when parsing a [`ProcessId`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProcessIdError {
    /// The name was empty or contained only whitespace.
    #[error("process id must not be empty")]
    Empty,

    /// The name contained characters outside `[A-Za-z0-9_-]`.
    #[error("invalid process id {0:?}: only letters, digits, '_' and '-' are allowed")]
    InvalidCharacters(String),
}

/// Symbolic name of a fleet member.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProcessId(String);

impl ProcessId {
    /// Create a process id, validating its characters.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessIdError`] if the name is empty or contains
    /// characters that would not survive a log file name.
    pub fn new(name: impl Into<String>) -> Result<Self, ProcessIdError> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(ProcessIdError::Empty);
        }
        if !trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(ProcessIdError::InvalidCharacters(name));
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Return the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProcessId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ProcessId {
    type Err = ProcessIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ProcessId {
    type Error = ProcessIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ProcessId> for String {
    fn from(id: ProcessId) -> Self {
        id.0
    }
}

/// A peer this process talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    /// The peer's symbolic name.
    pub id: ProcessId,
    /// Address of the peer's RPC server.
    pub address: SocketAddr,
}

/// Immutable identity of one process for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessIdentity {
    id: ProcessId,
    listen_address: SocketAddr,
    peers: Vec<Peer>,
}

impl ProcessIdentity {
    /// Build an identity for `id` from the full fleet table.
    ///
    /// The fleet maps every member (including `id`) to its address. Peers
    /// are every other member, ordered by id.
    ///
    /// Returns `None` if `id` is not a member of the fleet.
    pub fn from_fleet(id: &ProcessId, fleet: &BTreeMap<ProcessId, SocketAddr>) -> Option<Self> {
        let listen_address = *fleet.get(id)?;
        let peers = fleet
            .iter()
            .filter(|(peer_id, _)| *peer_id != id)
            .map(|(peer_id, address)| Peer {
                id: peer_id.clone(),
                address: *address,
            })
            .collect();
        Some(Self {
            id: id.clone(),
            listen_address,
            peers,
        })
    }

    /// Build an identity from explicit parts. Any peer sharing `id` is dropped.
    pub fn from_parts(id: ProcessId, listen_address: SocketAddr, mut peers: Vec<Peer>) -> Self {
        peers.retain(|peer| peer.id != id);
        peers.sort_by(|a, b| a.id.cmp(&b.id));
        peers.dedup_by(|a, b| a.id == b.id);
        Self {
            id,
            listen_address,
            peers,
        }
    }

    /// This process's symbolic name.
    pub const fn id(&self) -> &ProcessId {
        &self.id
    }

    /// Address this process's RPC server listens on.
    pub const fn listen_address(&self) -> SocketAddr {
        self.listen_address
    }

    /// Every other fleet member, ordered by id.
    pub fn peers(&self) -> &[Peer] {
        &self.peers
    }

    /// Look up a peer by id.
    pub fn peer(&self, id: &ProcessId) -> Option<&Peer> {
        self.peers.iter().find(|peer| &peer.id == id)
    }
}
