//! Peers the relay has announced.

use std::collections::BTreeSet;

use parking_lot::Mutex;
use parley_core::ConnectionId;

/// Set of peer identifiers learned from join, roster, and leave notices.
#[derive(Debug, Default)]
pub struct Roster {
    peers: Mutex<BTreeSet<ConnectionId>>,
}

impl Roster {
    /// Create an empty roster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a peer. Returns `false` if it was already known.
    pub fn insert(&self, id: ConnectionId) -> bool {
        self.peers.lock().insert(id)
    }

    /// Forget a peer. Returns `false` if it was not known.
    pub fn remove(&self, id: &ConnectionId) -> bool {
        self.peers.lock().remove(id)
    }

    /// Whether `id` is known.
    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.peers.lock().contains(id)
    }

    /// Known peers, sorted.
    pub fn peers(&self) -> Vec<ConnectionId> {
        self.peers.lock().iter().copied().collect()
    }

    /// Number of known peers.
    pub fn len(&self) -> usize {
        self.peers.lock().len()
    }

    /// Whether no peers are known.
    pub fn is_empty(&self) -> bool {
        self.peers.lock().is_empty()
    }
}
