//! Durable peer records plus a bidirectional session ↔ node id index.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, trace};
use zsync_primitives::{NodeId, SessionId, State};

use crate::state::{ConnectionStatus, Peer};

/// Result of linking a session to a durable id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkResult {
    New,
    /// The node was linked to an older session, which lost its link.
    Replaced { old_session: SessionId },
    /// Duplicate greeting on the same session.
    SamePeer,
}

/// Known peers keyed by durable id, and the live sessions that map onto them.
///
/// Sessions are registered unlinked when they appear on the fabric and get
/// linked to a durable id when the remote greets us. A durable id is linked to
/// at most one session at a time. Peer records outlive their sessions.
#[derive(Debug, Default)]
pub struct PeerRegistry {
    peers: HashMap<NodeId, Peer>,
    sessions: HashMap<SessionId, Option<NodeId>>,
    links: HashMap<NodeId, SessionId>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the registry from persisted `(id, state)` pairs. Every peer starts
    /// out [`ConnectionStatus::Unseen`] with no session.
    pub fn from_states(states: impl IntoIterator<Item = (NodeId, State)>) -> Self {
        let peers = states
            .into_iter()
            .map(|(id, state)| (id, Peer::new(id, state)))
            .collect();
        Self {
            peers,
            ..Self::default()
        }
    }

    /// Get the peer for `id`, creating it with `known_state = 0` if unknown.
    pub fn insert_or_get(&mut self, id: NodeId) -> &mut Peer {
        self.peers.entry(id).or_insert_with(|| {
            debug!(peer = %id, "new peer");
            Peer::new(id, 0)
        })
    }

    pub fn get(&self, id: &NodeId) -> Option<&Peer> {
        self.peers.get(id)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.peers.contains_key(id)
    }

    /// Record a new state for `id`. Returns the previous state, or `None` if
    /// the peer is unknown.
    pub fn set_state(&mut self, id: &NodeId, state: State) -> Option<State> {
        let peer = self.peers.get_mut(id)?;
        let previous = peer.known_state();
        peer.set_known_state(state);
        Some(previous)
    }

    /// Register a session that just appeared, without a durable link.
    /// Returns false if the session was already registered.
    pub fn register_session(&mut self, session: SessionId) -> bool {
        if self.sessions.contains_key(&session) {
            return false;
        }
        trace!(%session, "session registered");
        self.sessions.insert(session, None);
        true
    }

    /// Link `session` to the durable `id` and mark the peer joined.
    ///
    /// The session is registered and the peer created if either is unknown.
    pub fn link(&mut self, session: SessionId, id: NodeId) -> LinkResult {
        let result = match self.links.remove(&id) {
            Some(old) if old == session => LinkResult::SamePeer,
            Some(old) => {
                if let Some(entry) = self.sessions.get_mut(&old) {
                    *entry = None;
                }
                LinkResult::Replaced { old_session: old }
            }
            None => LinkResult::New,
        };

        // Session previously greeted as a different node.
        if let Some(Some(previous)) = self.sessions.get(&session) {
            if *previous != id {
                let previous = *previous;
                self.links.remove(&previous);
                if let Some(peer) = self.peers.get_mut(&previous) {
                    peer.set_status(ConnectionStatus::Left);
                }
            }
        }

        self.sessions.insert(session.clone(), Some(id));
        self.links.insert(id, session);
        self.insert_or_get(id).set_status(ConnectionStatus::Joined);

        result
    }

    /// Drop a session. Returns the durable id it was linked to, if any; that
    /// peer is marked [`ConnectionStatus::Left`].
    pub fn remove_session(&mut self, session: &SessionId) -> Option<NodeId> {
        let id = self.sessions.remove(session)??;
        if self.links.get(&id) == Some(session) {
            self.links.remove(&id);
        }
        if let Some(peer) = self.peers.get_mut(&id) {
            peer.set_status(ConnectionStatus::Left);
        }
        Some(id)
    }

    /// Mark the peer linked to `session` as left without dropping the link.
    pub fn mark_left(&mut self, session: &SessionId) -> Option<NodeId> {
        let id = self.resolve_peer(session)?;
        if let Some(peer) = self.peers.get_mut(&id) {
            peer.set_status(ConnectionStatus::Left);
        }
        Some(id)
    }

    /// Live session currently linked to `id`.
    pub fn resolve_session(&self, id: &NodeId) -> Option<&SessionId> {
        self.links.get(id)
    }

    /// Durable id linked to `session`.
    pub fn resolve_peer(&self, session: &SessionId) -> Option<NodeId> {
        self.sessions.get(session).copied().flatten()
    }

    pub fn contains_session(&self, session: &SessionId) -> bool {
        self.sessions.contains_key(session)
    }

    /// Number of known peers.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Number of live sessions, linked or not.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn peers(&self) -> impl Iterator<Item = &Peer> {
        self.peers.values()
    }

    /// Known state of every peer, ordered by id.
    pub fn states(&self) -> BTreeMap<NodeId, State> {
        self.peers
            .values()
            .map(|peer| (peer.id(), peer.known_state()))
            .collect()
    }
}
