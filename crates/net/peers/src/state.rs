//! Per-peer record.

use zsync_primitives::{NodeId, State};

/// Transport-level presence of a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionStatus {
    /// Known from a previous run (or just created) but not greeted yet.
    #[default]
    Unseen,
    /// Greeted on a live session.
    Joined,
    /// Session left the group or disconnected.
    Left,
}

impl ConnectionStatus {
    pub fn is_joined(&self) -> bool {
        matches!(self, ConnectionStatus::Joined)
    }
}

/// A remote node, identified by its durable id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    id: NodeId,
    known_state: State,
    status: ConnectionStatus,
}

impl Peer {
    pub fn new(id: NodeId, known_state: State) -> Self {
        Self {
            id,
            known_state,
            status: ConnectionStatus::Unseen,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Last state this node recorded for the peer.
    pub fn known_state(&self) -> State {
        self.known_state
    }

    pub fn set_known_state(&mut self, state: State) {
        self.known_state = state;
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn set_status(&mut self, status: ConnectionStatus) {
        self.status = status;
    }
}
