//! Commands and events exchanged with the messaging fabric.

use bytes::Bytes;
use tokio::sync::mpsc;
use zsync_primitives::SessionId;

/// Instructions from a node to the fabric.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupCommand {
    /// Join a named group; other members see a [`GroupEvent::Join`].
    Join { group: String },

    /// Leave a named group.
    Leave { group: String },

    /// Send a payload to a single member.
    Whisper { session: SessionId, payload: Bytes },

    /// Send a payload to every other member of a group.
    Shout { group: String, payload: Bytes },

    /// Disconnect from the fabric; other members see a [`GroupEvent::Exit`].
    Stop,
}

/// Notifications from the fabric to a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupEvent {
    /// A member became visible.
    Enter { session: SessionId },

    /// A member joined a group.
    Join { session: SessionId, group: String },

    /// A member left a group.
    Leave { session: SessionId, group: String },

    /// A member disconnected.
    Exit { session: SessionId },

    /// A member sent us a direct payload.
    Whisper { session: SessionId, payload: Bytes },

    /// A member sent a payload to a group we are in.
    Shout {
        session: SessionId,
        group: String,
        payload: Bytes,
    },
}

impl GroupEvent {
    /// Session the event originates from.
    pub fn session(&self) -> &SessionId {
        match self {
            Self::Enter { session }
            | Self::Join { session, .. }
            | Self::Leave { session, .. }
            | Self::Exit { session }
            | Self::Whisper { session, .. }
            | Self::Shout { session, .. } => session,
        }
    }
}

/// A node's connection to the fabric.
#[derive(Debug)]
pub struct GroupEndpoint {
    /// Our own session id on the fabric.
    pub session: SessionId,
    /// Send commands to the fabric.
    pub command_tx: mpsc::UnboundedSender<GroupCommand>,
    /// Receive events from the fabric.
    pub event_rx: mpsc::UnboundedReceiver<GroupEvent>,
}

impl GroupEndpoint {
    pub fn new(
        session: SessionId,
        command_tx: mpsc::UnboundedSender<GroupCommand>,
        event_rx: mpsc::UnboundedReceiver<GroupEvent>,
    ) -> Self {
        Self {
            session,
            command_tx,
            event_rx,
        }
    }
}
