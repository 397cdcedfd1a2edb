//! Messages exchanged with the sync agent, and the agent's handle.

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use zsync_primitives::{FileMeta, NodeId, State};

/// Engine to agent: queries carry a reply channel, notifications don't.
#[derive(Debug)]
pub enum AgentRequest {
    /// Current local state.
    State { response_tx: oneshot::Sender<State> },

    /// Everything that changed since `since`.
    Update {
        since: State,
        response_tx: oneshot::Sender<AgentUpdate>,
    },

    /// Bytes of one file chunk.
    Chunk {
        path: String,
        size: u64,
        offset: u64,
        response_tx: oneshot::Sender<Bytes>,
    },

    /// A peer announced an update.
    PeerUpdate {
        sender: NodeId,
        state: State,
        files: Vec<FileMeta>,
    },

    /// A peer sent us a file chunk.
    ChunkReceived {
        sender: NodeId,
        data: Bytes,
        path: String,
        sequence: u64,
        offset: u64,
    },
}

/// Payload returned for [`AgentRequest::Update`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentUpdate {
    pub state: State,
    pub files: Vec<FileMeta>,
}

/// Agent to engine.
#[derive(Debug)]
pub enum AgentCommand {
    /// Ask `peer` for files; `size` is the total credit to request.
    RequestFiles {
        peer: NodeId,
        paths: Vec<String>,
        size: u64,
    },

    /// Announce a local update to the whole group.
    Update { state: State, files: Vec<FileMeta> },

    /// Shut the node down. Acked once the workers have stopped.
    Terminate { ack_tx: oneshot::Sender<()> },
}

/// Cloneable handle the agent uses to drive the engine.
#[derive(Debug, Clone)]
pub struct AgentHandle {
    command_tx: mpsc::UnboundedSender<AgentCommand>,
}

/// The engine loop is no longer running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("node engine stopped")]
pub struct EngineStopped;

impl AgentHandle {
    pub fn new(command_tx: mpsc::UnboundedSender<AgentCommand>) -> Self {
        Self { command_tx }
    }

    pub fn request_files(
        &self,
        peer: NodeId,
        paths: Vec<String>,
        size: u64,
    ) -> Result<(), EngineStopped> {
        self.command_tx
            .send(AgentCommand::RequestFiles { peer, paths, size })
            .map_err(|_| EngineStopped)
    }

    pub fn announce_update(&self, state: State, files: Vec<FileMeta>) -> Result<(), EngineStopped> {
        self.command_tx
            .send(AgentCommand::Update { state, files })
            .map_err(|_| EngineStopped)
    }

    /// Stop the node and wait until it has shut its workers down.
    pub async fn terminate(&self) -> Result<(), EngineStopped> {
        let (tx, rx) = oneshot::channel();
        self.command_tx
            .send(AgentCommand::Terminate { ack_tx: tx })
            .map_err(|_| EngineStopped)?;
        rx.await.map_err(|_| EngineStopped)
    }
}
