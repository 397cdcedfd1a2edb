//! Bidirectional control pipes between the engine and its collaborators.

use tokio::sync::mpsc;

use crate::agent::{AgentCommand, AgentHandle, AgentRequest};
use crate::workers::{CreditCommand, CreditEvent, FileTransferCommand, FileTransferEvent};

/// One end of a duplex channel: sends `Tx`, receives `Rx`.
#[derive(Debug)]
pub struct Pipe<Tx, Rx> {
    tx: mpsc::UnboundedSender<Tx>,
    rx: mpsc::UnboundedReceiver<Rx>,
}

/// Create a connected pair of pipe ends.
pub fn pipe<A, B>() -> (Pipe<A, B>, Pipe<B, A>) {
    let (a_tx, a_rx) = mpsc::unbounded_channel();
    let (b_tx, b_rx) = mpsc::unbounded_channel();
    (Pipe { tx: a_tx, rx: b_rx }, Pipe { tx: b_tx, rx: a_rx })
}

impl<Tx, Rx> Pipe<Tx, Rx> {
    /// Send to the other end. Gives the value back if that end is gone.
    pub fn send(&self, value: Tx) -> Result<(), Tx> {
        self.tx.send(value).map_err(|e| e.0)
    }

    /// Receive the next value; `None` once the other end is dropped.
    pub async fn recv(&mut self) -> Option<Rx> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Rx> {
        self.rx.try_recv().ok()
    }

    /// Clone of the sending half.
    pub fn sender(&self) -> mpsc::UnboundedSender<Tx> {
        self.tx.clone()
    }

    pub fn split(self) -> (mpsc::UnboundedSender<Tx>, mpsc::UnboundedReceiver<Rx>) {
        (self.tx, self.rx)
    }
}

/// Engine ends of the three control pipes.
#[derive(Debug)]
pub struct NodeChannels {
    pub agent: Pipe<AgentRequest, AgentCommand>,
    pub transfer: Pipe<FileTransferCommand, FileTransferEvent>,
    pub credit: Pipe<CreditCommand, CreditEvent>,
}

/// Collaborator ends of the three control pipes.
#[derive(Debug)]
pub struct CollaboratorChannels {
    pub agent: Pipe<AgentCommand, AgentRequest>,
    pub transfer: Pipe<FileTransferEvent, FileTransferCommand>,
    pub credit: Pipe<CreditEvent, CreditCommand>,
}

impl NodeChannels {
    /// Create all control pipes, returning the engine and collaborator ends.
    pub fn new() -> (Self, CollaboratorChannels) {
        let (agent, agent_peer) = pipe();
        let (transfer, transfer_peer) = pipe();
        let (credit, credit_peer) = pipe();
        (
            Self {
                agent,
                transfer,
                credit,
            },
            CollaboratorChannels {
                agent: agent_peer,
                transfer: transfer_peer,
                credit: credit_peer,
            },
        )
    }
}

impl CollaboratorChannels {
    /// Handle for driving the engine from the agent side.
    pub fn agent_handle(&self) -> AgentHandle {
        AgentHandle::new(self.agent.sender())
    }
}
