//! Messages exchanged with the file transfer and credit workers.

use tokio::sync::oneshot;
use zsync_net_proto::Message;
use zsync_primitives::NodeId;

/// Engine to file transfer manager.
#[derive(Debug)]
pub enum FileTransferCommand {
    /// `peer` asked us to send these files.
    Request { peer: NodeId, paths: Vec<String> },
    /// `peer` allows us to send `amount` more bytes.
    Credit { peer: NodeId, amount: u64 },
    Terminate { ack_tx: oneshot::Sender<()> },
}

/// File transfer manager to engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileTransferEvent {
    /// A chunk may be sent to `peer`.
    ChunkReady {
        peer: NodeId,
        path: String,
        sequence: u64,
        chunk_size: u64,
        offset: u64,
    },
}

/// Engine to credit manager.
#[derive(Debug)]
pub enum CreditCommand {
    /// `bytes` arrived from `peer`.
    Consume { peer: NodeId, bytes: u64 },
    /// We are about to download `size` bytes from `peer`.
    Request { peer: NodeId, size: u64 },
    Terminate { ack_tx: oneshot::Sender<()> },
}

/// Credit manager to engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreditEvent {
    /// Send this pre-built credit message to `peer`.
    Grant { peer: NodeId, message: Message },
}
