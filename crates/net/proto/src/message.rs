//! Protocol messages.

use bytes::Bytes;
use zsync_primitives::{FileMeta, NodeId, State};

/// Command identifier carried in the third byte of every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::FromRepr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum Command {
    Greet = 0x1,
    LastState = 0x2,
    Update = 0x3,
    RequestFiles = 0x4,
    GiveCredit = 0x5,
    SendChunk = 0x6,
    Abort = 0x7,
}

/// A message exchanged between two zsync nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Handshake: the sender's durable identity and its current state.
    Greet { node_id: NodeId, state: State },

    /// Ask the receiver for everything that changed since `state`.
    LastState { state: State },

    /// Files changed up to `state`.
    Update { state: State, files: Vec<FileMeta> },

    /// Ask the receiver to start transferring the given files.
    RequestFiles { paths: Vec<String> },

    /// Allow the receiver to send `amount` more bytes.
    GiveCredit { amount: u64 },

    /// One chunk of a file.
    SendChunk {
        sequence: u64,
        path: String,
        offset: u64,
        data: Bytes,
    },

    /// Cancel the in-flight transfer.
    Abort,
}

impl Message {
    pub fn command(&self) -> Command {
        match self {
            Self::Greet { .. } => Command::Greet,
            Self::LastState { .. } => Command::LastState,
            Self::Update { .. } => Command::Update,
            Self::RequestFiles { .. } => Command::RequestFiles,
            Self::GiveCredit { .. } => Command::GiveCredit,
            Self::SendChunk { .. } => Command::SendChunk,
            Self::Abort => Command::Abort,
        }
    }
}
