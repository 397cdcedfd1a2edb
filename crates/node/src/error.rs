//! Node error types.

use std::path::PathBuf;
use std::time::Duration;

use zsync_net_proto::{Command, ProtoError};
use zsync_primitives::{NodeId, SessionId, State};
use zsync_storage::StorageError;

/// Errors that stop a node from starting.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("failed to read config {path:?}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Config(#[from] toml::de::Error),

    /// The fabric endpoint no longer accepts commands.
    #[error("group transport closed")]
    TransportClosed,
}

/// Errors raised while handling a single event. The loop logs them and moves
/// on to the next event.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("malformed message: {0}")]
    Decode(#[source] ProtoError),

    #[error("failed to encode {command}: {source}")]
    Encode {
        command: Command,
        #[source]
        source: ProtoError,
    },

    /// A command other than GREET arrived on a session with no durable link.
    #[error("{command} from unlinked session {session}")]
    UnknownSender { session: SessionId, command: Command },

    #[error("{request} reply timed out after {after:?}")]
    Timeout {
        request: &'static str,
        after: Duration,
    },

    /// The reply channel was dropped without an answer.
    #[error("{0} request dropped without reply")]
    NoReply(&'static str),

    #[error("sync agent pipe closed")]
    AgentClosed,

    #[error("{0} pipe closed")]
    WorkerClosed(&'static str),

    #[error("group transport closed")]
    TransportClosed,

    #[error("state regression for {peer}: known {known}, received {received}")]
    StateRegression {
        peer: NodeId,
        known: State,
        received: State,
    },
}
