//! ZeroSync node engine.
//!
//! A [`ZsyncNode`] joins the `ZSYNC` group on a messaging fabric, greets every
//! peer that joins with its durable id and state, exchanges updates, and
//! relays file transfer traffic between the network and three local
//! collaborators:
//!
//! - the sync agent, which owns the local file index and file contents,
//! - the file transfer manager, which schedules outgoing chunks,
//! - the credit manager, which throttles incoming transfers.
//!
//! The collaborators run as their own tasks and talk to the engine only over
//! the [`Pipe`]s in [`NodeChannels`]:
//!
//! ```ignore
//! let fabric = LocalFabric::new();
//! let (channels, collaborators) = NodeChannels::new();
//! let node = ZsyncNode::new(NodeConfig::with_data_dir(dir), fabric.connect(), channels)?;
//! tokio::spawn(node.run());
//! // hand collaborators.agent / .transfer / .credit to the workers
//! ```

mod agent;
mod config;
mod engine;
mod error;
mod metrics;
mod pipe;
mod workers;

pub use agent::{AgentCommand, AgentHandle, AgentRequest, AgentUpdate, EngineStopped};
pub use config::{
    DEFAULT_INTERCONNECT_DELAY_MS, DEFAULT_REPLY_TIMEOUT_MS, NodeConfig, StatePolicy,
};
pub use engine::ZsyncNode;
pub use error::{EngineError, NodeError};
pub use pipe::{CollaboratorChannels, NodeChannels, Pipe, pipe};
pub use workers::{CreditCommand, CreditEvent, FileTransferCommand, FileTransferEvent};
