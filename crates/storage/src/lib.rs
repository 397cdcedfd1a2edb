//! Durable state of a zsync node.
//!
//! Two independent files live in the node's data directory:
//!
//! - [`IdentityStore`]: the node's 16-byte identity, written once on first
//!   startup and read back unchanged on every later startup.
//! - [`FilePeerStateStore`]: the last state recorded for every known peer, as
//!   `ID=STATE` lines, rewritten wholesale after every state change.

mod error;
mod identity;
mod snapshot;

pub use error::StorageError;
pub use identity::{IdentityStore, IDENTITY_FILENAME};
pub use snapshot::{
    FilePeerStateStore, MemoryPeerStateStore, PeerStateStore, PeerStates, PEER_STATES_FILENAME,
};
