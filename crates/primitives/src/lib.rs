//! Core primitive types for zsync nodes.
//!
//! This crate provides the identifiers and records shared by the wire
//! protocol, the peer registry, storage and the node engine, kept separate to
//! avoid circular dependencies.

mod id;

pub use id::{NODE_ID_LEN, NodeId, ParseNodeIdError, SessionId};

/// State counter summarising every file update known as of some point.
///
/// Counters are compared numerically; a higher value means "more recent".
pub type State = u64;

/// Name of the group every zsync node joins on the messaging fabric.
pub const ZSYNC_GROUP: &str = "ZSYNC";

/// Metadata describing one file in an update.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FileMeta {
    /// Path relative to the synchronised root.
    pub path: String,
    /// File size in bytes.
    pub size: u64,
    /// Opaque modification marker.
    pub timestamp: u64,
}

impl FileMeta {
    pub fn new(path: impl Into<String>, size: u64, timestamp: u64) -> Self {
        Self {
            path: path.into(),
            size,
            timestamp,
        }
    }
}
