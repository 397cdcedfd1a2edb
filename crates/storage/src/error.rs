//! Storage error types.

use std::path::PathBuf;

/// Errors reading or writing the node's durable state.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Identity file exists but does not hold exactly 16 bytes.
    #[error("invalid identity file {path:?}: expected 16 bytes, got {len}")]
    InvalidIdentity { path: PathBuf, len: usize },

    #[error("Storage error: {0}")]
    Other(String),
}
