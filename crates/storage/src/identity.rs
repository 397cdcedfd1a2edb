//! Node identity file.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use zsync_primitives::NodeId;

use crate::error::StorageError;

/// File holding the raw identity bytes.
pub const IDENTITY_FILENAME: &str = ".zsync_uuid";

/// Loads or creates the node identity in a data directory.
#[derive(Debug, Clone)]
pub struct IdentityStore {
    path: PathBuf,
}

impl IdentityStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join(IDENTITY_FILENAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the identity, generating and persisting a new one if the file does
    /// not exist yet. An existing file is never rewritten.
    pub fn load_or_create(&self) -> Result<NodeId, StorageError> {
        if self.path.exists() {
            let bytes = fs::read(&self.path)?;
            let id = NodeId::from_slice(&bytes).map_err(|_| StorageError::InvalidIdentity {
                path: self.path.clone(),
                len: bytes.len(),
            })?;
            debug!(node_id = %id, path = ?self.path, "loaded node identity");
            return Ok(id);
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let id = NodeId::random();

        // Write to temp file first, then rename (atomic)
        let tmp_path = self.path.with_extension("tmp");
        // A leftover from an interrupted write would keep its old mode.
        if tmp_path.exists() {
            fs::remove_file(&tmp_path)?;
        }
        {
            let mut file = create_private(&tmp_path)?;
            file.write_all(id.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        info!(node_id = %id, path = ?self.path, "generated node identity");
        Ok(id)
    }
}

/// Create (or truncate) `path`, readable by the owner only on Unix.
fn create_private(path: &Path) -> std::io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}
