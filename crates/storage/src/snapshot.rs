//! Peer state snapshot persistence (file, memory).

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use auto_impl::auto_impl;
use parking_lot::Mutex;
use tracing::{debug, warn};
use zsync_primitives::{NodeId, State};

use crate::error::StorageError;

/// File holding the peer state snapshot.
pub const PEER_STATES_FILENAME: &str = ".zsync_peer_states";

/// Last known state per peer, ordered by id.
pub type PeerStates = BTreeMap<NodeId, State>;

/// Peer state persistence with auto-impl for &, Box, Arc.
#[auto_impl(&, Box, Arc)]
pub trait PeerStateStore: Send + Sync {
    /// Load every persisted peer state. A store that was never written loads
    /// as empty.
    fn load(&self) -> Result<PeerStates, StorageError>;

    /// Replace the persisted snapshot with `states`.
    fn save(&self, states: &PeerStates) -> Result<(), StorageError>;
}

/// Text key/value file store: one `ID=STATE` line per peer, id in upper-case
/// hex and state in decimal.
#[derive(Debug, Clone)]
pub struct FilePeerStateStore {
    path: PathBuf,
}

impl FilePeerStateStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join(PEER_STATES_FILENAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PeerStateStore for FilePeerStateStore {
    fn load(&self) -> Result<PeerStates, StorageError> {
        if !self.path.exists() {
            return Ok(PeerStates::new());
        }
        let content = fs::read_to_string(&self.path)?;
        let states = parse_states(&content);
        debug!(path = ?self.path, peers = states.len(), "loaded peer states");
        Ok(states)
    }

    fn save(&self, states: &PeerStates) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write to temp file first, then rename (atomic)
        let tmp_path = self.path.with_extension("tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp_path)?);
            for (id, state) in states {
                writeln!(writer, "{id}={state}")?;
            }
            writer.flush()?;
        }

        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

fn parse_states(content: &str) -> PeerStates {
    let mut states = PeerStates::new();
    for (n, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            warn!(line = n + 1, "skipping peer state line without '='");
            continue;
        };
        let id = match key.trim().parse::<NodeId>() {
            Ok(id) => id,
            Err(e) => {
                warn!(line = n + 1, error = %e, "skipping peer state with invalid id");
                continue;
            }
        };
        let state = match value.trim().parse::<State>() {
            Ok(state) => state,
            Err(e) => {
                warn!(line = n + 1, error = %e, "skipping peer state with invalid state");
                continue;
            }
        };
        states.insert(id, state);
    }
    states
}

/// In-memory store (does not persist across restarts).
#[derive(Debug, Default)]
pub struct MemoryPeerStateStore {
    states: Mutex<PeerStates>,
    saves: Mutex<usize>,
}

impl MemoryPeerStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_states(states: PeerStates) -> Self {
        Self {
            states: Mutex::new(states),
            saves: Mutex::new(0),
        }
    }

    /// Current contents.
    pub fn states(&self) -> PeerStates {
        self.states.lock().clone()
    }

    /// Number of times [`PeerStateStore::save`] was called.
    pub fn save_count(&self) -> usize {
        *self.saves.lock()
    }
}

impl PeerStateStore for MemoryPeerStateStore {
    fn load(&self) -> Result<PeerStates, StorageError> {
        Ok(self.states.lock().clone())
    }

    fn save(&self, states: &PeerStates) -> Result<(), StorageError> {
        *self.states.lock() = states.clone();
        *self.saves.lock() += 1;
        Ok(())
    }
}
