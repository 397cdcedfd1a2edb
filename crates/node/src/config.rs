//! Node configuration.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use zsync_primitives::ZSYNC_GROUP;

use crate::error::NodeError;

/// Default deadline for replies from the sync agent and worker acks.
pub const DEFAULT_REPLY_TIMEOUT_MS: u64 = 5_000;

/// Default pause after joining the group so the fabric can interconnect.
pub const DEFAULT_INTERCONNECT_DELAY_MS: u64 = 250;

/// How incoming `UPDATE` states are applied against the known state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatePolicy {
    /// Ignore updates that would move a peer's state backwards.
    #[default]
    Monotonic,
    /// Apply every update as received.
    Permissive,
}

impl StatePolicy {
    /// Whether moving from `known` to `received` is allowed.
    pub fn accepts(self, known: u64, received: u64) -> bool {
        match self {
            Self::Monotonic => received >= known,
            Self::Permissive => true,
        }
    }
}

/// Node configuration, loadable from TOML. Missing fields take defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Directory holding the identity file and the peer state snapshot.
    pub data_dir: PathBuf,
    /// Group joined on the fabric.
    pub group: String,
    pub reply_timeout_ms: u64,
    pub interconnect_delay_ms: u64,
    pub state_policy: StatePolicy,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            group: ZSYNC_GROUP.to_string(),
            reply_timeout_ms: DEFAULT_REPLY_TIMEOUT_MS,
            interconnect_delay_ms: DEFAULT_INTERCONNECT_DELAY_MS,
            state_policy: StatePolicy::default(),
        }
    }
}

impl NodeConfig {
    /// Default configuration rooted at `data_dir`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, NodeError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| NodeError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, NodeError> {
        Ok(toml::from_str(content)?)
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }

    pub fn interconnect_delay(&self) -> Duration {
        Duration::from_millis(self.interconnect_delay_ms)
    }
}
