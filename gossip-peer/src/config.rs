//! Configuration for the gossip layer.
//!
//! Configuration is loaded from a TOML file (conventionally `gossip.toml`).
//! Every section and field is optional.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for the gossip layer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GossipConfig {
    /// Range synchronization.
    #[serde(default)]
    pub sync: SyncConfig,
    /// Per-peer routing loop.
    #[serde(default)]
    pub peer: PeerConfig,
    /// Rumor mongering.
    #[serde(default)]
    pub relay: RelayConfig,
    /// Routing graph held by [`GraphFilter`](crate::GraphFilter).
    #[serde(default)]
    pub graph: GraphConfig,
}

/// Range synchronization configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Seconds to wait for a completing reply (default: 60).
    #[serde(default = "default_sync_timeout_secs")]
    pub timeout_secs: u64,
    /// First block queried when none is given (default: 0).
    #[serde(default = "default_first_block")]
    pub first_block: u32,
    /// Number of blocks queried when none is given (default: u32::MAX).
    #[serde(default = "default_num_blocks")]
    pub num_blocks: u32,
}

/// Routing loop configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PeerConfig {
    /// Capacity of the output channel (default: 256).
    #[serde(default = "default_output_buffer")]
    pub output_buffer: usize,
}

/// Relay configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Messages queued for one peer before new ones are dropped (default: 1024).
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
    /// Capacity of the node-wide gossip hub (default: 4096).
    #[serde(default = "default_hub_capacity")]
    pub hub_capacity: usize,
}

/// Graph configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphConfig {
    /// Messages kept while waiting for their channel announcement (default: 1000).
    #[serde(default = "default_max_pending")]
    pub max_pending: usize,
}

// Default value functions
fn default_sync_timeout_secs() -> u64 {
    60
}

fn default_first_block() -> u32 {
    0
}

fn default_num_blocks() -> u32 {
    u32::MAX
}

fn default_output_buffer() -> usize {
    256
}

fn default_queue_size() -> usize {
    1024
}

fn default_hub_capacity() -> usize {
    4096
}

fn default_max_pending() -> usize {
    lngossip_core::DEFAULT_MAX_PENDING
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_sync_timeout_secs(),
            first_block: default_first_block(),
            num_blocks: default_num_blocks(),
        }
    }
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            output_buffer: default_output_buffer(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            queue_size: default_queue_size(),
            hub_capacity: default_hub_capacity(),
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            max_pending: default_max_pending(),
        }
    }
}

impl SyncConfig {
    /// Sync timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl GossipConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}
