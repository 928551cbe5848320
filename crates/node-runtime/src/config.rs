//! # Node Configuration
//!
//! Runtime parameters for a block-sync node.
//!
//! Sources, later ones winning:
//!
//! 1. Built-in defaults
//! 2. TOML file named by `SYNC_CONFIG`
//! 3. `SYNC_LISTEN_ADDR`, `SYNC_PEERS` (comma-separated) and `SYNC_LOG_LEVEL`
//!
//! ```toml
//! listen_addr = "0.0.0.0:7000"
//! peers = ["10.0.0.2:7000", "10.0.0.3:7000"]
//! log_level = "info"
//! sync_retry_ms = 15000
//!
//! [wire]
//! byte_order = "big"
//! max_body_len = 16777216
//!
//! [sync]
//! quorum_timeout_ms = 10000
//! min_quorum_peers = 1
//! release_rejected_on_retry = true
//! ```

use block_sync::SyncConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use sync_wire::WireConfig;
use thiserror::Error;

/// Env var naming the TOML config file.
pub const CONFIG_PATH_ENV: &str = "SYNC_CONFIG";
/// Env override for [`NodeConfig::listen_addr`].
pub const LISTEN_ADDR_ENV: &str = "SYNC_LISTEN_ADDR";
/// Env override for [`NodeConfig::peers`].
pub const PEERS_ENV: &str = "SYNC_PEERS";
/// Env override for [`NodeConfig::log_level`].
pub const LOG_LEVEL_ENV: &str = "SYNC_LOG_LEVEL";

/// Genesis timestamp shared by every node of the network.
pub const DEFAULT_GENESIS_TIMESTAMP: u64 = 1_700_000_000_000;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// Path of the file that failed to load
        path: String,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Config file is not valid TOML for [`NodeConfig`].
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// An environment override could not be parsed.
    #[error("Invalid value for {var}: {value:?}")]
    InvalidEnv {
        /// Variable name
        var: &'static str,
        /// Offending value
        value: String,
    },
}

/// Complete node configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Address the peer listener binds to.
    pub listen_addr: SocketAddr,
    /// Static peers dialled at startup.
    pub peers: Vec<SocketAddr>,
    /// Log filter used when `RUST_LOG` is unset.
    pub log_level: String,
    /// Timestamp of the shared genesis block.
    pub genesis_timestamp: u64,
    /// Interval of the sync supervisor: quorum timeouts are polled and a
    /// stalled, unsynced node re-requests from its tip.
    pub sync_retry_ms: u64,
    /// Framing settings for every connection.
    pub wire: WireConfig,
    /// Block sync settings.
    pub sync: SyncConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 7000)),
            peers: Vec::new(),
            log_level: "info".to_string(),
            genesis_timestamp: DEFAULT_GENESIS_TIMESTAMP,
            sync_retry_ms: 15_000,
            wire: WireConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Create a config for testing: loopback, ephemeral port, fast retries.
    pub fn for_testing() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            log_level: "debug".to_string(),
            sync_retry_ms: 50,
            sync: SyncConfig::for_testing(),
            ..Self::default()
        }
    }

    /// Load from the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };
        config.apply_env(|var| std::env::var(var).ok())?;
        Ok(config)
    }

    /// Load a TOML file. Missing keys keep their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|source| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse a TOML document.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Apply env overrides, reading variables through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(LISTEN_ADDR_ENV) {
            self.listen_addr = value.parse().map_err(|_| ConfigError::InvalidEnv {
                var: LISTEN_ADDR_ENV,
                value: value.clone(),
            })?;
        }

        if let Some(value) = lookup(PEERS_ENV) {
            self.peers = value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    s.parse().map_err(|_| ConfigError::InvalidEnv {
                        var: PEERS_ENV,
                        value: value.clone(),
                    })
                })
                .collect::<Result<_, _>>()?;
        }

        if let Some(value) = lookup(LOG_LEVEL_ENV) {
            self.log_level = value;
        }

        Ok(())
    }

    /// Supervisor interval.
    pub fn sync_retry_interval(&self) -> Duration {
        Duration::from_millis(self.sync_retry_ms.max(1))
    }
}
