//! # Block Sync Configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Block sync configuration.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SyncConfig {
    /// How long a quorum round may stay undecided after its first vote
    /// before it is failed, in milliseconds. Zero disables the timeout.
    pub quorum_timeout_ms: u64,

    /// Lower bound on N when computing the quorum threshold. Stops a node
    /// with a single live connection from confirming its tip alone.
    pub min_quorum_peers: usize,

    /// Let `start_sync` clear a cursor left pinned by a block that failed
    /// validation.
    pub release_rejected_on_retry: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            quorum_timeout_ms: 10_000,
            min_quorum_peers: 1,
            release_rejected_on_retry: true,
        }
    }
}

impl SyncConfig {
    /// Create a config for testing (short timeout).
    pub fn for_testing() -> Self {
        Self {
            quorum_timeout_ms: 200,
            min_quorum_peers: 1,
            release_rejected_on_retry: true,
        }
    }

    /// Quorum timeout as a `Duration`, `None` when disabled.
    pub fn quorum_timeout(&self) -> Option<Duration> {
        (self.quorum_timeout_ms > 0).then(|| Duration::from_millis(self.quorum_timeout_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert_eq!(config.quorum_timeout(), Some(Duration::from_secs(10)));
        assert_eq!(config.min_quorum_peers, 1);
        assert!(config.release_rejected_on_retry);
    }

    #[test]
    fn test_zero_timeout_disables() {
        let config = SyncConfig {
            quorum_timeout_ms: 0,
            ..SyncConfig::default()
        };
        assert_eq!(config.quorum_timeout(), None);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: SyncConfig = serde_json::from_str(r#"{"min_quorum_peers": 3}"#).unwrap();
        assert_eq!(config.min_quorum_peers, 3);
        assert_eq!(config.quorum_timeout_ms, 10_000);
    }
}
