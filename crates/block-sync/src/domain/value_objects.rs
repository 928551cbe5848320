//! # Domain Value Objects
//!
//! Immutable value types for Block Sync.

use serde::{Deserialize, Serialize};
use shared_types::{Hash, NodeId};
use std::fmt;

use super::cursor::GuardRejection;
use super::quorum::RoundStatus;

/// Where the controller is in the catch-up cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncState {
    /// No cursor; sync has not started or a round has finished.
    Idle,
    /// A block is being validated, committed and executed.
    Syncing,
    /// A peer reported "nothing after your tip"; a quorum round is open.
    Confirming,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncState::Idle => write!(f, "idle"),
            SyncState::Syncing => write!(f, "syncing"),
            SyncState::Confirming => write!(f, "confirming"),
        }
    }
}

/// Result code returned by a [`BlockChecker`](crate::ports::BlockChecker).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckCode {
    /// Block is semantically valid.
    Ok,
    /// Parent hash does not match the local tip.
    BadParent,
    /// Height is not tip height + 1.
    BadHeight,
    /// Timestamp does not move forward.
    BadTimestamp,
    /// Stored hash or merkle root does not match the contents.
    BadHash,
    /// Any other rejection.
    Invalid,
}

/// Outcome of semantic validation: `{code, message}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Result code.
    pub code: CheckCode,
    /// Human-readable explanation, empty on success.
    pub message: String,
}

impl CheckResult {
    /// A passing result.
    pub fn ok() -> Self {
        Self {
            code: CheckCode::Ok,
            message: String::new(),
        }
    }

    /// A failing result with the given code.
    pub fn invalid(code: CheckCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// True if the block passed.
    pub fn is_ok(&self) -> bool {
        self.code == CheckCode::Ok
    }
}

/// Per-packet context supplied by the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionContext {
    /// Identity of the peer that sent the packet. One quorum vote per peer.
    pub peer_id: NodeId,
    /// Remote address, for log lines.
    pub remote: String,
    /// Number of live peer connections when the packet arrived.
    pub active_peers: usize,
}

impl ConnectionContext {
    /// Build a context for `remote`, deriving the peer id from the address.
    pub fn new(remote: impl Into<String>, active_peers: usize) -> Self {
        let remote = remote.into();
        Self {
            peer_id: NodeId::from_label(&remote),
            remote,
            active_peers,
        }
    }
}

/// What a single `handle_block_response` call did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandleOutcome {
    /// The guard dropped the response before any state changed.
    Rejected(GuardRejection),
    /// Block validated, stored, executed and the next request went out.
    Committed {
        /// Hash of the committed block
        hash: Hash,
        /// Height of the committed block
        height: u64,
    },
    /// Block failed validation; the cursor stays on it.
    Invalid {
        /// Hash of the rejected block
        hash: Hash,
        /// Checker's message
        reason: String,
    },
    /// A "no further block" response was counted as a tip vote.
    TipReported(RoundStatus),
}

impl HandleOutcome {
    /// True if the block was committed.
    pub fn is_committed(&self) -> bool {
        matches!(self, HandleOutcome::Committed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_result() {
        assert!(CheckResult::ok().is_ok());

        let bad = CheckResult::invalid(CheckCode::BadParent, "unknown parent");
        assert!(!bad.is_ok());
        assert_eq!(bad.message, "unknown parent");
    }

    #[test]
    fn test_connection_context_peer_id_follows_remote() {
        let a = ConnectionContext::new("10.0.0.1:7000", 3);
        let b = ConnectionContext::new("10.0.0.1:7000", 5);
        assert_eq!(a.peer_id, b.peer_id);
        assert_ne!(a.peer_id, ConnectionContext::new("10.0.0.2:7000", 3).peer_id);
    }

    #[test]
    fn test_sync_state_display() {
        assert_eq!(SyncState::Confirming.to_string(), "confirming");
    }
}
