//! # Domain Errors
//!
//! Collaborator failures surfaced by the block-sync subsystem. None of these
//! are process-fatal: each is local to one packet or one sync round.

use shared_types::NodeId;
use sync_wire::WireError;
use thiserror::Error;

/// Block sync error types.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Block store read or write failed.
    #[error("Block store error: {0}")]
    Storage(String),

    /// The store already holds a block with this hash.
    #[error("Block already stored: {0}")]
    DuplicateBlock(String),

    /// Executing the block's transactions failed.
    #[error("Execution failed for block {hash}: {reason}")]
    Execution {
        /// Short hash of the block
        hash: String,
        /// Executor's explanation
        reason: String,
    },

    /// Outbound packet could not be handed to the transport.
    #[error("Send failed: {0}")]
    Send(String),

    /// Directed send to a peer that is not connected.
    #[error("Unknown peer: {0}")]
    UnknownPeer(NodeId),

    /// Packet framing or payload error.
    #[error("Wire error: {0}")]
    Wire(#[from] WireError),
}
