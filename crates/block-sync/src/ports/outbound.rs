//! # Outbound Ports
//!
//! Traits for the collaborators Block Sync drives: checker, store, executor,
//! packet sender and the sync-complete flag.

use async_trait::async_trait;
use shared_types::{Block, Hash, NodeId};
use std::sync::Arc;
use sync_wire::Packet;

use crate::domain::{CheckResult, SyncError};

/// Semantic block validation - outbound port.
#[async_trait]
pub trait BlockChecker: Send + Sync {
    /// Validate `block` against local state.
    async fn check_block(&self, block: &Block) -> Result<CheckResult, SyncError>;
}

/// Local chain storage - outbound port.
///
/// Synchronous: the controller reads the tip inside its critical section.
pub trait BlockStore: Send + Sync {
    /// Most recently committed block.
    fn last_block(&self) -> Result<Option<Block>, SyncError>;

    /// Append a block.
    fn add_block(&self, block: Block) -> Result<(), SyncError>;

    /// The block whose parent is `parent`. The zero hash selects the first
    /// stored block.
    fn get_block_after(&self, parent: &Hash) -> Result<Option<Block>, SyncError>;
}

/// Transaction execution - outbound port.
#[async_trait]
pub trait BlockExecutor: Send + Sync {
    /// Apply the block's transactions to state.
    async fn execute(&self, block: &Block) -> Result<(), SyncError>;
}

/// Packet transport - outbound port.
///
/// Fire-and-forget: implementations queue the packet and return.
pub trait PacketSender: Send + Sync {
    /// Queue `packet` for every connected peer. Returns how many peers it
    /// was queued for.
    fn send_to_group(&self, packet: Packet) -> Result<usize, SyncError>;

    /// Queue `packet` for one peer.
    fn send_to_peer(&self, peer: &NodeId, packet: Packet) -> Result<(), SyncError>;
}

/// Process-wide sync-complete flag - outbound port.
pub trait SyncStatus: Send + Sync {
    /// Read the flag.
    fn is_synced(&self) -> bool;

    /// Write the flag.
    fn set_synced(&self, synced: bool);
}

impl<T: SyncStatus + ?Sized> SyncStatus for Arc<T> {
    fn is_synced(&self) -> bool {
        (**self).is_synced()
    }

    fn set_synced(&self, synced: bool) {
        (**self).set_synced(synced)
    }
}
