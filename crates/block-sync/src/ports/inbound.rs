//! # Inbound Ports
//!
//! API trait defining what Block Sync can do.

use async_trait::async_trait;
use shared_types::Block;

use crate::domain::{ConnectionContext, HandleOutcome, RoundStatus, SyncError, SyncState};

/// Block Sync API - inbound port.
#[async_trait]
pub trait BlockSyncApi: Send + Sync {
    /// Process the decoded body of a `SyncBlockResponse`.
    ///
    /// `body` is `None` when the peer has no block after the requested hash.
    /// Guard rejections are not errors; they come back as
    /// [`HandleOutcome::Rejected`].
    async fn handle_block_response(
        &self,
        body: Option<Block>,
        ctx: &ConnectionContext,
    ) -> Result<HandleOutcome, SyncError>;

    /// Open a fresh quorum round and ask the group for the block after the
    /// local tip. Returns the new round number.
    fn start_sync(&self) -> Result<u64, SyncError>;

    /// Fail the open quorum round if its deadline has passed.
    fn check_quorum_timeout(&self) -> RoundStatus;

    /// The block currently being synchronized. May be stale by the time the
    /// caller looks at it.
    fn current_sync_block(&self) -> Option<Block>;

    /// Current controller state.
    fn state(&self) -> SyncState;

    /// Whether the network has confirmed the local tip.
    fn is_synced(&self) -> bool;
}
