//! # Sync Request Responder
//!
//! Serves the other side of catch-up: answers `SyncBlockRequest`s from
//! peers with the block that follows the requested hash, or `null` when
//! the local chain has nothing newer.

use shared_types::{short_hash, Block};
use std::sync::Arc;
use sync_wire::{Packet, SyncBlockRequest};
use tracing::debug;

use crate::domain::{ConnectionContext, SyncError};
use crate::ports::{BlockStore, PacketSender};

/// Answers sync requests from the local store.
pub struct SyncRequestResponder<S, P>
where
    S: BlockStore,
    P: PacketSender,
{
    store: Arc<S>,
    sender: Arc<P>,
}

impl<S, P> SyncRequestResponder<S, P>
where
    S: BlockStore,
    P: PacketSender,
{
    /// Create a responder over `store`, replying through `sender`.
    pub fn new(store: Arc<S>, sender: Arc<P>) -> Self {
        Self { store, sender }
    }

    fn lookup(&self, request: &Packet) -> Result<Option<Block>, SyncError> {
        let SyncBlockRequest { after_hash } = SyncBlockRequest::from_packet(request)?;
        self.store.get_block_after(&after_hash)
    }

    /// Build the response to `request` without sending it.
    pub fn respond(&self, request: &Packet) -> Result<Packet, SyncError> {
        let next = self.lookup(request)?;
        Ok(Packet::sync_block_response(request.response_id, next.as_ref())?)
    }

    /// Answer `request` and queue the reply for the requesting peer.
    ///
    /// Returns true if a block was sent, false for a `null` reply.
    pub fn handle_request(
        &self,
        request: &Packet,
        ctx: &ConnectionContext,
    ) -> Result<bool, SyncError> {
        let next = self.lookup(request)?;
        match &next {
            Some(block) => debug!(
                "[sync] Serving block {} at height {} to {}",
                short_hash(&block.hash()),
                block.height(),
                ctx.remote
            ),
            None => debug!("[sync] Nothing newer for {}, replying null", ctx.remote),
        }

        let response = Packet::sync_block_response(request.response_id, next.as_ref())?;
        self.sender.send_to_peer(&ctx.peer_id, response)?;
        Ok(next.is_some())
    }
}
