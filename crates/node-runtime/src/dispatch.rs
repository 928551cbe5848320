//! # Packet Dispatch
//!
//! Routes decoded packets to the block-sync service by message type.

use block_sync::adapters::{
    AtomicSyncStatus, ChainLinkChecker, ChannelSender, InMemoryBlockStore, LedgerExecutor,
};
use block_sync::{
    BlockSyncApi, BlockSyncService, ConnectionContext, HandleOutcome, SyncError,
    SyncRequestResponder,
};
use std::sync::Arc;
use sync_wire::{decode_optional_block, MessageType, Packet};
use tracing::{debug, warn};

/// The sync service as wired by this runtime.
pub type SyncService = BlockSyncService<
    ChainLinkChecker<InMemoryBlockStore>,
    InMemoryBlockStore,
    LedgerExecutor,
    ChannelSender,
    AtomicSyncStatus,
>;

/// The request responder as wired by this runtime.
pub type Responder = SyncRequestResponder<InMemoryBlockStore, ChannelSender>;

/// What the dispatcher did with a packet.
#[derive(Debug, PartialEq, Eq)]
pub enum Dispatched {
    /// Sync request answered; true if a block was sent.
    Served(bool),
    /// Sync response processed.
    Synced(HandleOutcome),
    /// Keep-alive.
    Heartbeat,
    /// Known type this node does not act on.
    Ignored(MessageType),
    /// Unknown type tag.
    Unknown(u8),
}

/// Routes packets from every connection.
pub struct PacketDispatcher {
    service: Arc<SyncService>,
    responder: Responder,
}

impl PacketDispatcher {
    /// Dispatcher over `service`, answering requests through `responder`.
    pub fn new(service: Arc<SyncService>, responder: Responder) -> Self {
        Self { service, responder }
    }

    /// Handle one inbound packet.
    ///
    /// Errors are local to this packet; the connection stays open.
    pub async fn dispatch(
        &self,
        packet: Packet,
        ctx: &ConnectionContext,
    ) -> Result<Dispatched, SyncError> {
        let msg_type = match packet.message_type() {
            Ok(t) => t,
            Err(_) => {
                warn!(
                    "[net] Dropping packet with unknown type 0x{:02x} from {}",
                    packet.msg_type, ctx.remote
                );
                return Ok(Dispatched::Unknown(packet.msg_type));
            }
        };

        match msg_type {
            MessageType::SyncBlockRequest => {
                let sent = self.responder.handle_request(&packet, ctx)?;
                Ok(Dispatched::Served(sent))
            }
            MessageType::SyncBlockResponse => {
                let body = decode_optional_block(&packet.body)?;
                let outcome = self.service.handle_block_response(body, ctx).await?;
                Ok(Dispatched::Synced(outcome))
            }
            MessageType::Heartbeat => Ok(Dispatched::Heartbeat),
            other => {
                debug!("[net] Ignoring {:?} from {}", other, ctx.remote);
                Ok(Dispatched::Ignored(other))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use block_sync::{BlockStore, SyncConfig};
    use shared_types::{Block, NodeId};
    use tokio::sync::mpsc;

    struct Fixture {
        dispatcher: PacketDispatcher,
        store: Arc<InMemoryBlockStore>,
        sender: Arc<ChannelSender>,
    }

    fn fixture(genesis: &Block) -> Fixture {
        let store = Arc::new(InMemoryBlockStore::with_genesis(genesis.clone()));
        let sender = Arc::new(ChannelSender::new());
        let service = Arc::new(BlockSyncService::new(
            SyncConfig::for_testing(),
            Arc::new(ChainLinkChecker::new(store.clone())),
            store.clone(),
            Arc::new(LedgerExecutor::new()),
            sender.clone(),
            Arc::new(AtomicSyncStatus::new()),
        ));
        let responder = SyncRequestResponder::new(store.clone(), sender.clone());
        Fixture {
            dispatcher: PacketDispatcher::new(service, responder),
            store,
            sender,
        }
    }

    fn ctx(peer: &NodeId) -> ConnectionContext {
        ConnectionContext {
            peer_id: peer.clone(),
            remote: "203.0.113.5:7000".to_string(),
            active_peers: 1,
        }
    }

    #[tokio::test]
    async fn test_request_answered_to_sender() {
        let genesis = Block::genesis(1);
        let f = fixture(&genesis);
        let peer = NodeId([7; 32]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        f.sender.register(peer.clone(), tx);

        let request = Packet::sync_block_request(genesis.hash(), 3).unwrap();
        let result = f.dispatcher.dispatch(request, &ctx(&peer)).await.unwrap();

        assert_eq!(result, Dispatched::Served(false));
        let reply = rx.try_recv().unwrap();
        assert_eq!(reply.message_type().unwrap(), MessageType::SyncBlockResponse);
        assert_eq!(reply.response_id, 3);
    }

    #[tokio::test]
    async fn test_response_commits_block() {
        let genesis = Block::genesis(1);
        let f = fixture(&genesis);
        let b1 = genesis.child(10, Vec::new());

        let response = Packet::sync_block_response(1, Some(&b1)).unwrap();
        let result = f
            .dispatcher
            .dispatch(response, &ctx(&NodeId([7; 32])))
            .await
            .unwrap();

        assert!(matches!(result, Dispatched::Synced(ref o) if o.is_committed()));
        assert_eq!(f.store.len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_response_is_packet_error() {
        let f = fixture(&Block::genesis(1));
        let response = Packet::new(MessageType::SyncBlockResponse, 1, &b"{not json"[..]);

        let result = f.dispatcher.dispatch(response, &ctx(&NodeId([7; 32]))).await;
        assert!(matches!(result, Err(SyncError::Wire(_))));
        assert_eq!(f.store.last_block().unwrap().map(|b| b.height()), Some(0));
    }

    #[tokio::test]
    async fn test_other_types_ignored() {
        let f = fixture(&Block::genesis(1));
        let peer = NodeId([7; 32]);

        let text = Packet::new(MessageType::Text, 0, &b"hi"[..]);
        assert_eq!(
            f.dispatcher.dispatch(text, &ctx(&peer)).await.unwrap(),
            Dispatched::Ignored(MessageType::Text)
        );
        assert_eq!(
            f.dispatcher.dispatch(Packet::heartbeat(), &ctx(&peer)).await.unwrap(),
            Dispatched::Heartbeat
        );

        let unknown = Packet {
            msg_type: 0xEE,
            response_id: 0,
            body: Default::default(),
        };
        assert_eq!(
            f.dispatcher.dispatch(unknown, &ctx(&peer)).await.unwrap(),
            Dispatched::Unknown(0xEE)
        );
    }
}
