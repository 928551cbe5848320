//! # Node Runtime
//!
//! Wires the block-sync service to a TCP transport.
//!
//! ## Startup Sequence
//!
//! 1. Seed the local store with the shared genesis block
//! 2. Bind the peer listener
//! 3. Dial configured static peers
//! 4. Start the sync supervisor (first `start_sync`, then periodic
//!    quorum-timeout polling and retries)
//!
//! ## Components
//!
//! ```text
//!  TcpStream ──▶ Framed<PacketCodec> ──▶ PacketDispatcher ──┬─▶ SyncRequestResponder
//!      ▲                                                     └─▶ BlockSyncService
//!      │                                                              │
//!      └──────────────── ChannelSender (per-connection outbox) ◀──────┘
//! ```

#![warn(missing_docs)]
#![allow(clippy::type_complexity)]

pub mod config;
pub mod dispatch;
pub mod transport;

pub use config::{ConfigError, NodeConfig};
pub use dispatch::{Dispatched, PacketDispatcher, Responder, SyncService};
pub use transport::Transport;

use anyhow::{Context, Result};
use block_sync::adapters::{
    AtomicSyncStatus, ChainLinkChecker, ChannelSender, InMemoryBlockStore, LedgerExecutor,
};
use block_sync::{BlockStore, BlockSyncApi, BlockSyncService, SyncRequestResponder, SyncState};
use shared_types::{short_hash, Block, Hash};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// A running block-sync node.
pub struct NodeRuntime {
    config: NodeConfig,
    store: Arc<InMemoryBlockStore>,
    executor: Arc<LedgerExecutor>,
    registry: Arc<ChannelSender>,
    service: Arc<SyncService>,
    transport: Arc<Transport>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl NodeRuntime {
    /// Build every component. Nothing touches the network until `start`.
    pub fn new(config: NodeConfig) -> Self {
        info!("Creating block-sync node runtime");

        let genesis = Block::genesis(config.genesis_timestamp);
        info!("Genesis block {}", short_hash(&genesis.hash()));

        let store = Arc::new(InMemoryBlockStore::with_genesis(genesis));
        let executor = Arc::new(LedgerExecutor::new());
        let registry = Arc::new(ChannelSender::new());
        let status = Arc::new(AtomicSyncStatus::new());

        let service = Arc::new(BlockSyncService::new(
            config.sync.clone(),
            Arc::new(ChainLinkChecker::new(store.clone())),
            store.clone(),
            executor.clone(),
            registry.clone(),
            status,
        ));
        let responder = SyncRequestResponder::new(store.clone(), registry.clone());
        let dispatcher = Arc::new(PacketDispatcher::new(service.clone(), responder));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let transport = Arc::new(Transport::new(
            config.wire.clone(),
            registry.clone(),
            dispatcher,
            shutdown_rx.clone(),
        ));

        Self {
            config,
            store,
            executor,
            registry,
            service,
            transport,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Bind, dial and start syncing. Returns the bound listen address.
    pub async fn start(&self) -> Result<SocketAddr> {
        let listener = TcpListener::bind(self.config.listen_addr)
            .await
            .with_context(|| format!("Failed to bind {}", self.config.listen_addr))?;
        let local_addr = listener.local_addr()?;
        info!("Listening for peers on {}", local_addr);

        tokio::spawn(self.transport.clone().serve(listener));

        for &peer in &self.config.peers {
            if let Err(e) = self.transport.clone().dial(peer).await {
                warn!("[net] Could not reach peer {}: {}", peer, e);
            }
        }

        self.spawn_supervisor();
        Ok(local_addr)
    }

    /// Poll quorum timeouts and retry sync while the node is not synced.
    ///
    /// A retry fires on the first tick and whenever a tick passes with the
    /// node unsynced and the tip unchanged.
    fn spawn_supervisor(&self) {
        let service = self.service.clone();
        let store = self.store.clone();
        let mut shutdown = self.shutdown_rx.clone();
        let mut ticker = tokio::time::interval(self.config.sync_retry_interval());

        tokio::spawn(async move {
            let mut last_tip: Option<Hash> = None;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = shutdown.changed() => break,
                }

                service.check_quorum_timeout();
                if service.is_synced() {
                    continue;
                }

                let tip = match store.last_block() {
                    Ok(tip) => tip.map(|b| b.hash()),
                    Err(e) => {
                        error!("[sync] Cannot read tip: {}", e);
                        continue;
                    }
                };
                let stalled = tip == last_tip || service.state() == SyncState::Idle;
                last_tip = tip;
                if !stalled {
                    continue;
                }

                if let Err(e) = service.start_sync() {
                    warn!("[sync] Sync retry failed: {}", e);
                }
            }
        });
    }

    /// Signal every task to stop.
    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown...");
        if let Err(e) = self.shutdown_tx.send(true) {
            error!("Failed to send shutdown signal: {}", e);
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        info!("Shutdown complete");
    }

    /// The sync service.
    pub fn service(&self) -> Arc<SyncService> {
        self.service.clone()
    }

    /// The local block store.
    pub fn store(&self) -> Arc<InMemoryBlockStore> {
        self.store.clone()
    }

    /// The ledger the executor applies blocks to.
    pub fn executor(&self) -> Arc<LedgerExecutor> {
        self.executor.clone()
    }

    /// Number of live peer connections.
    pub fn active_peers(&self) -> usize {
        self.registry.active_peers()
    }

    /// Effective configuration.
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::Transaction;
    use std::time::Instant;

    async fn wait_for(mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if done() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        done()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_node_catches_up_over_tcp() {
        const ALICE: [u8; 20] = [0xA1; 20];
        const BOB: [u8; 20] = [0xB0; 20];

        let server = NodeRuntime::new(NodeConfig::for_testing());
        let genesis = server.store().last_block().unwrap().unwrap();
        let b1 = genesis.child(genesis.timestamp() + 10, Vec::new());
        let b2 = b1.child(b1.timestamp() + 10, Vec::new());
        let b3 = b2.child(b2.timestamp() + 10, vec![Transaction::transfer(ALICE, BOB, 0, 0)]);
        for block in [&b1, &b2, &b3] {
            server.store().add_block(block.clone()).unwrap();
        }
        let server_addr = server.start().await.unwrap();

        let client = NodeRuntime::new(NodeConfig {
            peers: vec![server_addr],
            ..NodeConfig::for_testing()
        });
        client.start().await.unwrap();

        let client_store = client.store();
        let client_service = client.service();
        assert!(
            wait_for(|| client_store.len() == 4 && client_service.is_synced()).await,
            "client did not sync: {} blocks, synced={}",
            client_store.len(),
            client_service.is_synced()
        );
        assert!(client_store.last_block().unwrap().unwrap().same_block(&b3));
        assert_eq!(client.executor().executed_blocks(), 3);
        assert_eq!(client.active_peers(), 1);

        client.shutdown().await;
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_lone_node_never_confirms_tip() {
        let node = NodeRuntime::new(NodeConfig::for_testing());
        node.start().await.unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!node.service().is_synced());
        assert_eq!(node.active_peers(), 0);

        node.shutdown().await;
    }
}
