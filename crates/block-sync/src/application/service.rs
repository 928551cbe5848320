//! # Block Sync Service
//!
//! Drives the sync cursor from inbound `SyncBlockResponse` bodies.
//!
//! ## Flow
//!
//! ```text
//! response ──▶ guard+assign (cursor lock) ──┬─ block ──▶ check ──▶ commit ──▶ execute ──▶ request next
//!                                           │
//!                                           └─ null ───▶ vote local tip into quorum round
//! ```
//!
//! The guard and the cursor assignment run under one lock so that, of many
//! connections delivering responses at once, only the newest unseen block
//! proceeds. Committing a block and opening the next quorum round happen
//! under the quorum lock, which is also where a tip vote reads the tip, so a
//! vote always lands in the round of the tip it names. No lock is held
//! across an await, and the two locks are never nested.

use async_trait::async_trait;
use parking_lot::Mutex;
use shared_types::{short_hash, Block, Hash, ZERO_HASH};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use sync_wire::Packet;
use tracing::{debug, error, info, warn};

use crate::config::SyncConfig;
use crate::domain::{
    ConnectionContext, FailReason, HandleOutcome, QuorumObserver, QuorumTracker, RoundStatus,
    SameHash, SyncCursor, SyncError, SyncState,
};
use crate::ports::{
    BlockChecker, BlockExecutor, BlockStore, BlockSyncApi, PacketSender, SyncStatus,
};

/// Publishes quorum outcomes to the sync-complete flag.
struct StatusObserver<T> {
    status: Arc<T>,
}

impl<T: SyncStatus> QuorumObserver for StatusObserver<T> {
    fn on_agreement(&self, round: u64) {
        if self.status.is_synced() {
            debug!("[sync] Round {} agreed, already synced", round);
            return;
        }
        self.status.set_synced(true);
        info!("[sync] Round {}: peers confirmed local tip, node is synced", round);
    }

    fn on_agree_fail(&self, round: u64, reason: FailReason) {
        self.status.set_synced(false);
        warn!("[sync] Round {} failed ({}), sync must be retried", round, reason);
    }
}

type TipQuorum<T> = QuorumTracker<Block, SameHash, StatusObserver<T>>;

/// Block Sync Service.
///
/// ## Dependencies
///
/// - `C: BlockChecker` - semantic validation
/// - `S: BlockStore` - local chain
/// - `X: BlockExecutor` - transaction execution
/// - `P: PacketSender` - group broadcast
/// - `T: SyncStatus` - sync-complete flag
///
/// Thread-safe; share it across connection tasks via `Arc`.
pub struct BlockSyncService<C, S, X, P, T>
where
    C: BlockChecker,
    S: BlockStore,
    X: BlockExecutor,
    P: PacketSender,
    T: SyncStatus,
{
    config: SyncConfig,
    checker: Arc<C>,
    store: Arc<S>,
    executor: Arc<X>,
    sender: Arc<P>,
    status: Arc<T>,
    cursor: Mutex<SyncCursor>,
    quorum: Mutex<TipQuorum<T>>,
    next_response_id: AtomicI64,
}

impl<C, S, X, P, T> BlockSyncService<C, S, X, P, T>
where
    C: BlockChecker,
    S: BlockStore,
    X: BlockExecutor,
    P: PacketSender,
    T: SyncStatus,
{
    /// Create a new service. Quorum round 0 is open from the start.
    pub fn new(
        config: SyncConfig,
        checker: Arc<C>,
        store: Arc<S>,
        executor: Arc<X>,
        sender: Arc<P>,
        status: Arc<T>,
    ) -> Self {
        let observer = StatusObserver {
            status: status.clone(),
        };
        let quorum = QuorumTracker::new(SameHash, observer)
            .with_min_peers(config.min_quorum_peers)
            .with_timeout(config.quorum_timeout());

        Self {
            config,
            checker,
            store,
            executor,
            sender,
            status,
            cursor: Mutex::new(SyncCursor::new()),
            quorum: Mutex::new(quorum),
            next_response_id: AtomicI64::new(1),
        }
    }

    fn next_response_id(&self) -> i64 {
        self.next_response_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Broadcast a request for the block whose parent is `after`.
    fn request_after(&self, after: Hash) -> Result<usize, SyncError> {
        let packet = Packet::sync_block_request(after, self.next_response_id())?;
        let peers = self.sender.send_to_group(packet)?;
        debug!(
            "[sync] Requested block after {} from {} peers",
            short_hash(&after),
            peers
        );
        Ok(peers)
    }

    /// Log a collaborator failure and leave the cursor pinned but releasable.
    fn pin_on_failure(&self, hash: &Hash, stage: &str, err: SyncError) -> SyncError {
        error!("[sync] {} failed for block {}: {}", stage, short_hash(hash), err);
        self.cursor.lock().mark_rejected(hash);
        err
    }

    async fn sync_block(&self, block: Block) -> Result<HandleOutcome, SyncError> {
        let hash = block.hash();
        let height = block.height();

        let check = self
            .checker
            .check_block(&block)
            .await
            .map_err(|e| self.pin_on_failure(&hash, "Validation", e))?;

        if !check.is_ok() {
            warn!(
                "[sync] Block {} at height {} failed validation ({:?}): {}",
                short_hash(&hash),
                height,
                check.code,
                check.message
            );
            self.cursor.lock().mark_rejected(&hash);
            return Ok(HandleOutcome::Invalid {
                hash,
                reason: check.message,
            });
        }

        // The tip moves here, so earlier tip votes no longer apply.
        let committed = {
            let mut quorum = self.quorum.lock();
            self.store
                .add_block(block.clone())
                .map(|()| quorum.start_round())
        };
        let round = committed.map_err(|e| self.pin_on_failure(&hash, "Commit", e))?;

        self.executor
            .execute(&block)
            .await
            .map_err(|e| self.pin_on_failure(&hash, "Execution", e))?;

        info!(
            "[sync] Committed block {} at height {} (round {})",
            short_hash(&hash),
            height,
            round
        );

        self.request_after(hash)
            .map_err(|e| self.pin_on_failure(&hash, "Next-block request", e))?;

        Ok(HandleOutcome::Committed { hash, height })
    }

    fn report_tip(&self, ctx: &ConnectionContext) -> Result<HandleOutcome, SyncError> {
        let status = {
            let mut quorum = self.quorum.lock();
            let tip = self.store.last_block()?;
            if tip.is_none() {
                debug!(
                    "[sync] Peer {} has nothing newer but local chain is empty, vote ignored",
                    ctx.remote
                );
            }
            quorum.receive_event(&ctx.peer_id, tip, ctx.active_peers)
        };

        if status.is_terminal() {
            self.cursor.lock().settle();
        } else {
            debug!("[sync] Tip vote from {}: {:?}", ctx.remote, status);
        }
        Ok(HandleOutcome::TipReported(status))
    }
}

#[async_trait]
impl<C, S, X, P, T> BlockSyncApi for BlockSyncService<C, S, X, P, T>
where
    C: BlockChecker,
    S: BlockStore,
    X: BlockExecutor,
    P: PacketSender,
    T: SyncStatus,
{
    async fn handle_block_response(
        &self,
        body: Option<Block>,
        ctx: &ConnectionContext,
    ) -> Result<HandleOutcome, SyncError> {
        {
            let mut cursor = self.cursor.lock();
            let tip = self.store.last_block()?;
            if let Err(rejection) = cursor.admit(body.as_ref(), tip.as_ref()) {
                debug!(
                    "[sync] Dropped response from {}: {}",
                    ctx.remote, rejection
                );
                return Ok(HandleOutcome::Rejected(rejection));
            }
        }

        match body {
            Some(block) => self.sync_block(block).await,
            None => self.report_tip(ctx),
        }
    }

    fn start_sync(&self) -> Result<u64, SyncError> {
        let tip = {
            let mut cursor = self.cursor.lock();
            if self.config.release_rejected_on_retry && cursor.release_rejected() {
                info!("[sync] Released cursor pinned by a failed block");
            }
            self.store.last_block()?
        };

        let round = self.quorum.lock().start_round();
        let after = tip.as_ref().map(Block::hash).unwrap_or(ZERO_HASH);
        info!(
            "[sync] Starting sync round {} after {}",
            round,
            short_hash(&after)
        );
        self.request_after(after)?;
        Ok(round)
    }

    fn check_quorum_timeout(&self) -> RoundStatus {
        let status = self.quorum.lock().poll_timeout(Instant::now());
        if status.is_terminal() {
            self.cursor.lock().settle();
        }
        status
    }

    fn current_sync_block(&self) -> Option<Block> {
        self.cursor.lock().current().cloned()
    }

    fn state(&self) -> SyncState {
        self.cursor.lock().state()
    }

    fn is_synced(&self) -> bool {
        self.status.is_synced()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{AtomicSyncStatus, InMemoryBlockStore};
    use crate::domain::{CheckCode, CheckResult, GuardRejection};
    use shared_types::NodeId;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use sync_wire::{MessageType, SyncBlockRequest};
    use tokio::sync::Notify;

    // ==========================================================================
    // MOCK IMPLEMENTATIONS FOR TESTING
    // ==========================================================================

    struct ScriptedChecker {
        result: Mutex<CheckResult>,
    }

    impl ScriptedChecker {
        fn passing() -> Self {
            Self {
                result: Mutex::new(CheckResult::ok()),
            }
        }

        fn set(&self, result: CheckResult) {
            *self.result.lock() = result;
        }
    }

    #[async_trait]
    impl BlockChecker for ScriptedChecker {
        async fn check_block(&self, _block: &Block) -> Result<CheckResult, SyncError> {
            tokio::task::yield_now().await;
            Ok(self.result.lock().clone())
        }
    }

    /// Parks the first check until released.
    #[derive(Default)]
    struct GatedChecker {
        calls: AtomicUsize,
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl BlockChecker for GatedChecker {
        async fn check_block(&self, _block: &Block) -> Result<CheckResult, SyncError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                self.entered.notify_one();
                self.release.notified().await;
            }
            Ok(CheckResult::ok())
        }
    }

    #[derive(Default)]
    struct CountingExecutor {
        executed: AtomicUsize,
        fail: Mutex<bool>,
    }

    #[async_trait]
    impl BlockExecutor for CountingExecutor {
        async fn execute(&self, block: &Block) -> Result<(), SyncError> {
            if *self.fail.lock() {
                return Err(SyncError::Execution {
                    hash: short_hash(&block.hash()),
                    reason: "scripted failure".to_string(),
                });
            }
            self.executed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<Packet>>,
    }

    impl RecordingSender {
        fn requested_after(&self) -> Vec<Hash> {
            self.sent
                .lock()
                .iter()
                .map(|p| SyncBlockRequest::from_packet(p).unwrap().after_hash)
                .collect()
        }
    }

    impl PacketSender for RecordingSender {
        fn send_to_group(&self, packet: Packet) -> Result<usize, SyncError> {
            self.sent.lock().push(packet);
            Ok(3)
        }

        fn send_to_peer(&self, _peer: &NodeId, packet: Packet) -> Result<(), SyncError> {
            self.sent.lock().push(packet);
            Ok(())
        }
    }

    type TestService = BlockSyncService<
        ScriptedChecker,
        InMemoryBlockStore,
        CountingExecutor,
        RecordingSender,
        AtomicSyncStatus,
    >;

    struct Harness {
        service: Arc<TestService>,
        checker: Arc<ScriptedChecker>,
        store: Arc<InMemoryBlockStore>,
        executor: Arc<CountingExecutor>,
        sender: Arc<RecordingSender>,
        status: Arc<AtomicSyncStatus>,
    }

    fn harness(config: SyncConfig, store: InMemoryBlockStore) -> Harness {
        let checker = Arc::new(ScriptedChecker::passing());
        let store = Arc::new(store);
        let executor = Arc::new(CountingExecutor::default());
        let sender = Arc::new(RecordingSender::default());
        let status = Arc::new(AtomicSyncStatus::new());
        let service = Arc::new(BlockSyncService::new(
            config,
            checker.clone(),
            store.clone(),
            executor.clone(),
            sender.clone(),
            status.clone(),
        ));
        Harness {
            service,
            checker,
            store,
            executor,
            sender,
            status,
        }
    }

    fn peer(n: u8, active: usize) -> ConnectionContext {
        ConnectionContext {
            peer_id: NodeId([n; 32]),
            remote: format!("10.0.0.{}:7000", n),
            active_peers: active,
        }
    }

    #[tokio::test]
    async fn test_valid_block_committed_and_next_requested() {
        let genesis = Block::genesis(1);
        let h = harness(SyncConfig::for_testing(), InMemoryBlockStore::with_genesis(genesis.clone()));
        let b1 = genesis.child(10, Vec::new());

        let outcome = h
            .service
            .handle_block_response(Some(b1.clone()), &peer(1, 3))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            HandleOutcome::Committed {
                hash: b1.hash(),
                height: 1
            }
        );
        assert!(h.store.last_block().unwrap().unwrap().same_block(&b1));
        assert_eq!(h.executor.executed.load(Ordering::SeqCst), 1);
        assert_eq!(h.sender.requested_after(), vec![b1.hash()]);
        assert_eq!(
            h.sender.sent.lock()[0].message_type().unwrap(),
            MessageType::SyncBlockRequest
        );
        assert_eq!(h.service.state(), SyncState::Syncing);
    }

    #[tokio::test]
    async fn test_invalid_block_pins_cursor_without_commit() {
        let genesis = Block::genesis(1);
        let h = harness(SyncConfig::for_testing(), InMemoryBlockStore::with_genesis(genesis.clone()));
        h.checker
            .set(CheckResult::invalid(CheckCode::BadParent, "unknown parent"));
        let bad = genesis.child(10, Vec::new());

        let outcome = h
            .service
            .handle_block_response(Some(bad.clone()), &peer(1, 3))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            HandleOutcome::Invalid {
                hash: bad.hash(),
                reason: "unknown parent".to_string()
            }
        );
        assert_eq!(h.store.len(), 1);
        assert_eq!(h.executor.executed.load(Ordering::SeqCst), 0);
        assert!(h.sender.sent.lock().is_empty());
        assert!(h.service.current_sync_block().unwrap().same_block(&bad));

        // The same bad block again is a duplicate of the pinned cursor.
        let again = h
            .service
            .handle_block_response(Some(bad), &peer(2, 3))
            .await
            .unwrap();
        assert_eq!(again, HandleOutcome::Rejected(GuardRejection::Duplicate));
    }

    #[tokio::test]
    async fn test_newer_block_supersedes_rejected_cursor() {
        let genesis = Block::genesis(1);
        let h = harness(SyncConfig::for_testing(), InMemoryBlockStore::with_genesis(genesis.clone()));
        h.checker.set(CheckResult::invalid(CheckCode::Invalid, "bad"));
        h.service
            .handle_block_response(Some(genesis.child(10, Vec::new())), &peer(1, 3))
            .await
            .unwrap();

        h.checker.set(CheckResult::ok());
        let good = genesis.child(20, Vec::new());
        let outcome = h
            .service
            .handle_block_response(Some(good), &peer(2, 3))
            .await
            .unwrap();
        assert!(outcome.is_committed());
    }

    #[tokio::test]
    async fn test_stale_against_tip_rejected() {
        let genesis = Block::genesis(1_000);
        let h = harness(SyncConfig::for_testing(), InMemoryBlockStore::with_genesis(genesis.clone()));

        let outcome = h
            .service
            .handle_block_response(Some(genesis.child(500, Vec::new())), &peer(1, 3))
            .await
            .unwrap();

        assert_eq!(outcome, HandleOutcome::Rejected(GuardRejection::StaleAgainstTip));
        assert!(h.service.current_sync_block().is_none());
    }

    #[tokio::test]
    async fn test_tip_votes_reach_quorum() {
        let h = harness(SyncConfig::for_testing(), InMemoryBlockStore::with_genesis(Block::genesis(1)));

        let first = h.service.handle_block_response(None, &peer(1, 3)).await.unwrap();
        assert!(matches!(
            first,
            HandleOutcome::TipReported(RoundStatus::Pending { votes: 1, threshold: 2, .. })
        ));
        assert_eq!(h.service.state(), SyncState::Confirming);
        assert!(!h.service.is_synced());

        let second = h.service.handle_block_response(None, &peer(2, 3)).await.unwrap();
        assert_eq!(second, HandleOutcome::TipReported(RoundStatus::Agreed));
        assert!(h.status.is_synced());
        assert_eq!(h.service.state(), SyncState::Idle);
    }

    #[tokio::test]
    async fn test_empty_chain_tip_vote_ignored() {
        let h = harness(SyncConfig::for_testing(), InMemoryBlockStore::new());

        let outcome = h.service.handle_block_response(None, &peer(1, 1)).await.unwrap();
        assert!(matches!(
            outcome,
            HandleOutcome::TipReported(RoundStatus::Pending { votes: 0, .. })
        ));
        assert!(!h.service.is_synced());
    }

    #[tokio::test]
    async fn test_quorum_timeout_clears_flag() {
        let config = SyncConfig {
            quorum_timeout_ms: 30,
            ..SyncConfig::for_testing()
        };
        let h = harness(config, InMemoryBlockStore::with_genesis(Block::genesis(1)));
        h.status.set_synced(true);

        h.service.handle_block_response(None, &peer(1, 4)).await.unwrap();
        assert!(!h.service.check_quorum_timeout().is_terminal());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(
            h.service.check_quorum_timeout(),
            RoundStatus::Failed(FailReason::TimedOut)
        );
        assert!(!h.status.is_synced());
        assert_eq!(h.service.state(), SyncState::Idle);
    }

    #[tokio::test]
    async fn test_start_sync_from_empty_chain_requests_genesis() {
        let h = harness(SyncConfig::for_testing(), InMemoryBlockStore::new());

        let round = h.service.start_sync().unwrap();

        assert_eq!(round, 1);
        assert_eq!(h.sender.requested_after(), vec![ZERO_HASH]);
    }

    #[tokio::test]
    async fn test_start_sync_releases_failed_block() {
        let genesis = Block::genesis(1);
        let h = harness(SyncConfig::for_testing(), InMemoryBlockStore::with_genesis(genesis.clone()));
        *h.executor.fail.lock() = true;
        let b1 = genesis.child(10, Vec::new());

        let result = h
            .service
            .handle_block_response(Some(b1.clone()), &peer(1, 3))
            .await;
        assert!(matches!(result, Err(SyncError::Execution { .. })));
        assert!(h.service.current_sync_block().is_some());

        h.service.start_sync().unwrap();
        assert!(h.service.current_sync_block().is_none());
        assert_eq!(h.sender.requested_after(), vec![b1.hash()]);
    }

    #[tokio::test]
    async fn test_start_sync_keeps_cursor_when_release_disabled() {
        let config = SyncConfig {
            release_rejected_on_retry: false,
            ..SyncConfig::for_testing()
        };
        let genesis = Block::genesis(1);
        let h = harness(config, InMemoryBlockStore::with_genesis(genesis.clone()));
        h.checker.set(CheckResult::invalid(CheckCode::Invalid, "bad"));
        h.service
            .handle_block_response(Some(genesis.child(10, Vec::new())), &peer(1, 3))
            .await
            .unwrap();

        h.service.start_sync().unwrap();
        assert!(h.service.current_sync_block().is_some());
    }

    #[tokio::test]
    async fn test_null_during_check_keeps_duplicate_out() {
        let genesis = Block::genesis(1);
        let checker = Arc::new(GatedChecker::default());
        let store = Arc::new(InMemoryBlockStore::with_genesis(genesis.clone()));
        let executor = Arc::new(CountingExecutor::default());
        let service = Arc::new(BlockSyncService::new(
            SyncConfig::for_testing(),
            checker.clone(),
            store.clone(),
            executor.clone(),
            Arc::new(RecordingSender::default()),
            Arc::new(AtomicSyncStatus::new()),
        ));
        let b1 = genesis.child(10, Vec::new());

        let first = tokio::spawn({
            let service = service.clone();
            let block = b1.clone();
            async move { service.handle_block_response(Some(block), &peer(1, 3)).await }
        });
        checker.entered.notified().await;

        let vote = service.handle_block_response(None, &peer(2, 3)).await.unwrap();
        assert!(matches!(vote, HandleOutcome::TipReported(RoundStatus::Pending { .. })));
        assert!(service.current_sync_block().is_none());

        let again = service
            .handle_block_response(Some(b1.clone()), &peer(3, 3))
            .await
            .unwrap();
        assert_eq!(again, HandleOutcome::Rejected(GuardRejection::Duplicate));

        checker.release.notify_one();
        let outcome = first.await.unwrap().unwrap();
        assert!(outcome.is_committed());
        assert_eq!(checker.calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.len(), 2);
        assert_eq!(executor.executed.load(Ordering::SeqCst), 1);
        assert!(!service.cursor.lock().is_rejected());
    }

    #[tokio::test]
    async fn test_tip_vote_after_commit_names_new_tip() {
        let genesis = Block::genesis(1);
        let h = harness(SyncConfig::for_testing(), InMemoryBlockStore::with_genesis(genesis.clone()));

        // Two of three peers vouch for genesis, then a block moves the tip.
        h.service.handle_block_response(None, &peer(1, 3)).await.unwrap();
        let b1 = genesis.child(10, Vec::new());
        h.service
            .handle_block_response(Some(b1.clone()), &peer(2, 3))
            .await
            .unwrap();

        // The earlier vote for genesis does not count toward b1.
        let vote = h.service.handle_block_response(None, &peer(3, 3)).await.unwrap();
        assert!(matches!(
            vote,
            HandleOutcome::TipReported(RoundStatus::Pending { votes: 1, .. })
        ));
        assert!(!h.status.is_synced());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_duplicates_commit_once() {
        let genesis = Block::genesis(1);
        let h = harness(SyncConfig::for_testing(), InMemoryBlockStore::with_genesis(genesis.clone()));
        let b1 = genesis.child(10, Vec::new());

        let mut handles = Vec::new();
        for n in 0..8u8 {
            let service = h.service.clone();
            let block = b1.clone();
            handles.push(tokio::spawn(async move {
                service
                    .handle_block_response(Some(block), &peer(n, 8))
                    .await
                    .unwrap()
            }));
        }

        let mut committed = 0;
        for handle in handles {
            if handle.await.unwrap().is_committed() {
                committed += 1;
            }
        }

        assert_eq!(committed, 1);
        assert_eq!(h.store.len(), 2);
        assert_eq!(h.executor.executed.load(Ordering::SeqCst), 1);
    }
}
