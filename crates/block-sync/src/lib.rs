//! # Block Sync
//!
//! Catch-up synchronisation for a node joining or rejoining the network.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! - Consume `SyncBlockResponse` packets from peers
//! - Reject duplicate and stale responses before touching state
//! - Validate, commit and execute accepted blocks, then ask the group for
//!   the next one
//! - When peers report "nothing after your tip", confirm the tip with a
//!   BFT quorum vote and publish the sync-complete flag
//!
//! ## Quorum Rule
//!
//! | Active peers (N) | Threshold T = (2N+1)/3 |
//! |------------------|------------------------|
//! | 1                | 1                      |
//! | 3                | 2                      |
//! | 4                | 3                      |
//! | 7                | 5                      |
//!
//! ## Module Structure
//!
//! ```text
//! block-sync/
//! ├── domain/          # SyncCursor guard, QuorumTracker, errors, value objects
//! ├── ports/           # BlockSyncApi (inbound) + collaborator traits (outbound)
//! ├── application/     # BlockSyncService, SyncRequestResponder
//! ├── adapters/        # In-memory store, chain checker, ledger executor, channels
//! └── config.rs        # SyncConfig
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

// Re-exports
pub use application::{BlockSyncService, SyncRequestResponder};
pub use config::SyncConfig;
pub use domain::{
    quorum_threshold, CheckCode, CheckResult, ConnectionContext, Equivalence, FailReason,
    GuardRejection, HandleOutcome, QuorumObserver, QuorumTracker, RoundOutcome, RoundStatus,
    SameHash, SyncCursor, SyncError, SyncState,
};
pub use ports::{
    BlockChecker, BlockExecutor, BlockStore, BlockSyncApi, PacketSender, SyncStatus,
};
