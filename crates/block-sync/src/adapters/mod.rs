//! # Adapters Layer (Hexagonal Architecture)
//!
//! In-memory implementations of the outbound ports. The node runtime wires
//! these together; tests use them directly.

mod chain_checker;
mod channel_sender;
mod ledger;
mod memory_store;
mod status;

pub use chain_checker::ChainLinkChecker;
pub use channel_sender::{ChannelSender, Outbox};
pub use ledger::LedgerExecutor;
pub use memory_store::InMemoryBlockStore;
pub use status::AtomicSyncStatus;
