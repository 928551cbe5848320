//! Chain linkage checker.

use async_trait::async_trait;
use shared_types::{short_hash, Block, ZERO_HASH};
use std::sync::Arc;

use crate::domain::{CheckCode, CheckResult, SyncError};
use crate::ports::{BlockChecker, BlockStore};

/// Validates a block against the local tip.
///
/// Checks, in order: the block's hash and merkle root match its contents,
/// it extends the tip (or is a genesis block on an empty chain), its height
/// is tip + 1, and its timestamp is strictly later than the tip's.
pub struct ChainLinkChecker<S: BlockStore> {
    store: Arc<S>,
}

impl<S: BlockStore> ChainLinkChecker<S> {
    /// Checker reading the tip from `store`.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: BlockStore> BlockChecker for ChainLinkChecker<S> {
    async fn check_block(&self, block: &Block) -> Result<CheckResult, SyncError> {
        if !block.is_sealed() {
            return Ok(CheckResult::invalid(
                CheckCode::BadHash,
                "hash or merkle root does not match contents",
            ));
        }

        let Some(tip) = self.store.last_block()? else {
            if block.parent_hash() != ZERO_HASH || block.height() != 0 {
                return Ok(CheckResult::invalid(
                    CheckCode::BadParent,
                    "empty chain only accepts a genesis block",
                ));
            }
            return Ok(CheckResult::ok());
        };

        if block.parent_hash() != tip.hash() {
            return Ok(CheckResult::invalid(
                CheckCode::BadParent,
                format!(
                    "parent {} is not tip {}",
                    short_hash(&block.parent_hash()),
                    short_hash(&tip.hash())
                ),
            ));
        }
        if block.height() != tip.height() + 1 {
            return Ok(CheckResult::invalid(
                CheckCode::BadHeight,
                format!("height {} does not follow tip {}", block.height(), tip.height()),
            ));
        }
        if block.timestamp() <= tip.timestamp() {
            return Ok(CheckResult::invalid(
                CheckCode::BadTimestamp,
                format!(
                    "timestamp {} not after tip {}",
                    block.timestamp(),
                    tip.timestamp()
                ),
            ));
        }

        Ok(CheckResult::ok())
    }
}
