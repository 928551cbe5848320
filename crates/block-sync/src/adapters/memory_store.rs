//! In-memory block store.

use parking_lot::RwLock;
use shared_types::{short_hash, Block, Hash, ZERO_HASH};
use std::collections::HashMap;

use crate::domain::SyncError;
use crate::ports::BlockStore;

#[derive(Default)]
struct ChainIndex {
    blocks: HashMap<Hash, Block>,
    /// parent hash -> first child stored under it
    children: HashMap<Hash, Hash>,
    tip: Option<Hash>,
}

/// In-memory block store.
///
/// Append-like: the most recently added block is the tip. A block is only
/// accepted once its parent is stored, except a root whose parent is the
/// zero hash.
#[derive(Default)]
pub struct InMemoryBlockStore {
    inner: RwLock<ChainIndex>,
}

impl InMemoryBlockStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store holding only `genesis`.
    pub fn with_genesis(genesis: Block) -> Self {
        let mut index = ChainIndex::default();
        let hash = genesis.hash();
        index.children.insert(genesis.parent_hash(), hash);
        index.blocks.insert(hash, genesis);
        index.tip = Some(hash);
        Self {
            inner: RwLock::new(index),
        }
    }

    /// Number of stored blocks.
    pub fn len(&self) -> usize {
        self.inner.read().blocks.len()
    }

    /// True if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&self, block: Block) -> Result<(), SyncError> {
        let mut index = self.inner.write();
        let hash = block.hash();
        if index.blocks.contains_key(&hash) {
            return Err(SyncError::DuplicateBlock(short_hash(&hash)));
        }
        let parent = block.parent_hash();
        if parent != ZERO_HASH && !index.blocks.contains_key(&parent) {
            return Err(SyncError::Storage(format!(
                "parent {} of block {} is not stored",
                short_hash(&parent),
                short_hash(&hash)
            )));
        }
        index.children.entry(parent).or_insert(hash);
        index.blocks.insert(hash, block);
        index.tip = Some(hash);
        Ok(())
    }
}

impl BlockStore for InMemoryBlockStore {
    fn last_block(&self) -> Result<Option<Block>, SyncError> {
        let index = self.inner.read();
        Ok(index.tip.and_then(|h| index.blocks.get(&h).cloned()))
    }

    fn add_block(&self, block: Block) -> Result<(), SyncError> {
        self.insert(block)
    }

    fn get_block_after(&self, parent: &Hash) -> Result<Option<Block>, SyncError> {
        let index = self.inner.read();
        Ok(index
            .children
            .get(parent)
            .and_then(|child| index.blocks.get(child).cloned()))
    }
}
