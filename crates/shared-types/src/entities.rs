//! # Core Domain Entities
//!
//! ## Clusters
//!
//! - **Chain**: `Block`, `BlockHeader`, `Transaction`
//! - **Networking**: `NodeId`

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

// =============================================================================
// CLUSTER A: THE CHAIN
// =============================================================================

/// A 32-byte SHA-256 hash.
pub type Hash = [u8; 32];

/// A 20-byte account address.
pub type Address = [u8; 20];

/// The all-zero hash. Parent of the genesis block and the "from genesis"
/// marker in sync requests.
pub const ZERO_HASH: Hash = [0u8; 32];

/// Current block format version.
pub const BLOCK_VERSION: u16 = 1;

/// A value transfer between two accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Debited account.
    pub from: Address,
    /// Credited account.
    pub to: Address,
    /// Amount in base units.
    pub value: u64,
    /// Sender's nonce to prevent replay attacks.
    pub nonce: u64,
}

impl Transaction {
    /// Create a transfer.
    pub fn transfer(from: Address, to: Address, value: u64, nonce: u64) -> Self {
        Self {
            from,
            to,
            value,
            nonce,
        }
    }

    /// Compute the transaction hash.
    pub fn hash(&self) -> Hash {
        let mut hasher = Sha256::new();
        hasher.update(self.from);
        hasher.update(self.to);
        hasher.update(self.value.to_le_bytes());
        hasher.update(self.nonce.to_le_bytes());
        hasher.finalize().into()
    }
}

/// The header of a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Protocol version for this block.
    pub version: u16,
    /// Block height in the chain.
    pub height: u64,
    /// Hash of the parent block (creates the chain linkage).
    pub parent_hash: Hash,
    /// Root over all transaction hashes in the block.
    pub merkle_root: Hash,
    /// Unix timestamp (milliseconds) when the block was produced.
    pub timestamp: u64,
    /// Hash of this header, see [`BlockHeader::compute_hash`].
    pub hash: Hash,
}

impl BlockHeader {
    /// Hash over every header field except `hash` itself.
    pub fn compute_hash(&self) -> Hash {
        let mut hasher = Sha256::new();
        hasher.update(self.version.to_le_bytes());
        hasher.update(self.height.to_le_bytes());
        hasher.update(self.parent_hash);
        hasher.update(self.merkle_root);
        hasher.update(self.timestamp.to_le_bytes());
        hasher.finalize().into()
    }
}

/// A block: header plus transaction body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// The block header.
    pub header: BlockHeader,
    /// Transactions carried by this block.
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Build a block and seal its merkle root and hash.
    pub fn new(
        height: u64,
        parent_hash: Hash,
        timestamp: u64,
        transactions: Vec<Transaction>,
    ) -> Self {
        let mut header = BlockHeader {
            version: BLOCK_VERSION,
            height,
            parent_hash,
            merkle_root: compute_merkle_root(&transactions),
            timestamp,
            hash: ZERO_HASH,
        };
        header.hash = header.compute_hash();
        Self {
            header,
            transactions,
        }
    }

    /// Genesis block: height 0, zero parent, no transactions.
    pub fn genesis(timestamp: u64) -> Self {
        Self::new(0, ZERO_HASH, timestamp, Vec::new())
    }

    /// Build the child of `self` at `timestamp`.
    pub fn child(&self, timestamp: u64, transactions: Vec<Transaction>) -> Self {
        Self::new(
            self.header.height + 1,
            self.header.hash,
            timestamp,
            transactions,
        )
    }

    /// Header hash; the block's identity.
    pub fn hash(&self) -> Hash {
        self.header.hash
    }

    /// Production time in Unix milliseconds.
    pub fn timestamp(&self) -> u64 {
        self.header.timestamp
    }

    /// Height in the chain; genesis is 0.
    pub fn height(&self) -> u64 {
        self.header.height
    }

    /// Hash of the parent block.
    pub fn parent_hash(&self) -> Hash {
        self.header.parent_hash
    }

    /// Identity for sync purposes is hash equality, not structural equality.
    pub fn same_block(&self, other: &Block) -> bool {
        self.header.hash == other.header.hash
    }

    /// True if the stored hash and merkle root match the block contents.
    pub fn is_sealed(&self) -> bool {
        self.header.hash == self.header.compute_hash()
            && self.header.merkle_root == compute_merkle_root(&self.transactions)
    }
}

/// Root over the ordered transaction hashes.
///
/// Pairwise SHA-256 reduction; an odd trailing node is hashed with itself.
/// An empty body yields [`ZERO_HASH`].
pub fn compute_merkle_root(transactions: &[Transaction]) -> Hash {
    if transactions.is_empty() {
        return ZERO_HASH;
    }

    let mut level: Vec<Hash> = transactions.iter().map(Transaction::hash).collect();
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| {
                let mut hasher = Sha256::new();
                hasher.update(pair[0]);
                hasher.update(pair.get(1).unwrap_or(&pair[0]));
                hasher.finalize().into()
            })
            .collect();
    }
    level[0]
}

/// Short hex rendering of a hash for log lines.
pub fn short_hash(hash: &Hash) -> String {
    hex::encode(&hash[..6])
}

// =============================================================================
// CLUSTER B: NETWORKING
// =============================================================================

/// Unique identifier for a peer connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct NodeId(pub [u8; 32]);

impl NodeId {
    /// Derive a stable identifier from a transport label such as a socket
    /// address.
    pub fn from_label(label: &str) -> Self {
        Self(Sha256::digest(label.as_bytes()).into())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..8]))
    }
}
