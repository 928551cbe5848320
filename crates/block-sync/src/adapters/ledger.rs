//! Balance ledger executor.

use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::{short_hash, Address, Block};
use std::collections::HashMap;

use crate::domain::SyncError;
use crate::ports::BlockExecutor;

#[derive(Default)]
struct Ledger {
    balances: HashMap<Address, u64>,
    nonces: HashMap<Address, u64>,
    executed_blocks: u64,
}

/// Applies transfer transactions to an in-memory balance map.
///
/// A block applies all-or-nothing: any overdraft, overflow or nonce gap
/// leaves the ledger unchanged.
#[derive(Default)]
pub struct LedgerExecutor {
    inner: RwLock<Ledger>,
}

impl LedgerExecutor {
    /// Empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit `amount` to `account` outside of any block.
    pub fn with_balance(self, account: Address, amount: u64) -> Self {
        self.inner.write().balances.insert(account, amount);
        self
    }

    /// Balance of `account`.
    pub fn balance(&self, account: &Address) -> u64 {
        self.inner.read().balances.get(account).copied().unwrap_or(0)
    }

    /// Number of blocks applied so far.
    pub fn executed_blocks(&self) -> u64 {
        self.inner.read().executed_blocks
    }
}

#[async_trait]
impl BlockExecutor for LedgerExecutor {
    async fn execute(&self, block: &Block) -> Result<(), SyncError> {
        let fail = |reason: String| SyncError::Execution {
            hash: short_hash(&block.hash()),
            reason,
        };

        let mut ledger = self.inner.write();
        let mut balances = ledger.balances.clone();
        let mut nonces = ledger.nonces.clone();

        for (i, tx) in block.transactions.iter().enumerate() {
            let expected = nonces.get(&tx.from).copied().unwrap_or(0);
            if tx.nonce != expected {
                return Err(fail(format!(
                    "tx {}: nonce {} expected {}",
                    i, tx.nonce, expected
                )));
            }

            let from = balances.get(&tx.from).copied().unwrap_or(0);
            let debited = from
                .checked_sub(tx.value)
                .ok_or_else(|| fail(format!("tx {}: balance {} below {}", i, from, tx.value)))?;
            balances.insert(tx.from, debited);

            let to = balances.get(&tx.to).copied().unwrap_or(0);
            let credited = to
                .checked_add(tx.value)
                .ok_or_else(|| fail(format!("tx {}: balance overflow", i)))?;
            balances.insert(tx.to, credited);

            nonces.insert(tx.from, expected + 1);
        }

        ledger.balances = balances;
        ledger.nonces = nonces;
        ledger.executed_blocks += 1;
        Ok(())
    }
}
