//! Settlement of accepted blocks into per-identity supply inventories.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use log::{debug, warn};

use crate::blockchain::Block;
use crate::crypto::Hash;
use crate::error::SettlementError;

/// Applies the effects of an accepted block. Called for blocks that may
/// have been seen before, so implementations must be idempotent per block.
pub trait Settlement: Send + Sync {
    fn apply_block(&self, block: &Block) -> Result<(), SettlementError>;

    /// Forget every applied block. Called before a replacement chain is
    /// replayed from genesis.
    fn reset(&self) {}
}

/// Settlement that records nothing.
pub struct NoSettlement;

impl Settlement for NoSettlement {
    fn apply_block(&self, _block: &Block) -> Result<(), SettlementError> {
        Ok(())
    }
}

#[derive(Default)]
struct LedgerState {
    // identity -> item -> units
    inventories: HashMap<String, BTreeMap<String, i128>>,
    applied: HashSet<Hash>,
}

/// In-memory inventory ledger: each transaction moves `quantity` units of
/// `item` from sender to receiver. Transactions with a bad signature are
/// skipped and reported as a partial failure.
#[derive(Default)]
pub struct SupplyLedger {
    state: Mutex<LedgerState>,
}

impl SupplyLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance(&self, identity: &str, item: &str) -> i128 {
        let state = self.state.lock().expect("mutex poisoned");
        state
            .inventories
            .get(identity)
            .and_then(|inv| inv.get(item))
            .copied()
            .unwrap_or(0)
    }

    pub fn inventory(&self, identity: &str) -> BTreeMap<String, i128> {
        let state = self.state.lock().expect("mutex poisoned");
        state.inventories.get(identity).cloned().unwrap_or_default()
    }

    pub fn applied_blocks(&self) -> usize {
        self.state.lock().expect("mutex poisoned").applied.len()
    }
}

impl Settlement for SupplyLedger {
    fn apply_block(&self, block: &Block) -> Result<(), SettlementError> {
        let key = block.current_hash.unwrap_or(block.merkle_root);
        let mut state = self.state.lock().expect("mutex poisoned");
        if !state.applied.insert(key) {
            debug!("LEDGER - block #{} already settled", block.id);
            return Ok(());
        }

        let total = block.transactions().len();
        let mut failed = 0;
        for tx in block.transactions() {
            if let Err(e) = tx.verify() {
                warn!("LEDGER - skipping tx {}: {}", tx.txid(), e);
                failed += 1;
                continue;
            }
            let quantity = i128::from(tx.quantity);
            *state
                .inventories
                .entry(tx.sender.clone())
                .or_default()
                .entry(tx.item.clone())
                .or_default() -= quantity;
            *state
                .inventories
                .entry(tx.receiver.clone())
                .or_default()
                .entry(tx.item.clone())
                .or_default() += quantity;
        }
        debug!(
            "LEDGER - block #{} settled ({} ok, {} failed)",
            block.id,
            total - failed,
            failed
        );

        if failed > 0 {
            return Err(SettlementError::Partial { failed, total });
        }
        Ok(())
    }

    fn reset(&self) {
        let mut state = self.state.lock().expect("mutex poisoned");
        debug!("LEDGER - reset after {} blocks", state.applied.len());
        *state = LedgerState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::ZERO_HASH;
    use crate::transaction::Transaction;
    use crate::wallet::generate_keypair_hex;

    fn mined_block(txs: Vec<Transaction>) -> Block {
        let mut b = Block::new(1, ZERO_HASH, 0, txs);
        b.set_nonce(0);
        b
    }

    #[test]
    fn moves_units_once_per_block() {
        let (sk, sender) = generate_keypair_hex();
        let (_, receiver) = generate_keypair_hex();
        let tx = Transaction::signed(&sk, &receiver, "vaccines", 12).unwrap();
        let block = mined_block(vec![tx]);

        let ledger = SupplyLedger::new();
        ledger.apply_block(&block).unwrap();
        ledger.apply_block(&block).unwrap();

        assert_eq!(ledger.balance(&receiver, "vaccines"), 12);
        assert_eq!(ledger.balance(&sender, "vaccines"), -12);
        assert_eq!(ledger.applied_blocks(), 1);
        assert_eq!(ledger.inventory(&receiver).len(), 1);
    }

    #[test]
    fn reset_forgets_applied_blocks() {
        let (sk, _) = generate_keypair_hex();
        let (_, receiver) = generate_keypair_hex();
        let tx = Transaction::signed(&sk, &receiver, "masks", 3).unwrap();
        let block = mined_block(vec![tx]);

        let ledger = SupplyLedger::new();
        ledger.apply_block(&block).unwrap();
        ledger.reset();
        assert_eq!(ledger.balance(&receiver, "masks"), 0);
        assert_eq!(ledger.applied_blocks(), 0);

        ledger.apply_block(&block).unwrap();
        assert_eq!(ledger.balance(&receiver, "masks"), 3);
    }

    #[test]
    fn forged_transaction_is_a_partial_failure() {
        let (sk, _) = generate_keypair_hex();
        let (_, receiver) = generate_keypair_hex();
        let good = Transaction::signed(&sk, &receiver, "gloves", 2).unwrap();
        let mut forged = Transaction::signed(&sk, &receiver, "gloves", 1).unwrap();
        forged.quantity = 1000;

        let ledger = SupplyLedger::new();
        let err = ledger.apply_block(&mined_block(vec![good, forged])).unwrap_err();
        assert!(matches!(err, SettlementError::Partial { failed: 1, total: 2 }));
        assert_eq!(ledger.balance(&receiver, "gloves"), 2);
    }
}
