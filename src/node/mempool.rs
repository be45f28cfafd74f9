use std::collections::HashSet;
use std::sync::Mutex;

use crate::transaction::Transaction;

/// Pending transactions, deduplicated by signature, in arrival order.
#[derive(Default)]
pub struct Mempool {
    txs: Mutex<Vec<Transaction>>,
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when a transaction with the same signature is present.
    pub fn insert(&self, tx: Transaction) -> bool {
        let mut txs = self.txs.lock().expect("mutex poisoned");
        if txs.iter().any(|t| t.signature == tx.signature) {
            return false;
        }
        txs.push(tx);
        true
    }

    pub fn contains(&self, signature: &str) -> bool {
        let txs = self.txs.lock().expect("mutex poisoned");
        txs.iter().any(|t| t.signature == signature)
    }

    pub fn snapshot(&self) -> Vec<Transaction> {
        self.txs.lock().expect("mutex poisoned").clone()
    }

    /// Drop every pending transaction whose signature appears in `settled`.
    pub fn remove_settled(&self, settled: &[Transaction]) -> usize {
        let signatures: HashSet<&str> = settled.iter().map(|t| t.signature.as_str()).collect();
        let mut txs = self.txs.lock().expect("mutex poisoned");
        let before = txs.len();
        txs.retain(|t| !signatures.contains(t.signature.as_str()));
        before - txs.len()
    }

    pub fn len(&self) -> usize {
        self.txs.lock().expect("mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
