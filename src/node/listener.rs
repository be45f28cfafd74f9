use log::{debug, error, info};

use super::PeerAddress;
use crate::blockchain::Block;
use crate::transaction::Transaction;

/// Fire-and-forget notifications from a node. Every method defaults to a
/// log line, so a node without a custom listener still reports through
/// the `log` facade. Implementations must not block.
pub trait NodeListener: Send + Sync {
    fn on_start(&self, message: &str) {
        info!("NODE - {message}");
    }

    fn on_connect(&self, address: &PeerAddress) {
        info!("NODE - connected to {address}");
    }

    fn on_exception(&self, error: &dyn std::error::Error, context: &str) {
        error!("NODE - {context}: {error}");
    }

    fn on_transaction(&self, tx: &Transaction) {
        debug!("NODE - transaction {} ({} x{})", tx.txid(), tx.item, tx.quantity);
    }

    fn on_block(&self, block: &Block) {
        info!(
            "NODE - block #{} received ({} txs)",
            block.id,
            block.transactions().len()
        );
    }

    fn on_chain_synced(&self, length: usize, from: &PeerAddress) {
        info!("NODE - adopted {length}-block chain from {from}");
    }

    fn on_start_mining(&self, message: &str, difficulty: u32) {
        info!("NODE - start mining (difficulty {difficulty}) {message}");
    }

    fn on_stop_mining(&self, nonce: u64) {
        info!("NODE - mining stopped ({nonce})");
    }

    fn on_nonce_found(&self, nonce: u64) {
        info!("NODE - nonce found {nonce}");
    }
}

/// Listener that only logs.
pub struct LogListener;

impl NodeListener for LogListener {}
