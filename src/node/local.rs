//! In-process transport: nodes registered in one [`LocalNetwork`] call each
//! other directly. Individual addresses can be taken offline to simulate
//! unreachable peers.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, Weak};

use super::{Connector, PeerAddress, PeerNode, RemoteNode};
use crate::error::{NodeError, TransportError};
use crate::transaction::Transaction;

#[derive(Default)]
pub struct LocalNetwork {
    nodes: RwLock<HashMap<PeerAddress, Weak<PeerNode>>>,
    offline: RwLock<HashSet<PeerAddress>>,
}

impl LocalNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(&self, node: &Arc<PeerNode>) {
        self.nodes
            .write()
            .expect("rwlock poisoned")
            .insert(node.address().clone(), Arc::downgrade(node));
    }

    pub fn set_offline(&self, address: &PeerAddress, offline: bool) {
        let mut set = self.offline.write().expect("rwlock poisoned");
        if offline {
            set.insert(address.clone());
        } else {
            set.remove(address);
        }
    }
}

impl Connector for LocalNetwork {
    fn connect(&self, address: &PeerAddress) -> Result<Arc<dyn RemoteNode>, TransportError> {
        if self.offline.read().expect("rwlock poisoned").contains(address) {
            return Err(TransportError::Unreachable(address.to_string()));
        }
        let node = self
            .nodes
            .read()
            .expect("rwlock poisoned")
            .get(address)
            .and_then(Weak::upgrade)
            .ok_or_else(|| TransportError::Unreachable(address.to_string()))?;
        Ok(Arc::new(LocalPeer(node)))
    }
}

struct LocalPeer(Arc<PeerNode>);

impl LocalPeer {
    // Refusals surface the way an HTTP peer would report them.
    fn refused(&self, error: NodeError) -> TransportError {
        let status = match error {
            NodeError::Transport(_) | NodeError::Storage(_) => 500,
            _ => 400,
        };
        TransportError::Status {
            peer: self.0.address().to_string(),
            status,
        }
    }
}

impl RemoteNode for LocalPeer {
    fn address(&self) -> Result<PeerAddress, TransportError> {
        Ok(self.0.address().clone())
    }

    fn add_node(&self, peer: &PeerAddress) -> Result<(), TransportError> {
        self.0.add_node(peer).map_err(|e| self.refused(e))
    }

    fn network(&self) -> Result<Vec<PeerAddress>, TransportError> {
        Ok(self.0.peers())
    }

    fn find_remote(
        &self,
        key: &str,
        search_id: &str,
        ttl: u32,
    ) -> Result<Option<String>, TransportError> {
        Ok(self.0.find_remote(key, search_id, ttl))
    }

    fn chain_tip(&self) -> Result<Option<u64>, TransportError> {
        Ok(self.0.chain_tip())
    }

    fn chain_archive(&self) -> Result<Option<Vec<u8>>, TransportError> {
        self.0.chain_archive().map_err(|e| self.refused(e))
    }

    fn propagate_block(&self, block_bytes: &[u8]) -> Result<(), TransportError> {
        self.0
            .propagate_block(block_bytes)
            .map(|_| ())
            .map_err(|e| self.refused(e))
    }

    fn add_transaction(&self, tx: &Transaction) -> Result<(), TransportError> {
        self.0
            .add_transaction(tx.clone())
            .map(|_| ())
            .map_err(|e| self.refused(e))
    }

    fn transactions(&self) -> Result<Vec<Transaction>, TransportError> {
        Ok(self.0.transactions())
    }

    fn mine(&self, message: &str, difficulty: u32) -> Result<Option<u64>, TransportError> {
        Ok(self.0.mine(message, difficulty))
    }

    fn stop_mining(&self, nonce: u64) -> Result<(), TransportError> {
        self.0.stop_mining(nonce);
        Ok(())
    }

    fn is_mining(&self) -> Result<bool, TransportError> {
        Ok(self.0.is_mining())
    }

    fn is_winner(&self) -> Result<bool, TransportError> {
        Ok(self.0.is_winner())
    }

    fn nonce(&self) -> Result<Option<u64>, TransportError> {
        Ok(self.0.nonce())
    }

    fn hash(&self) -> Result<Option<String>, TransportError> {
        Ok(self.0.hash())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_and_dropped_nodes_are_unreachable() {
        let network = LocalNetwork::new();
        let node = Arc::new(PeerNode::builder("a", network.clone()).build().unwrap());
        network.register(&node);
        let addr = PeerAddress::from("a");

        assert_eq!(network.connect(&addr).unwrap().address().unwrap(), addr);

        network.set_offline(&addr, true);
        assert!(matches!(
            network.connect(&addr),
            Err(TransportError::Unreachable(_))
        ));
        network.set_offline(&addr, false);
        assert!(network.connect(&addr).is_ok());

        drop(node);
        assert!(network.connect(&addr).is_err());
        assert!(network.connect(&PeerAddress::from("nobody")).is_err());
    }
}
