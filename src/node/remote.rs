//! The peer-facing contract and how peer addresses turn into callable handles.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::TransportError;
use crate::transaction::Transaction;

/// Opaque peer handle. Peers never own each other; an address is resolved
/// into a live [`RemoteNode`] through a [`Connector`] at call time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerAddress(String);

impl PeerAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerAddress {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for PeerAddress {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Synchronous calls a node exposes to its peers. Every call can fail with
/// a [`TransportError`]; callers treat that as "peer unreachable, skip".
pub trait RemoteNode: Send + Sync {
    fn address(&self) -> Result<PeerAddress, TransportError>;
    fn add_node(&self, peer: &PeerAddress) -> Result<(), TransportError>;
    fn network(&self) -> Result<Vec<PeerAddress>, TransportError>;
    fn find_remote(
        &self,
        key: &str,
        search_id: &str,
        ttl: u32,
    ) -> Result<Option<String>, TransportError>;
    fn chain_tip(&self) -> Result<Option<u64>, TransportError>;
    fn chain_archive(&self) -> Result<Option<Vec<u8>>, TransportError>;
    fn propagate_block(&self, block_bytes: &[u8]) -> Result<(), TransportError>;
    fn add_transaction(&self, tx: &Transaction) -> Result<(), TransportError>;
    fn transactions(&self) -> Result<Vec<Transaction>, TransportError>;
    fn mine(&self, message: &str, difficulty: u32) -> Result<Option<u64>, TransportError>;
    fn stop_mining(&self, nonce: u64) -> Result<(), TransportError>;
    fn is_mining(&self) -> Result<bool, TransportError>;
    fn is_winner(&self) -> Result<bool, TransportError>;
    fn nonce(&self) -> Result<Option<u64>, TransportError>;
    fn hash(&self) -> Result<Option<String>, TransportError>;
}

/// Resolves addresses into callable peers.
pub trait Connector: Send + Sync {
    fn connect(&self, address: &PeerAddress) -> Result<Arc<dyn RemoteNode>, TransportError>;
}
