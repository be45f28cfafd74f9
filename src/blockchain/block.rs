use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::crypto::{Hash, ZERO_HASH, encode, meets_difficulty, pow_hash, to_text};
use crate::error::MiningError;
use crate::merkle::MerkleTree;
use crate::miner::{Miner, MiningOutcome};
use crate::transaction::Transaction;

/// A single block: header fields plus a Merkle tree over its transactions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub id: u64,
    pub timestamp: i64, // Unix milliseconds (UTC)
    pub previous_hash: Hash,
    pub merkle_root: Hash,
    pub difficulty: u32,
    pub nonce: u64,                 // Proof-of-Work nonce
    pub current_hash: Option<Hash>, // set together with the nonce
    pub data: MerkleTree<Transaction>,
}

impl Block {
    /// Create a new block (not mined yet). Call `mine()` to perform PoW.
    pub fn new(id: u64, previous_hash: Hash, difficulty: u32, transactions: Vec<Transaction>) -> Self {
        let data = MerkleTree::new(transactions);
        Self {
            id,
            timestamp: Utc::now().timestamp_millis(),
            previous_hash,
            merkle_root: data.root(),
            difficulty,
            nonce: 0,
            current_hash: None,
            data,
        }
    }

    /// Create the (unmined) genesis block.
    pub fn genesis(difficulty: u32, transactions: Vec<Transaction>) -> Self {
        Self::new(0, ZERO_HASH, difficulty, transactions)
    }

    /// id ‖ timestamp ‖ previous_hash ‖ merkle_root ‖ difficulty, big endian.
    /// Neither the nonce nor the body is part of it.
    pub fn header_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(8 + 8 + 32 + 32 + 4);
        bytes.extend_from_slice(&self.id.to_be_bytes());
        bytes.extend_from_slice(&self.timestamp.to_be_bytes());
        bytes.extend_from_slice(&self.previous_hash);
        bytes.extend_from_slice(&self.merkle_root);
        bytes.extend_from_slice(&self.difficulty.to_be_bytes());
        bytes
    }

    /// Base-64 header; this is the message handed to the miner.
    pub fn header_text(&self) -> String {
        encode(&self.header_bytes())
    }

    /// Perform Proof-of-Work, blocking until a nonce is found.
    pub fn mine(&mut self, miner: &Miner) -> Result<u64, MiningError> {
        match miner.solve(&self.header_text(), self.difficulty) {
            MiningOutcome::Solved(nonce) => {
                self.set_nonce(nonce);
                Ok(nonce)
            }
            MiningOutcome::Stopped(nonce) => Err(MiningError::Stopped(nonce)),
            MiningOutcome::Exhausted => Err(MiningError::Exhausted),
        }
    }

    pub fn set_nonce(&mut self, nonce: u64) {
        self.nonce = nonce;
        self.current_hash = Some(pow_hash(&self.header_text(), nonce));
    }

    /// Validate the cached hash: difficulty prefix, recomputation from
    /// header + nonce, and body against the Merkle root. Does NOT validate
    /// chain linkage.
    pub fn is_valid(&self) -> bool {
        let Some(hash) = self.current_hash else {
            return false;
        };
        if !meets_difficulty(&to_text(&hash), self.difficulty) {
            return false;
        }
        if pow_hash(&self.header_text(), self.nonce) != hash {
            return false;
        }
        self.data.root() == self.merkle_root
    }

    pub fn hash_text(&self) -> Option<String> {
        self.current_hash.as_ref().map(to_text)
    }

    pub fn transactions(&self) -> &[Transaction] {
        self.data.elements()
    }

    pub fn contains_signature(&self, signature: &str) -> bool {
        self.transactions().iter().any(|t| t.signature == signature)
    }
}
