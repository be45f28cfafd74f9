//! Digest helpers shared by the Merkle tree, blocks and the miner.
//!
//! Every hash in the ledger is SHA-256. Its canonical text form is the
//! standard (padded) base-64 encoding of the 32 raw bytes, and the
//! proof-of-work difficulty counts leading `'0'` characters of that text.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use sha2::{Digest, Sha256};

/// A raw 32-byte SHA-256 digest.
pub type Hash = [u8; 32];

/// Previous-hash sentinel carried by the genesis block.
pub const ZERO_HASH: Hash = [0u8; 32];

pub fn sha256(data: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Hash several byte slices as if they were concatenated.
pub fn sha256_concat(parts: &[&[u8]]) -> Hash {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Canonical text encoding of a digest.
pub fn to_text(hash: &Hash) -> String {
    BASE64_STANDARD.encode(hash)
}

/// Base-64 of arbitrary bytes (used for header text).
pub fn encode(bytes: &[u8]) -> String {
    BASE64_STANDARD.encode(bytes)
}

/// Proof-of-work digest: `sha256(message ‖ decimal(nonce))`.
pub fn pow_hash(message: &str, nonce: u64) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(message.as_bytes());
    hasher.update(nonce.to_string().as_bytes());
    hasher.finalize().into()
}

/// Text form of [`pow_hash`].
pub fn pow_hash_text(message: &str, nonce: u64) -> String {
    to_text(&pow_hash(message, nonce))
}

/// True when `text` starts with `difficulty` zero characters.
pub fn meets_difficulty(text: &str, difficulty: u32) -> bool {
    let d = difficulty as usize;
    text.len() >= d && text.as_bytes()[..d].iter().all(|&c| c == b'0')
}
