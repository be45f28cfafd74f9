//! Error types, one enum per concern.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("key error: {0}")]
    Key(&'static str),
    #[error("missing signature")]
    MissingSignature,
    #[error("invalid signature")]
    BadSignature,
    #[error("quantity must be > 0")]
    ZeroQuantity,
}

#[derive(Debug, Error)]
pub enum MiningError {
    #[error("mining stopped externally (nonce {0})")]
    Stopped(u64),
    #[error("nonce search space exhausted")]
    Exhausted,
    #[error("a mining session is already running")]
    Busy,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage io: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage codec: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Rejections raised by [`crate::blockchain::Blockchain::add_block`].
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("chain mismatch: previous hash does not match the tip")]
    ChainMismatch,
    #[error("invalid block: proof of work or data check failed")]
    InvalidBlock,
    #[error("sequence error: expected block {expected}, got {got}")]
    Sequence { expected: u64, got: u64 },
    #[error("duplicate transaction {0}")]
    DuplicateTransaction(String),
    #[error("chain is empty")]
    Empty,
    #[error(transparent)]
    Mining(#[from] MiningError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// A peer could not be reached or answered outside the protocol.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("peer {0} unreachable")]
    Unreachable(String),
    #[error("peer {peer} answered {status}")]
    Status { peer: String, status: u16 },
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("settlement failed for {failed} of {total} transactions")]
    Partial { failed: usize, total: usize },
}

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("no local chain")]
    NoChain,
    #[error("undecodable payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error(transparent)]
    Transaction(#[from] TransactionError),
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error(transparent)]
    Mining(#[from] MiningError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("replayed transaction: already settled in the chain")]
    Replay,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}
