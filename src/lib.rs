//! Permissioned supply-chain ledger node: signed item transfers are mined
//! into proof-of-work blocks and replicated across a peer mesh.

pub mod api;
pub mod blockchain;
pub mod config;
pub mod crypto;
pub mod error;
pub mod merkle;
pub mod miner;
pub mod node;
pub mod settlement;
pub mod storage;
pub mod transaction;
pub mod wallet;
