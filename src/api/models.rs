use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::blockchain::Block;
use crate::node::{BlockDisposition, PeerAddress, PeerNode};
use crate::settlement::SupplyLedger;

/// Shared application state: the local peer and the ledger it settles into.
pub struct AppState {
    pub node: Arc<PeerNode>,
    pub ledger: Arc<SupplyLedger>,
}

/* ---------- Chain API Models ---------- */

#[derive(Serialize)]
pub struct ChainResponse<'a> {
    pub length: usize,
    pub difficulty: u32,
    pub chain: &'a [Block],
}

#[derive(Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
    pub length: usize,
}

#[derive(Serialize)]
pub struct MineResponse {
    pub mined_index: u64,
    pub hash: String,
    pub nonce: u64,
    pub difficulty: u32,
    pub transactions: usize,
}

/* ---------- Ledger / Directory Models ---------- */

#[derive(Serialize)]
pub struct BalanceResponse {
    pub identity: String,
    pub inventory: BTreeMap<String, i128>,
}

#[derive(Serialize, Deserialize)]
pub struct IdentityRequest {
    pub name: String,
    pub value: String,
}

#[derive(Serialize, Deserialize)]
pub struct IdentityResponse {
    pub name: String,
    pub value: Option<String>,
}

/* ---------- Peer-to-peer Models ---------- */

#[derive(Serialize, Deserialize)]
pub struct AddressBody {
    pub address: PeerAddress,
}

#[derive(Serialize, Deserialize)]
pub struct SearchRequest {
    pub key: String,
    pub search_id: String,
    pub ttl: u32,
}

#[derive(Serialize, Deserialize)]
pub struct SearchResponse {
    pub value: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct TipResponse {
    pub tip: Option<u64>,
}

#[derive(Serialize)]
pub struct BlockResponse {
    pub disposition: BlockDisposition,
}

#[derive(Serialize, Deserialize)]
pub struct TxResponse {
    pub txid: String,
    pub accepted: bool,
}

#[derive(Serialize, Deserialize)]
pub struct MineMessageRequest {
    pub message: String,
    pub difficulty: u32,
}

#[derive(Serialize, Deserialize)]
pub struct NonceResponse {
    pub nonce: Option<u64>,
}

#[derive(Serialize, Deserialize)]
pub struct StopRequest {
    pub nonce: u64,
}

#[derive(Serialize, Deserialize)]
pub struct MiningStatusResponse {
    pub mining: bool,
    pub winner: bool,
    pub nonce: Option<u64>,
    pub hash: Option<String>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
