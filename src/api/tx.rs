use actix_web::{HttpResponse, Responder, get, post, web};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::models::{AppState, TxResponse};
use super::{blocking_error, node_error};
use crate::transaction::Transaction;

#[derive(Deserialize)]
pub struct NewTxRequest {
    pub secret_key: String,
    pub receiver: String,
    pub item: String,
    pub quantity: u64,
}

#[derive(Serialize)]
pub struct MempoolResponse {
    pub size: usize,
    pub transactions: Vec<String>, // txids for brevity
}

/// DEV: sign a transfer with the given key and submit it to this node,
/// which forwards it to its peers.
#[post("/tx/")]
pub async fn post_transaction(
    state: web::Data<AppState>,
    body: web::Json<NewTxRequest>,
) -> impl Responder {
    let t0 = Instant::now();
    let body = body.into_inner();
    let tx = match Transaction::signed(&body.secret_key, &body.receiver, &body.item, body.quantity)
    {
        Ok(tx) => tx,
        Err(e) => {
            warn!("POST /tx/ - rejected: {e}");
            return HttpResponse::BadRequest().body(e.to_string());
        }
    };
    let txid = tx.txid();

    let node = state.node.clone();
    let accepted = match web::block(move || node.add_transaction(tx)).await {
        Ok(Ok(accepted)) => accepted,
        Ok(Err(e)) => {
            warn!("POST /tx/ - rejected {txid}: {e}");
            return node_error(&e);
        }
        Err(e) => return blocking_error(e),
    };

    debug!("POST /tx/ - {txid} accepted={accepted} in {:?}", t0.elapsed());
    HttpResponse::Ok().json(TxResponse { txid, accepted })
}

/// Pending transactions summary.
#[get("/mempool/")]
pub async fn get_mempool(state: web::Data<AppState>) -> impl Responder {
    let txs = state.node.transactions();
    HttpResponse::Ok().json(MempoolResponse {
        size: txs.len(),
        transactions: txs.iter().map(Transaction::txid).collect(),
    })
}
