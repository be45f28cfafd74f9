//! Raw mining service: peers may hand this node an arbitrary message to
//! search a nonce for, stop it, and read back the last result.

use actix_web::{HttpResponse, Responder, get, post, web};
use log::debug;

use super::blocking_error;
use super::models::{AppState, MineMessageRequest, MiningStatusResponse, NonceResponse, StopRequest};
use crate::blockchain::DIFF_MAX;

#[post("/mining/")]
pub async fn mine(state: web::Data<AppState>, body: web::Json<MineMessageRequest>) -> impl Responder {
    let req = body.into_inner();
    if req.difficulty > DIFF_MAX {
        return HttpResponse::BadRequest().body(format!("difficulty must be <= {DIFF_MAX}"));
    }
    let node = state.node.clone();
    match web::block(move || node.mine(&req.message, req.difficulty)).await {
        Ok(nonce) => {
            debug!("MINER - remote request finished: {nonce:?}");
            HttpResponse::Ok().json(NonceResponse { nonce })
        }
        Err(e) => blocking_error(e),
    }
}

#[post("/mining/stop/")]
pub async fn stop_mining(state: web::Data<AppState>, body: web::Json<StopRequest>) -> impl Responder {
    state.node.stop_mining(body.nonce);
    HttpResponse::Ok().json(MiningStatusResponse {
        mining: state.node.is_mining(),
        winner: state.node.is_winner(),
        nonce: state.node.nonce(),
        hash: state.node.hash(),
    })
}

#[get("/mining/")]
pub async fn mining_status(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(MiningStatusResponse {
        mining: state.node.is_mining(),
        winner: state.node.is_winner(),
        nonce: state.node.nonce(),
        hash: state.node.hash(),
    })
}
