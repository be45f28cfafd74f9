//! Peer-to-peer routes under `/api/v1/node`. These are what
//! [`crate::node::HttpPeer`] calls on the far side.

use actix_web::{HttpResponse, Responder, get, post, web};
use log::debug;

use super::models::{AddressBody, AppState, BlockResponse, SearchRequest, SearchResponse, TipResponse};
use super::{blocking_error, node_error};
use crate::transaction::Transaction;

#[get("/address/")]
pub async fn get_address(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(AddressBody {
        address: state.node.address().clone(),
    })
}

#[get("/peers/")]
pub async fn get_peers(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(state.node.peers())
}

#[post("/peers/")]
pub async fn add_peer(state: web::Data<AppState>, body: web::Json<AddressBody>) -> impl Responder {
    let node = state.node.clone();
    let peer = body.into_inner().address;
    match web::block(move || node.add_node(&peer)).await {
        Ok(Ok(())) => HttpResponse::Ok().json(state.node.peers()),
        Ok(Err(e)) => node_error(&e),
        Err(e) => blocking_error(e),
    }
}

#[post("/search/")]
pub async fn find_remote(
    state: web::Data<AppState>,
    body: web::Json<SearchRequest>,
) -> impl Responder {
    let node = state.node.clone();
    let req = body.into_inner();
    match web::block(move || node.find_remote(&req.key, &req.search_id, req.ttl)).await {
        Ok(value) => HttpResponse::Ok().json(SearchResponse { value }),
        Err(e) => blocking_error(e),
    }
}

#[get("/chain/tip/")]
pub async fn chain_tip(state: web::Data<AppState>) -> impl Responder {
    let node = state.node.clone();
    match web::block(move || node.chain_tip()).await {
        Ok(tip) => HttpResponse::Ok().json(TipResponse { tip }),
        Err(e) => blocking_error(e),
    }
}

/// Whole-chain payload; 404 when this node has no chain.
#[get("/chain/archive/")]
pub async fn chain_archive(state: web::Data<AppState>) -> impl Responder {
    let node = state.node.clone();
    match web::block(move || node.chain_archive()).await {
        Ok(Ok(Some(bytes))) => HttpResponse::Ok()
            .content_type("application/json")
            .body(bytes),
        Ok(Ok(None)) => HttpResponse::NotFound().finish(),
        Ok(Err(e)) => node_error(&e),
        Err(e) => blocking_error(e),
    }
}

/// Raw serialized block from a peer.
#[post("/blocks/")]
pub async fn propagate_block(state: web::Data<AppState>, body: web::Bytes) -> impl Responder {
    let node = state.node.clone();
    match web::block(move || node.propagate_block(&body)).await {
        Ok(Ok(disposition)) => {
            debug!("P2P - block {disposition:?}");
            HttpResponse::Ok().json(BlockResponse { disposition })
        }
        Ok(Err(e)) => node_error(&e),
        Err(e) => blocking_error(e),
    }
}

#[get("/tx/")]
pub async fn get_transactions(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(state.node.transactions())
}

#[post("/tx/")]
pub async fn add_transaction(
    state: web::Data<AppState>,
    body: web::Json<Transaction>,
) -> impl Responder {
    let node = state.node.clone();
    let tx = body.into_inner();
    match web::block(move || node.add_transaction(tx)).await {
        Ok(Ok(accepted)) => HttpResponse::Ok().json(accepted),
        Ok(Err(e)) => node_error(&e),
        Err(e) => blocking_error(e),
    }
}
