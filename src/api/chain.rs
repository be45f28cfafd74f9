use actix_web::{HttpResponse, Responder, get, post, web};
use log::info;

use super::models::{AppState, ChainResponse, MineResponse, ValidateResponse};
use super::{blocking_error, node_error};

/// Get the full blockchain. The chain lock is taken on the blocking pool;
/// an adoption can hold it across disk writes.
#[get("/chain/")]
pub async fn get_chain(state: web::Data<AppState>) -> impl Responder {
    let node = state.node.clone();
    let body = web::block(move || {
        node.with_chain(|bc| {
            serde_json::to_vec(&ChainResponse {
                length: bc.len(),
                difficulty: bc.difficulty(),
                chain: &bc.chain,
            })
        })
    })
    .await;
    match body {
        Ok(Some(Ok(bytes))) => HttpResponse::Ok()
            .content_type("application/json")
            .body(bytes),
        Ok(Some(Err(e))) => blocking_error(e),
        Ok(None) => HttpResponse::NotFound().body("no local chain"),
        Err(e) => blocking_error(e),
    }
}

/// Validate the whole chain.
#[get("/validate/")]
pub async fn validate_chain(state: web::Data<AppState>) -> impl Responder {
    let node = state.node.clone();
    match web::block(move || node.with_chain(|bc| (bc.is_valid_chain(), bc.len()))).await {
        Ok(Some((valid, length))) => HttpResponse::Ok().json(ValidateResponse { valid, length }),
        Ok(None) => HttpResponse::NotFound().body("no local chain"),
        Err(e) => blocking_error(e),
    }
}

/// Mine the mempool into a new block and relay it to the peers.
/// Runs on the blocking pool: mining holds a worker thread until solved
/// or preempted by a network block.
#[post("/mine/")]
pub async fn mine_block(state: web::Data<AppState>) -> impl Responder {
    let node = state.node.clone();
    let block = match web::block(move || node.mine_block()).await {
        Ok(Ok(block)) => block,
        Ok(Err(e)) => return node_error(&e),
        Err(e) => return blocking_error(e),
    };

    let resp = MineResponse {
        mined_index: block.id,
        hash: block.hash_text().unwrap_or_default(),
        nonce: block.nonce,
        difficulty: block.difficulty,
        transactions: block.transactions().len(),
    };
    info!(
        "MINER - sealed block #{} (hash={}, nonce={})",
        resp.mined_index, resp.hash, resp.nonce
    );
    HttpResponse::Ok().json(resp)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::test::{TestRequest, call_service, init_service, read_body_json};
    use actix_web::{App, http::StatusCode, web};

    use crate::api::{AppState, init_routes};
    use crate::miner::{DEFAULT_MAX_ATTEMPTS, Miner};
    use crate::node::{LocalNetwork, PeerNode};
    use crate::settlement::SupplyLedger;

    fn state() -> (Arc<PeerNode>, web::Data<AppState>) {
        let network = LocalNetwork::new();
        let node = Arc::new(
            PeerNode::builder("api", network.clone())
                .miner(Miner::new(2, DEFAULT_MAX_ATTEMPTS))
                .build()
                .unwrap(),
        );
        network.register(&node);
        let state = web::Data::new(AppState {
            node: node.clone(),
            ledger: Arc::new(SupplyLedger::new()),
        });
        (node, state)
    }

    #[actix_web::test]
    async fn chain_reads_answer_from_the_blocking_pool() {
        let (node, state) = state();
        let app = init_service(App::new().app_data(state).configure(init_routes)).await;

        let req = TestRequest::get().uri("/api/v1/chain/").to_request();
        assert_eq!(call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
        let req = TestRequest::get().uri("/api/v1/node/chain/tip/").to_request();
        let body: serde_json::Value = read_body_json(call_service(&app, req).await).await;
        assert!(body["tip"].is_null());

        node.init_genesis(1, vec![]).unwrap();

        let req = TestRequest::get().uri("/api/v1/chain/").to_request();
        let body: serde_json::Value = read_body_json(call_service(&app, req).await).await;
        assert_eq!(body["length"], 1);
        let req = TestRequest::get().uri("/api/v1/validate/").to_request();
        let body: serde_json::Value = read_body_json(call_service(&app, req).await).await;
        assert_eq!(body["valid"], true);
        let req = TestRequest::get().uri("/api/v1/node/chain/tip/").to_request();
        let body: serde_json::Value = read_body_json(call_service(&app, req).await).await;
        assert_eq!(body["tip"], 0);
        let req = TestRequest::get().uri("/api/v1/stats/").to_request();
        let body: serde_json::Value = read_body_json(call_service(&app, req).await).await;
        assert_eq!(body["chain_length"], 1);
    }
}
