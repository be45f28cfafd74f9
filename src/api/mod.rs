mod balance;
mod chain;
mod health;
mod identities;
mod mining;
pub mod models;
mod peers;
mod stats;
mod tx;
mod wallet;

use actix_web::HttpResponse;
use actix_web::web::{self, ServiceConfig};

use crate::error::NodeError;
pub use models::AppState;
use models::ErrorResponse;

pub fn init_routes(cfg: &mut ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(health::health_check)
            .service(stats::get_stats)
            .service(chain::get_chain)
            .service(chain::validate_chain)
            .service(chain::mine_block)
            .service(balance::get_balance)
            .service(wallet::create_wallet)
            .service(tx::post_transaction)
            .service(tx::get_mempool)
            .service(identities::register_identity)
            .service(identities::find_identity)
            .service(
                web::scope("/node")
                    .service(peers::get_address)
                    .service(peers::get_peers)
                    .service(peers::add_peer)
                    .service(peers::find_remote)
                    .service(peers::chain_tip)
                    .service(peers::chain_archive)
                    .service(peers::propagate_block)
                    .service(peers::get_transactions)
                    .service(peers::add_transaction)
                    .service(mining::mine)
                    .service(mining::stop_mining)
                    .service(mining::mining_status),
            ),
    );
}

/// Map a node failure onto an HTTP status with a JSON body.
pub(crate) fn node_error(e: &NodeError) -> HttpResponse {
    let body = ErrorResponse {
        error: e.to_string(),
    };
    match e {
        NodeError::NoChain => HttpResponse::NotFound().json(body),
        NodeError::Mining(_) => HttpResponse::Conflict().json(body),
        NodeError::Transport(_) => HttpResponse::BadGateway().json(body),
        NodeError::Storage(_) => HttpResponse::InternalServerError().json(body),
        _ => HttpResponse::BadRequest().json(body),
    }
}

pub(crate) fn blocking_error(e: impl std::fmt::Display) -> HttpResponse {
    HttpResponse::InternalServerError().json(ErrorResponse {
        error: e.to_string(),
    })
}
