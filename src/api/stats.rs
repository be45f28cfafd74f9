use actix_web::{HttpResponse, Responder, get, web};
use serde::Serialize;

use super::blocking_error;
use super::models::AppState;
use crate::node::NodeStats;

#[derive(Serialize)]
struct StatsResponse {
    #[serde(flatten)]
    node: NodeStats,
    winner: bool,
    settled_blocks: usize,
}

#[get("/stats/")]
pub async fn get_stats(state: web::Data<AppState>) -> impl Responder {
    let node = state.node.clone();
    match web::block(move || node.stats()).await {
        Ok(stats) => HttpResponse::Ok().json(StatsResponse {
            node: stats,
            winner: state.node.is_winner(),
            settled_blocks: state.ledger.applied_blocks(),
        }),
        Err(e) => blocking_error(e),
    }
}
