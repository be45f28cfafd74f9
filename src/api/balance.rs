use actix_web::{HttpResponse, Responder, get, web};

use super::models::{AppState, BalanceResponse};

/// Settled inventory of an identity (public key hex), per item.
#[get("/balance/{identity}/")]
pub async fn get_balance(state: web::Data<AppState>, path: web::Path<(String,)>) -> impl Responder {
    let identity = path.into_inner().0;
    let inventory = state.ledger.inventory(&identity);
    HttpResponse::Ok().json(BalanceResponse {
        identity,
        inventory,
    })
}
