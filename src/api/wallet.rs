use actix_web::{HttpResponse, Responder, post};
use serde::Serialize;

use crate::wallet::generate_keypair_hex;

#[derive(Serialize)]
struct NewWalletResponse {
    private_key: String,
    /// Compressed public key; this is the identity used in transactions.
    public_key: String,
}

#[post("/wallet/new/")]
pub async fn create_wallet() -> impl Responder {
    let (sk, pk) = generate_keypair_hex();
    HttpResponse::Ok().json(NewWalletResponse {
        private_key: sk,
        public_key: pk,
    })
}
