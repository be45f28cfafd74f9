use actix_web::{HttpResponse, Responder, get, post, web};

use super::blocking_error;
use super::models::{AppState, IdentityRequest, IdentityResponse};

/// Register a name in this node's directory.
#[post("/identities/")]
pub async fn register_identity(
    state: web::Data<AppState>,
    body: web::Json<IdentityRequest>,
) -> impl Responder {
    if body.name.trim().is_empty() {
        return HttpResponse::BadRequest().body("name required");
    }
    state.node.register_identity(&body.name, &body.value);
    HttpResponse::Ok().json(IdentityResponse {
        name: body.name.clone(),
        value: Some(body.value.clone()),
    })
}

/// Resolve a name locally, then across the mesh.
#[get("/identities/{name}/")]
pub async fn find_identity(state: web::Data<AppState>, path: web::Path<(String,)>) -> impl Responder {
    let name = path.into_inner().0;
    let node = state.node.clone();
    let key = name.clone();
    match web::block(move || node.search(&key)).await {
        Ok(Some(value)) => HttpResponse::Ok().json(IdentityResponse {
            name,
            value: Some(value),
        }),
        Ok(None) => HttpResponse::NotFound().json(IdentityResponse { name, value: None }),
        Err(e) => blocking_error(e),
    }
}
