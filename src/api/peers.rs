use actix_web::{HttpResponse, Responder, delete, get, post, web};
use log::info;

use super::ApiError;
use super::models::{PeerRequest, PeersResponse};
use crate::state::AppState;

fn peers_response(state: &AppState) -> PeersResponse {
    PeersResponse {
        self_address: state.peers.self_address().to_string(),
        peers: state.peers.snapshot(),
    }
}

#[get("/peers/")]
pub async fn list_peers(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(peers_response(&state))
}

#[post("/peers/")]
pub async fn add_peer(
    state: web::Data<AppState>,
    body: web::Json<PeerRequest>,
) -> Result<HttpResponse, ApiError> {
    let address = body.address.trim();
    if address.is_empty() {
        return Err(ApiError::BadRequest("address required".into()));
    }
    if address == state.peers.self_address() {
        return Err(ApiError::BadRequest("cannot peer with self".into()));
    }
    if state.peers.add(address) {
        info!("P2P - peer {address} added via API");
    }
    Ok(HttpResponse::Ok().json(peers_response(&state)))
}

#[delete("/peers/{address}/")]
pub async fn remove_peer(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    if !state.peers.remove(&path) {
        return Err(ApiError::NotFound(format!("unknown peer {path}")));
    }
    info!("P2P - peer {path} removed via API");
    Ok(HttpResponse::Ok().json(peers_response(&state)))
}
