use actix_web::{HttpResponse, Responder, get, post, web};
use log::{info, warn};

use super::ApiError;
use super::models::{
    ChainResponse, DifficultyResponse, MineResponse, PruneRequest, PruneResponse,
    SetDifficultyRequest, SubBlockRequest, ValidateResponse,
};
use crate::blockchain::prune::is_valid_archive_label;
use crate::blockchain::{Payloads, cumulative_difficulty};
use crate::p2p::{self, Message};
use crate::state::AppState;

/// Get the full blockchain.
#[get("/chain/")]
pub async fn get_chain(state: web::Data<AppState>) -> impl Responder {
    let bc = state.blockchain.read().expect("rwlock poisoned");
    HttpResponse::Ok().json(ChainResponse {
        length: bc.len(),
        difficulty: state.difficulty(),
        cumulative_difficulty: bc.cumulative_difficulty(),
        chain: &bc.chain,
    })
}

/// Light headers for every block held.
#[get("/headers/")]
pub async fn get_headers(state: web::Data<AppState>) -> impl Responder {
    let bc = state.blockchain.read().expect("rwlock poisoned");
    HttpResponse::Ok().json(bc.headers())
}

#[get("/blocks/latest/")]
pub async fn get_latest_block(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let bc = state.blockchain.read().expect("rwlock poisoned");
    let tip = bc
        .last_block()
        .ok_or_else(|| ApiError::NotFound("chain is empty".into()))?;
    Ok(HttpResponse::Ok().json(tip))
}

#[get("/blocks/{hash}/")]
pub async fn get_block(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let bc = state.blockchain.read().expect("rwlock poisoned");
    Ok(HttpResponse::Ok().json(bc.find_by_hash(&path)?))
}

#[get("/blocks/{hash}/sub_blocks/")]
pub async fn get_sub_blocks(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let bc = state.blockchain.read().expect("rwlock poisoned");
    Ok(HttpResponse::Ok().json(bc.sub_blocks(&path)?))
}

/// Attach a mined sub-block to the block at `parent_index`; returns the parent.
#[post("/sub_blocks/")]
pub async fn post_sub_block(
    state: web::Data<AppState>,
    body: web::Json<SubBlockRequest>,
) -> Result<HttpResponse, ApiError> {
    let category = body.category.trim();
    if category.is_empty() {
        return Err(ApiError::BadRequest("category required".into()));
    }
    let payloads = Payloads::new(&body.text_data, &body.audio_data, &body.video_data);
    let parent = state.append_sub_block(body.parent_index, &payloads, category)?;
    Ok(HttpResponse::Ok().json(parent))
}

/// Validate the chain held in memory.
#[get("/validate/")]
pub async fn validate_chain(state: web::Data<AppState>) -> impl Responder {
    let bc = state.blockchain.read().expect("rwlock poisoned");
    HttpResponse::Ok().json(ValidateResponse {
        valid: bc.is_valid(),
        length: bc.len(),
        cumulative_difficulty: cumulative_difficulty(&bc.chain),
    })
}

/// Mine a block from the current pool and announce it to peers.
#[post("/mine/")]
pub async fn mine_block(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let job = state.clone();
    let block = web::block(move || job.mine_next_block()).await??;

    match Message::new_block(&block) {
        Ok(msg) => p2p::broadcast(&state.peers.snapshot(), &msg),
        Err(e) => warn!("MINER - could not announce block #{}: {e}", block.index),
    }

    Ok(HttpResponse::Ok().json(MineResponse {
        mined_index: block.index,
        hash: block.hash.clone(),
        nonce: block.nonce,
        difficulty: block.difficulty,
        transactions: block.transactions.len(),
    }))
}

/// Get current PoW difficulty.
#[get("/difficulty/")]
pub async fn get_difficulty(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(DifficultyResponse {
        difficulty: state.difficulty(),
    })
}

/// Override PoW difficulty until the next retune (affects future blocks only).
#[post("/difficulty/")]
pub async fn set_difficulty(
    state: web::Data<AppState>,
    body: web::Json<SetDifficultyRequest>,
) -> Result<HttpResponse, ApiError> {
    if body.difficulty == 0 || body.difficulty > 6 {
        return Err(ApiError::BadRequest(
            "difficulty must be between 1 and 6 in dev mode".into(),
        ));
    }
    state.set_difficulty(body.difficulty);
    info!("POST /difficulty/ - set to {}", body.difficulty);
    Ok(HttpResponse::Ok().json(DifficultyResponse {
        difficulty: state.difficulty(),
    }))
}

/// Archive all but the newest `retain_count` blocks.
#[post("/prune/")]
pub async fn prune_chain(
    state: web::Data<AppState>,
    body: web::Json<PruneRequest>,
) -> Result<HttpResponse, ApiError> {
    if body.retain_count == 0 {
        return Err(ApiError::BadRequest("retain_count must be > 0".into()));
    }
    if !is_valid_archive_label(&body.label) {
        return Err(ApiError::BadRequest(format!("invalid label {:?}", body.label)));
    }
    let archived = state.prune(body.retain_count, &body.label)?;
    Ok(HttpResponse::Ok().json(PruneResponse {
        archived,
        length: state.chain_len(),
    }))
}
