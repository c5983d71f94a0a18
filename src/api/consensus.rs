use actix_web::{HttpResponse, Responder, get, post, web};
use log::info;

use super::ApiError;
use super::models::{CandidatesResponse, ProposeResponse, VoteRequest, VoteResponse};
use crate::state::AppState;

#[get("/consensus/candidates/")]
pub async fn list_candidates(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(CandidatesResponse {
        total_stake: state.consensus.total_stake(),
        candidates: state.consensus.candidates(),
    })
}

/// Mine a candidate on the current tip and put it up for stake votes
/// instead of appending it.
#[post("/consensus/propose/")]
pub async fn propose(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let job = state.clone();
    let block = web::block(move || {
        let mut block = job.prepare_candidate();
        let difficulty = block.difficulty;
        block.mine(difficulty);
        block
    })
    .await?;

    let hash = block.hash.clone();
    let candidate_index = state.consensus.propose_block(block);
    Ok(HttpResponse::Ok().json(ProposeResponse {
        candidate_index,
        hash,
    }))
}

#[post("/consensus/vote/")]
pub async fn vote(state: web::Data<AppState>, body: web::Json<VoteRequest>) -> impl Responder {
    let accepted = state
        .consensus
        .cast_vote(body.candidate_index, &body.validator, body.approve);
    HttpResponse::Ok().json(VoteResponse { accepted })
}

/// Commit the first candidate whose approvals reach the stake threshold.
#[post("/consensus/finalize/")]
pub async fn finalize(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let total_stake = state.consensus.total_stake();
    let block = state
        .consensus
        .finalize_block(total_stake)
        .ok_or_else(|| ApiError::NotFound("no candidate has enough votes".into()))?;
    let block = state.commit_mined_block(block)?;
    info!("CONSENSUS - block #{} finalized and committed", block.index);
    Ok(HttpResponse::Ok().json(block))
}
