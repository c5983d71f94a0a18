use actix_web::{HttpResponse, Responder, get, web};

use super::models::StatusResponse;
use crate::state::AppState;

#[get("/status/")]
pub async fn get_status(state: web::Data<AppState>) -> impl Responder {
    let window = state.config.difficulty_window;

    // Snapshot chain-derived numbers under one short read lock
    let (height, tip, cumulative, last_interval, avg_interval) = {
        let bc = state.blockchain.read().expect("rwlock poisoned");
        let chain = bc.chain.as_slice();
        let height = chain.len();

        let last_interval_secs = match chain {
            [.., older, newer] => Some((newer.timestamp - older.timestamp).max(0)),
            _ => None,
        };

        // average over the retune window
        let avg_secs = if window > 0 && height > window {
            let recent = &chain[height - window - 1..];
            let total: i64 = recent
                .windows(2)
                .map(|pair| (pair[1].timestamp - pair[0].timestamp).max(0))
                .sum();
            Some(total as f64 / window as f64)
        } else {
            None
        };

        (
            height,
            bc.last_block().map(|b| b.hash.clone()),
            bc.cumulative_difficulty(),
            last_interval_secs,
            avg_secs,
        )
    };

    let mempool_size = state.mempool.lock().expect("mutex poisoned").len();

    HttpResponse::Ok().json(StatusResponse {
        height,
        tip,
        difficulty: state.difficulty(),
        cumulative_difficulty: cumulative,
        target_block_time_secs: state.config.target_block_time.as_secs(),
        last_interval_secs: last_interval,
        avg_interval_secs: avg_interval,
        mempool_size,
        peers: state.peers.len(),
        shards: state.beacon.len(),
        light_client: state.config.light_client,
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}
