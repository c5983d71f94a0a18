use actix_web::{HttpResponse, Responder, get, post, web};
use log::{debug, info, warn};

use super::ApiError;
use super::models::{BalanceResponse, FaucetRequest, MempoolResponse, NewTxResponse};
use crate::state::AppState;
use crate::transaction::Transaction;

/// DEV Faucet: credit an address directly in the ledger, the way a block
/// reward would. Nothing is written to the chain.
#[post("/faucet/")]
pub async fn post_faucet(
    state: web::Data<AppState>,
    body: web::Json<FaucetRequest>,
) -> Result<HttpResponse, ApiError> {
    let address = body.address.trim();
    if address.is_empty() {
        return Err(ApiError::BadRequest("address required".into()));
    }
    if !(body.amount > 0.0) {
        return Err(ApiError::BadRequest("amount must be > 0".into()));
    }

    let balance = state.credit_faucet(address, body.amount);
    debug!("FAUCET - credited {} to {address}; balance now {balance}", body.amount);

    Ok(HttpResponse::Ok().json(BalanceResponse {
        address: address.to_string(),
        balance,
    }))
}

/// Submit a signed transaction into the mempool.
#[post("/tx/")]
pub async fn post_transaction(
    state: web::Data<AppState>,
    body: web::Json<Transaction>,
) -> Result<HttpResponse, ApiError> {
    let tx = body.into_inner();
    let hash = tx.hash();
    debug!(
        "POST /tx/ - received {hash}: {} -> {} ({})",
        tx.sender, tx.recipient, tx.amount
    );

    match state.submit_transaction(tx) {
        Ok(shard) => {
            info!("POST /tx/ - accepted {hash} (shard {shard})");
            Ok(HttpResponse::Ok().json(NewTxResponse { hash, shard }))
        }
        Err(e) => {
            warn!("POST /tx/ - rejected {hash}: {e}");
            Err(e.into())
        }
    }
}

/// List pooled transactions.
#[get("/mempool/")]
pub async fn get_mempool(state: web::Data<AppState>) -> impl Responder {
    let pool = state.mempool.lock().expect("mutex poisoned");
    HttpResponse::Ok().json(MempoolResponse {
        size: pool.len(),
        transactions: pool.transactions(),
    })
}
