mod balance;
mod chain;
mod consensus;
mod contract;
mod health;
pub mod models;
mod peers;
mod stats;
mod tx;
mod wallet;

use actix_web::http::StatusCode;
use actix_web::web::{self, ServiceConfig};
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

use crate::blockchain::ChainError;
use crate::contract::ContractError;
use crate::state::{MineError, SubmitError};

/// Core failures as seen by HTTP clients.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Internal(String),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).body(self.to_string())
    }
}

impl From<ChainError> for ApiError {
    fn from(e: ChainError) -> Self {
        match e {
            ChainError::ParentOutOfRange { .. } | ChainError::InvalidLabel(_) => {
                ApiError::BadRequest(e.to_string())
            }
            ChainError::BlockNotFound(_) => ApiError::NotFound(e.to_string()),
            ChainError::Archive(_) | ChainError::ArchiveEncode(_) => {
                ApiError::Internal(e.to_string())
            }
        }
    }
}

impl From<SubmitError> for ApiError {
    fn from(e: SubmitError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl From<ContractError> for ApiError {
    fn from(e: ContractError) -> Self {
        match e {
            ContractError::NotFound(_) => ApiError::NotFound(e.to_string()),
            ContractError::AlreadyExists(_) => ApiError::Conflict(e.to_string()),
            ContractError::UnsupportedMethod(_)
            | ContractError::InvalidParam(_)
            | ContractError::NoRuntime(_) => ApiError::BadRequest(e.to_string()),
        }
    }
}

impl From<MineError> for ApiError {
    fn from(e: MineError) -> Self {
        ApiError::Conflict(e.to_string())
    }
}

impl From<actix_web::error::BlockingError> for ApiError {
    fn from(e: actix_web::error::BlockingError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

pub fn init_routes(cfg: &mut ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(health::health_check)
            .service(chain::get_chain)
            .service(chain::get_headers)
            .service(chain::get_latest_block)
            .service(chain::get_block)
            .service(chain::get_sub_blocks)
            .service(chain::post_sub_block)
            .service(chain::validate_chain)
            .service(chain::mine_block)
            .service(chain::get_difficulty)
            .service(chain::set_difficulty)
            .service(chain::prune_chain)
            .service(tx::post_faucet)
            .service(tx::post_transaction)
            .service(tx::get_mempool)
            .service(balance::get_balance)
            .service(contract::list_contracts)
            .service(contract::execute_contract)
            .service(contract::deploy_contract)
            .service(peers::list_peers)
            .service(peers::add_peer)
            .service(peers::remove_peer)
            .service(consensus::list_candidates)
            .service(consensus::propose)
            .service(consensus::vote)
            .service(consensus::finalize)
            .service(stats::get_status)
            .service(wallet::create_wallet),
    );
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::{App, test, web};
    use serde_json::{Value, json};

    use super::*;
    use crate::state::AppState;
    use crate::state::tests::test_state;
    use crate::transaction::Transaction;
    use crate::wallet::sign_transaction;

    macro_rules! app {
        ($state:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::from(Arc::clone(&$state)))
                    .configure(init_routes),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn chain_and_block_lookup() {
        let state: Arc<AppState> = Arc::new(test_state());
        let app = app!(state);
        let genesis = state.chain_snapshot()[0].clone();

        let req = test::TestRequest::get().uri("/api/v1/chain/").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["length"], 1);

        let uri = format!("/api/v1/blocks/{}/", genesis.hash);
        let req = test::TestRequest::get().uri(&uri).to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["hash"], genesis.hash.as_str());

        let req = test::TestRequest::get().uri("/api/v1/blocks/latest/").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["index"], 0);

        let req = test::TestRequest::get().uri("/api/v1/blocks/nope/").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::get().uri("/api/v1/health/").to_request();
        assert!(test::call_service(&app, req).await.status().is_success());
    }

    #[actix_web::test]
    async fn wallet_faucet_tx_and_mine() {
        let state: Arc<AppState> = Arc::new(test_state());
        let app = app!(state);

        let req = test::TestRequest::post().uri("/api/v1/wallet/new/").to_request();
        let wallet: Value = test::call_and_read_body_json(&app, req).await;
        let sk = wallet["private_key"].as_str().unwrap().to_string();
        let pk = wallet["public_key"].as_str().unwrap().to_string();

        let req = test::TestRequest::post()
            .uri("/api/v1/faucet/")
            .set_json(json!({"address": pk, "amount": 10.0}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["balance"], 10.0);

        let mut tx = Transaction::new(&pk, "Bob", 4.0, Some(1));
        sign_transaction(&mut tx, &sk).unwrap();
        let req = test::TestRequest::post()
            .uri("/api/v1/tx/")
            .set_json(&tx)
            .to_request();
        assert!(test::call_service(&app, req).await.status().is_success());

        let overdraft = {
            let mut t = Transaction::new(&pk, "Bob", 400.0, Some(2));
            sign_transaction(&mut t, &sk).unwrap();
            t
        };
        let req = test::TestRequest::post()
            .uri("/api/v1/tx/")
            .set_json(&overdraft)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post().uri("/api/v1/mine/").to_request();
        let mined: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(mined["mined_index"], 1);
        assert_eq!(mined["transactions"], 2);

        let req = test::TestRequest::get().uri("/api/v1/balance/Bob/").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["balance"], 4.0);

        let req = test::TestRequest::get().uri("/api/v1/mempool/").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["size"], 0);
    }

    #[actix_web::test]
    async fn prune_rejects_path_like_labels() {
        let state: Arc<AppState> = Arc::new(test_state());
        state.mine_next_block().unwrap();
        let app = app!(state);

        for label in ["../x", "nested/x", "..", ""] {
            let req = test::TestRequest::post()
                .uri("/api/v1/prune/")
                .set_json(json!({"retain_count": 1, "label": label}))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        }
        assert_eq!(state.chain_len(), 2);
    }

    #[actix_web::test]
    async fn contracts_endpoints() {
        let state: Arc<AppState> = Arc::new(test_state());
        let app = app!(state);

        let req = test::TestRequest::post()
            .uri("/api/v1/contracts/execute/")
            .set_json(json!({"name": "AdditionContract", "method": "add", "params": {"a": 10, "b": 15}}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["result"], 25.0);

        let req = test::TestRequest::post()
            .uri("/api/v1/contracts/deploy/")
            .set_json(json!({"name": "Blob", "code": "zz"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post()
            .uri("/api/v1/contracts/execute/")
            .set_json(json!({"name": "Missing", "method": "add"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn peers_and_consensus_endpoints() {
        let state: Arc<AppState> = Arc::new(test_state());
        let app = app!(state);

        let req = test::TestRequest::post()
            .uri("/api/v1/peers/")
            .set_json(json!({"address": "10.0.0.5:8000"}))
            .to_request();
        assert!(test::call_service(&app, req).await.status().is_success());
        assert_eq!(state.peers.snapshot(), vec!["10.0.0.5:8000"]);

        let req = test::TestRequest::delete()
            .uri("/api/v1/peers/10.0.0.5:8000/")
            .to_request();
        assert!(test::call_service(&app, req).await.status().is_success());
        assert!(state.peers.is_empty());

        let req = test::TestRequest::post().uri("/api/v1/consensus/propose/").to_request();
        let proposed: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(proposed["candidate_index"], 0);

        // nothing finalizes before votes
        let req = test::TestRequest::post().uri("/api/v1/consensus/finalize/").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        for validator in ["Miner1", "Validator1"] {
            let req = test::TestRequest::post()
                .uri("/api/v1/consensus/vote/")
                .set_json(json!({"candidate_index": 0, "validator": validator, "approve": true}))
                .to_request();
            let body: Value = test::call_and_read_body_json(&app, req).await;
            assert_eq!(body["accepted"], true);
        }

        let req = test::TestRequest::post().uri("/api/v1/consensus/finalize/").to_request();
        let block: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(block["hash"], proposed["hash"]);
        assert_eq!(state.chain_len(), 2);
    }
}
