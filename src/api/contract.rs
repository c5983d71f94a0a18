use actix_web::{HttpResponse, Responder, get, post, web};
use log::debug;

use super::ApiError;
use super::models::{
    DeployContractRequest, DeployContractResponse, ExecuteContractRequest,
    ExecuteContractResponse,
};
use crate::contract::ContractDefinition;
use crate::state::AppState;

#[get("/contracts/")]
pub async fn list_contracts(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(state.contracts.names())
}

#[post("/contracts/execute/")]
pub async fn execute_contract(
    state: web::Data<AppState>,
    body: web::Json<ExecuteContractRequest>,
) -> Result<HttpResponse, ApiError> {
    let req = body.into_inner();
    let result = state.contracts.execute(&req.name, &req.method, &req.params)?;
    debug!("CONTRACT - {}.{} -> {result}", req.name, req.method);
    Ok(HttpResponse::Ok().json(ExecuteContractResponse {
        name: req.name,
        method: req.method,
        result,
    }))
}

/// Store hex bytecode under a name. It cannot be executed yet.
#[post("/contracts/deploy/")]
pub async fn deploy_contract(
    state: web::Data<AppState>,
    body: web::Json<DeployContractRequest>,
) -> Result<HttpResponse, ApiError> {
    let req = body.into_inner();
    if req.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name required".into()));
    }
    let code = hex::decode(req.code.trim())
        .map_err(|e| ApiError::BadRequest(format!("code must be hex: {e}")))?;
    let size = code.len();
    state.contracts.deploy(ContractDefinition {
        name: req.name.clone(),
        code,
    })?;
    Ok(HttpResponse::Ok().json(DeployContractResponse {
        name: req.name,
        size,
    }))
}
