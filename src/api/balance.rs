use actix_web::{HttpResponse, Responder, get, web};

use super::models::BalanceResponse;
use crate::state::AppState;

#[get("/balance/{address}/")]
pub async fn get_balance(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let address = path.into_inner();
    let balance = state.ledger.lock().expect("mutex poisoned").balance(&address);
    HttpResponse::Ok().json(BalanceResponse { address, balance })
}
