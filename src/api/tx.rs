use actix_web::{HttpResponse, Responder, get, post, web};
use log::{info, warn};

use super::models::{AppState, MempoolResponse, NewTxResponse, error_response};
use crate::transaction::{Transaction, TransactionRecord};

/// Submit a signed transaction into the pending pool.
#[post("/transactions/new/")]
pub async fn post_transaction(
    state: web::Data<AppState>,
    body: web::Json<TransactionRecord>,
) -> impl Responder {
    let tx = Transaction::from_record(body.into_inner());
    let (from, to, amount) = (tx.from_address.clone(), tx.to_address.clone(), tx.amount);

    let mut bc = state.ledger();
    match bc.create_transaction(tx) {
        Ok(()) => {
            info!("POST /transactions/new/ - {from} -> {to} ({amount}) accepted");
            HttpResponse::Created().json(NewTxResponse {
                message: "transaction added to the pending pool".into(),
                pending: bc.pending().len(),
            })
        }
        Err(e) => {
            warn!("POST /transactions/new/ - rejected: {e}");
            error_response(&e)
        }
    }
}

/// List the pending (unconfirmed) transactions.
#[get("/mempool/")]
pub async fn get_mempool(state: web::Data<AppState>) -> impl Responder {
    let bc = state.ledger();
    HttpResponse::Ok().json(MempoolResponse {
        size: bc.pending().len(),
        transactions: bc.pending().iter().map(Transaction::to_record).collect(),
    })
}
