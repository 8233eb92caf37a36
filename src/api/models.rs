use std::sync::{Mutex, MutexGuard};

use actix_web::HttpResponse;
use serde::{Deserialize, Serialize};

use crate::blockchain::{BlockRecord, Blockchain, ChainError};
use crate::transaction::TransactionRecord;

/// Shared application state. Chain and pending pool sit behind a
/// single lock.
pub struct AppState {
    pub blockchain: Mutex<Blockchain>,
}

impl AppState {
    pub fn new(blockchain: Blockchain) -> Self {
        Self {
            blockchain: Mutex::new(blockchain),
        }
    }

    pub fn ledger(&self) -> MutexGuard<'_, Blockchain> {
        self.blockchain.lock().expect("mutex poisoned")
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Map a ledger error onto an HTTP response.
pub fn error_response(err: &ChainError) -> HttpResponse {
    let body = ErrorResponse {
        error: err.to_string(),
    };
    match err {
        ChainError::StaleBlock(_) => HttpResponse::Conflict().json(body),
        ChainError::Persistence(_) | ChainError::ChainCorrupt { .. } => {
            HttpResponse::InternalServerError().json(body)
        }
        _ => HttpResponse::BadRequest().json(body),
    }
}

/* ---------- Chain API Models ---------- */

#[derive(Serialize)]
pub struct ChainResponse {
    pub length: usize,
    pub difficulty: u32,
    pub mining_reward: f64,
    pub chain: Vec<BlockRecord>,
}

#[derive(Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
    pub length: usize,
}

#[derive(Deserialize)]
pub struct MineRequest {
    /// Address credited with the mining reward
    pub miner: String,
    /// Miner's private key, used to sign the block
    pub private: String,
}

#[derive(Serialize)]
pub struct MineResponse {
    pub message: String,
    pub block: BlockRecord,
}

/* ---------- TX API Models ---------- */

#[derive(Serialize)]
pub struct NewTxResponse {
    pub message: String,
    pub pending: usize,
}

#[derive(Serialize)]
pub struct MempoolResponse {
    pub size: usize,
    pub transactions: Vec<TransactionRecord>,
}

#[derive(Serialize)]
pub struct BalanceResponse {
    pub address: String,
    pub balance: f64,
}
