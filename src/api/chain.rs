use actix_web::{HttpResponse, Responder, get, post, web};
use log::{debug, error};

use super::models::{
    AppState, ChainResponse, MineRequest, MineResponse, ValidateResponse, error_response,
};
use crate::blockchain::{Block, ChainError};

/// Get the full blockchain.
#[get("/chain/")]
pub async fn get_chain(state: web::Data<AppState>) -> impl Responder {
    let bc = state.ledger();
    HttpResponse::Ok().json(ChainResponse {
        length: bc.len(),
        difficulty: bc.difficulty(),
        mining_reward: bc.mining_reward(),
        chain: bc.chain().iter().map(Block::to_record).collect(),
    })
}

/// Validate the whole chain.
#[get("/validate/")]
pub async fn validate_chain(state: web::Data<AppState>) -> impl Responder {
    let bc = state.ledger();
    HttpResponse::Ok().json(ValidateResponse {
        valid: bc.is_chain_valid(),
        length: bc.len(),
    })
}

/// Mine the pending pool:
/// - Build the block + reward under the ledger lock
/// - Run PoW and miner signing on the blocking pool, lock released
/// - Re-take the lock to append, persist and clear the mined transactions
#[post("/mine/")]
pub async fn mine_block(state: web::Data<AppState>, req: web::Json<MineRequest>) -> impl Responder {
    let MineRequest { miner, private } = req.into_inner();

    let job = state.ledger().prepare_block(miner.trim());
    let mut job = match job {
        Ok(job) => job,
        Err(e) => return error_response(&e),
    };
    debug!(
        "MINER - mining block #{} ({} txs, difficulty {})",
        job.block().index,
        job.block().transactions.len(),
        job.difficulty()
    );

    let sealed = web::block(move || {
        job.seal(&private)?;
        Ok::<_, ChainError>(job)
    })
    .await;
    let job = match sealed {
        Ok(Ok(job)) => job,
        Ok(Err(e)) => return error_response(&e),
        Err(e) => {
            error!("MINER - worker failed: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    };

    let mut bc = state.ledger();
    match bc.commit_block(job) {
        Ok(block) => {
            debug!("MINER - block #{} appended", block.index);
            HttpResponse::Ok().json(MineResponse {
                message: "block mined".into(),
                block: block.to_record(),
            })
        }
        Err(e) => error_response(&e),
    }
}
