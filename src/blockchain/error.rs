use thiserror::Error;

use super::storage::StorageError;
use crate::transaction::TransactionError;
use crate::wallet::WalletError;

/// Errors produced by ledger operations. Each one aborts only the
/// operation that raised it; ledger state is left untouched.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("transaction signature is missing or invalid")]
    InvalidSignature,

    #[error("amount {0} is not a finite number")]
    InvalidAmount(f64),

    #[error("insufficient funds: {address} has {balance}, needs {requested}")]
    InsufficientFunds {
        address: String,
        balance: f64,
        requested: f64,
    },

    #[error("pending transaction #{position} is invalid, mining aborted")]
    InvalidPendingTransaction { position: usize },

    #[error("invalid key: {0}")]
    InvalidKey(#[from] WalletError),

    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error("block {index} is corrupt: {reason}")]
    ChainCorrupt { index: u64, reason: String },

    #[error("stale block: {0}")]
    StaleBlock(String),

    #[error("failed to persist chain: {0}")]
    Persistence(#[from] StorageError),
}
