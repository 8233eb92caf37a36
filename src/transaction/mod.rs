pub mod model;

pub use model::{SYSTEM_ADDRESS, Transaction, TransactionError, TransactionRecord};
