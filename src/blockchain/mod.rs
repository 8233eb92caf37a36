pub mod block;
pub mod error;
pub mod model;
pub mod storage;

pub use block::{Block, BlockRecord};
pub use error::ChainError;
pub use model::{Blockchain, MiningJob, validate_blocks};
pub use storage::{ChainStore, JsonFileStore, StorageError};

/// Default Proof-of-Work difficulty (number of leading hex zeros).
pub const DEFAULT_DIFFICULTY: u32 = 4;

/// Reward paid by `SYSTEM` to the miner of each block.
pub const DEFAULT_MINING_REWARD: f64 = 100.0;

/// Highest difficulty accepted from configuration.
pub const DIFF_MAX: u32 = 8;
