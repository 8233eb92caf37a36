use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use log::debug;
use thiserror::Error;

use super::block::{Block, BlockRecord};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Durable home of the chain. The ledger saves the whole chain after
/// every mined block and loads it once on startup.
pub trait ChainStore: Send + fmt::Debug {
    /// `Ok(None)` when nothing has been persisted yet.
    fn load(&self) -> Result<Option<Vec<Block>>, StorageError>;

    fn save(&self, chain: &[Block]) -> Result<(), StorageError>;
}

/// Encode a chain as a JSON list of block records.
pub fn encode_chain(chain: &[Block]) -> Result<String, StorageError> {
    let records: Vec<BlockRecord> = chain.iter().map(Block::to_record).collect();
    Ok(serde_json::to_string_pretty(&records)?)
}

/// Decode a JSON list of block records. Stored hashes are kept verbatim.
pub fn decode_chain(raw: &str) -> Result<Vec<Block>, StorageError> {
    let records: Vec<BlockRecord> = serde_json::from_str(raw)?;
    Ok(records.into_iter().map(Block::from_record).collect())
}

/// Chain stored as a single pretty-printed JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ChainStore for JsonFileStore {
    fn load(&self) -> Result<Option<Vec<Block>>, StorageError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let chain = decode_chain(&raw)?;
        debug!("loaded {} blocks from {}", chain.len(), self.path.display());
        Ok(Some(chain))
    }

    /// Write to a sibling temp file, then rename over the target so a
    /// crash mid-write never leaves a truncated chain behind.
    fn save(&self, chain: &[Block]) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, encode_chain(chain)?)?;
        fs::rename(&tmp, &self.path)?;
        debug!("saved {} blocks to {}", chain.len(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::Transaction;

    fn sample_chain() -> Vec<Block> {
        let genesis = Block::genesis(1_700_000_000.25);
        let mut reward = Transaction::reward("miner", 100.0);
        reward.signature = Some("3044abcd".into());
        let mut next = Block::new(1, genesis.hash.clone(), 1_700_000_060.75, vec![reward]);
        next.mine(1);
        next.miner = Some("02ff".into());
        next.signature = Some("3045".into());
        vec![genesis, next]
    }

    #[test]
    fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("chain.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn save_then_load_preserves_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("chains/chain.json"));
        let chain = sample_chain();
        store.save(&chain).unwrap();
        assert_eq!(store.load().unwrap().unwrap(), chain);
        assert!(!dir.path().join("chains/chain.json.tmp").exists());
    }

    #[test]
    fn record_layout_matches_file_format() {
        let raw = encode_chain(&sample_chain()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let block = &value[1];
        for field in [
            "index",
            "previous_hash",
            "timestamp",
            "transactions",
            "nonce",
            "hash",
            "miner",
            "signature",
        ] {
            assert!(block.get(field).is_some(), "missing {field}");
        }
        assert_eq!(block["transactions"][0]["from"], "SYSTEM");
        assert!(value[0]["miner"].is_null());
    }

    #[test]
    fn garbage_is_a_codec_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain.json");
        fs::write(&path, "{ not a chain").unwrap();
        let store = JsonFileStore::new(&path);
        assert!(matches!(store.load(), Err(StorageError::Codec(_))));
    }
}
