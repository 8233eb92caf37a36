use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::transaction::{Transaction, TransactionRecord};
use crate::wallet::{self, WalletError};

/// A single block in the ledger holding an ordered batch of transactions.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub index: u64,
    pub previous_hash: String,
    pub timestamp: f64, // Unix seconds (UTC), fractional
    pub transactions: Vec<Transaction>,
    pub nonce: u64,   // Proof-of-Work nonce
    pub hash: String, // Cached hash of the block
    /// Public key of the miner that sealed the block
    pub miner: Option<String>,
    /// Miner's signature over `hash`
    pub signature: Option<String>,
}

/// On-disk / wire form of a block. `hash` is stored, never recomputed
/// on load, so tampering shows up as a mismatch during validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockRecord {
    pub index: u64,
    pub previous_hash: String,
    pub timestamp: f64,
    pub transactions: Vec<TransactionRecord>,
    pub nonce: u64,
    pub hash: String,
    pub miner: Option<String>,
    pub signature: Option<String>,
}

impl Block {
    /// Create the genesis block (first block in the chain). It is never
    /// mined nor signed.
    pub fn genesis(timestamp: f64) -> Self {
        Self::new(0, String::from("0"), timestamp, Vec::new())
    }

    /// Create a new block (not mined yet). Call `mine()` to perform PoW
    /// and `sign()` to seal it.
    pub fn new(
        index: u64,
        previous_hash: String,
        timestamp: f64,
        transactions: Vec<Transaction>,
    ) -> Self {
        Self::with_seal(index, previous_hash, timestamp, transactions, 0, None, None)
    }

    /// Rebuild a block from all of its fields except the hash, which is
    /// recomputed. Use `from_record` to keep a stored hash instead.
    pub fn with_seal(
        index: u64,
        previous_hash: String,
        timestamp: f64,
        transactions: Vec<Transaction>,
        nonce: u64,
        miner: Option<String>,
        signature: Option<String>,
    ) -> Self {
        let mut block = Self {
            index,
            previous_hash,
            timestamp,
            transactions,
            nonce,
            hash: String::new(),
            miner,
            signature,
        };
        block.hash = block.calculate_hash();
        block
    }

    /// SHA-256 over index, previous hash, timestamp, every transaction's
    /// payload and signature (in block order) and the nonce. `hash`,
    /// `miner` and `signature` are not part of the preimage.
    pub fn calculate_hash(&self) -> String {
        let tx_data: String = self
            .transactions
            .iter()
            .map(|tx| format!("{}{}", tx.canonical_payload(), tx.signature.as_deref().unwrap_or("")))
            .collect();
        let preimage = format!(
            "{}:{}:{}:{}:{}",
            self.index, self.previous_hash, self.timestamp, tx_data, self.nonce
        );
        let mut hasher = Sha256::new();
        hasher.update(preimage.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Whether the cached hash starts with `difficulty` hex zeros.
    pub fn meets_difficulty(&self, difficulty: u32) -> bool {
        let difficulty = difficulty as usize;
        self.hash.len() >= difficulty && self.hash.bytes().take(difficulty).all(|c| c == b'0')
    }

    /// Perform Proof-of-Work: bump the nonce until the hash has at least
    /// `difficulty` leading zeros. Returns immediately if it already does.
    pub fn mine(&mut self, difficulty: u32) {
        while !self.meets_difficulty(difficulty) {
            self.nonce = self.nonce.wrapping_add(1);
            self.hash = self.calculate_hash();
        }
    }

    /// Sign the block hash with the miner's key and record the matching
    /// public key as `miner`.
    pub fn sign(&mut self, miner_private_key: &str) -> Result<(), WalletError> {
        let miner = wallet::public_key_from_private_hex(miner_private_key)?;
        let signature = wallet::sign_message_hex(miner_private_key, self.hash.as_bytes())?;
        self.miner = Some(miner);
        self.signature = Some(signature);
        Ok(())
    }

    pub fn is_signature_valid(&self) -> bool {
        match (self.miner.as_deref(), self.signature.as_deref()) {
            (Some(miner), Some(signature)) => {
                wallet::verify_signature_hex(miner, self.hash.as_bytes(), signature)
            }
            _ => false,
        }
    }

    pub fn to_record(&self) -> BlockRecord {
        BlockRecord {
            index: self.index,
            previous_hash: self.previous_hash.clone(),
            timestamp: self.timestamp,
            transactions: self.transactions.iter().map(Transaction::to_record).collect(),
            nonce: self.nonce,
            hash: self.hash.clone(),
            miner: self.miner.clone(),
            signature: self.signature.clone(),
        }
    }

    pub fn from_record(record: BlockRecord) -> Self {
        Self {
            index: record.index,
            previous_hash: record.previous_hash,
            timestamp: record.timestamp,
            transactions: record
                .transactions
                .into_iter()
                .map(Transaction::from_record)
                .collect(),
            nonce: record.nonce,
            hash: record.hash,
            miner: record.miner,
            signature: record.signature,
        }
    }
}
