use chrono::Utc;
use log::{debug, info, warn};

use super::storage::ChainStore;
use super::{Block, ChainError, DIFF_MAX};
use crate::transaction::{SYSTEM_ADDRESS, Transaction};
use crate::wallet::{self, SystemIdentity};

/// Append-only chain plus the pool of unconfirmed transactions.
///
/// Both live behind one owner (`&mut self`), so appending a mined block
/// and removing its transactions from the pool happen in a single step.
#[derive(Debug)]
pub struct Blockchain {
    chain: Vec<Block>,
    pending_transactions: Vec<Transaction>,
    difficulty: u32,
    mining_reward: f64,
    system: SystemIdentity,
    store: Box<dyn ChainStore>,
}

/// A block assembled from the pending pool, waiting for proof-of-work
/// and the miner's signature. Sealing needs no access to the ledger, so
/// it can run on another thread while the ledger keeps serving requests.
#[derive(Debug, Clone)]
pub struct MiningJob {
    block: Block,
    difficulty: u32,
    /// Number of pending transactions at the head of the block
    included: usize,
}

impl MiningJob {
    pub fn block(&self) -> &Block {
        &self.block
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    /// Mine the block and sign it with the miner's key. The key is
    /// checked before any work is spent.
    pub fn seal(&mut self, miner_private_key: &str) -> Result<(), ChainError> {
        wallet::public_key_from_private_hex(miner_private_key)?;
        self.block.mine(self.difficulty);
        self.block.sign(miner_private_key)?;
        Ok(())
    }
}

/// Current time as fractional Unix seconds.
fn now() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// A 64-char hex hash cannot have more leading zeros than `DIFF_MAX`
/// allows, otherwise mining would never finish.
fn clamp_difficulty(difficulty: u32) -> u32 {
    if difficulty > DIFF_MAX {
        warn!("difficulty {difficulty} is above {DIFF_MAX}, clamping");
        DIFF_MAX
    } else {
        difficulty
    }
}

fn check_address(role: &str, address: &str) -> Result<(), ChainError> {
    if address.trim().is_empty() {
        return Err(ChainError::InvalidAddress(format!("{role} address is missing")));
    }
    if address.contains(':') {
        return Err(ChainError::InvalidAddress(format!(
            "{role} address must not contain ':'"
        )));
    }
    Ok(())
}

/// Check every block after genesis: miner signature, stored hash,
/// linkage to its predecessor, then each transaction's signature.
/// Stops at the first failure.
pub fn validate_blocks(chain: &[Block], system_public_key: &str) -> Result<(), ChainError> {
    if chain.is_empty() {
        return Err(ChainError::ChainCorrupt {
            index: 0,
            reason: "chain has no genesis block".into(),
        });
    }

    for i in 1..chain.len() {
        let current = &chain[i];
        let prev = &chain[i - 1];
        let corrupt = |reason: &str| ChainError::ChainCorrupt {
            index: current.index,
            reason: reason.to_string(),
        };

        if !current.is_signature_valid() {
            return Err(corrupt("invalid miner signature"));
        }
        if current.hash != current.calculate_hash() {
            return Err(corrupt("stored hash does not match contents"));
        }
        if current.previous_hash != prev.hash {
            return Err(corrupt("previous hash does not match prior block"));
        }
        if let Some(pos) = current
            .transactions
            .iter()
            .position(|tx| !tx.is_valid(system_public_key))
        {
            return Err(corrupt(&format!("transaction #{pos} has an invalid signature")));
        }
    }
    Ok(())
}

impl Blockchain {
    /// Initialize a new ledger with a genesis block, ignoring anything
    /// already persisted (it is overwritten by the next mined block).
    pub fn new(
        difficulty: u32,
        mining_reward: f64,
        system: SystemIdentity,
        store: Box<dyn ChainStore>,
    ) -> Self {
        Self {
            chain: vec![Block::genesis(now())],
            pending_transactions: Vec::new(),
            difficulty: clamp_difficulty(difficulty),
            mining_reward,
            system,
            store,
        }
    }

    /// Load the persisted chain if there is one. A chain that cannot be
    /// read or fails validation is discarded and the ledger starts again
    /// from a fresh genesis block: its blocks are lost.
    pub fn open(
        difficulty: u32,
        mining_reward: f64,
        system: SystemIdentity,
        store: Box<dyn ChainStore>,
    ) -> Self {
        let mut bc = Self::new(difficulty, mining_reward, system, store);
        match bc.store.load() {
            Ok(Some(chain)) => match validate_blocks(&chain, bc.system.public_key()) {
                Ok(()) => {
                    info!("loaded persisted chain ({} blocks)", chain.len());
                    bc.chain = chain;
                }
                Err(e) => warn!("persisted chain rejected ({e}); starting from a new genesis block"),
            },
            Ok(None) => info!("no persisted chain, created genesis block"),
            Err(e) => warn!("could not read persisted chain ({e}); starting from a new genesis block"),
        }
        bc
    }

    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    pub fn pending(&self) -> &[Transaction] {
        &self.pending_transactions
    }

    /// Return the last block in the chain.
    pub fn last_block(&self) -> &Block {
        self.chain
            .last()
            .expect("Blockchain should always have at least the genesis block")
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn set_difficulty(&mut self, difficulty: u32) {
        // NOTE: Changing difficulty affects future blocks only.
        self.difficulty = clamp_difficulty(difficulty);
    }

    pub fn mining_reward(&self) -> f64 {
        self.mining_reward
    }

    pub fn system_public_key(&self) -> &str {
        self.system.public_key()
    }

    /// Confirmed balance: credits minus debits over every block.
    /// Pending transactions are not counted.
    pub fn get_balance(&self, address: &str) -> f64 {
        let mut balance = 0.0;
        for tx in self.chain.iter().flat_map(|b| b.transactions.iter()) {
            if tx.from_address == address {
                balance -= tx.amount;
            }
            if tx.to_address == address {
                balance += tx.amount;
            }
        }
        balance
    }

    /// Admit a client transaction into the pending pool.
    ///
    /// Funds are checked against the confirmed balance only; several
    /// pending transactions from one sender are not summed. Negative
    /// amounts are not rejected.
    pub fn create_transaction(&mut self, tx: Transaction) -> Result<(), ChainError> {
        check_address("sender", &tx.from_address)?;
        check_address("receiver", &tx.to_address)?;
        if tx.is_reward() {
            return Err(ChainError::InvalidAddress(format!(
                "{SYSTEM_ADDRESS} only pays mining rewards"
            )));
        }
        if !tx.amount.is_finite() {
            return Err(ChainError::InvalidAmount(tx.amount));
        }
        if !tx.is_valid(self.system.public_key()) {
            warn!("rejected transaction from {}: bad signature", tx.from_address);
            return Err(ChainError::InvalidSignature);
        }

        let balance = self.get_balance(&tx.from_address);
        if balance < tx.amount {
            warn!(
                "rejected transaction from {}: balance {} < {}",
                tx.from_address, balance, tx.amount
            );
            return Err(ChainError::InsufficientFunds {
                address: tx.from_address,
                balance,
                requested: tx.amount,
            });
        }

        debug!(
            "admitted {} -> {} ({}); pool size {}",
            tx.from_address,
            tx.to_address,
            tx.amount,
            self.pending_transactions.len() + 1
        );
        self.pending_transactions.push(tx);
        Ok(())
    }

    /// Build the next block from the whole pending pool plus a reward
    /// for `miner_address`. Any invalid pending transaction aborts the
    /// attempt; nothing is modified.
    pub fn prepare_block(&self, miner_address: &str) -> Result<MiningJob, ChainError> {
        check_address("miner", miner_address)?;
        if miner_address == SYSTEM_ADDRESS {
            return Err(ChainError::InvalidAddress(format!(
                "{SYSTEM_ADDRESS} cannot receive mining rewards"
            )));
        }

        if let Some(position) = self
            .pending_transactions
            .iter()
            .position(|tx| !tx.is_valid(self.system.public_key()))
        {
            warn!("pending transaction #{position} failed revalidation, mining aborted");
            return Err(ChainError::InvalidPendingTransaction { position });
        }

        let mut reward = Transaction::reward(miner_address, self.mining_reward);
        reward.signature = Some(self.system.sign(reward.canonical_payload().as_bytes())?);

        let included = self.pending_transactions.len();
        let mut transactions = Vec::with_capacity(included + 1);
        transactions.extend(self.pending_transactions.iter().cloned());
        transactions.push(reward);

        let block = Block::new(
            self.chain.len() as u64,
            self.last_block().hash.clone(),
            now(),
            transactions,
        );
        debug!(
            "prepared block #{} with {} pending txs + reward",
            block.index, included
        );

        Ok(MiningJob {
            block,
            difficulty: self.difficulty,
            included,
        })
    }

    /// Append a sealed block, persist the chain and drop the block's
    /// transactions from the pool.
    ///
    /// The block is refused as stale if the tip moved or its transactions
    /// are no longer at the head of the pool. If saving fails the block
    /// is taken back off, so the ledger is exactly as it was.
    pub fn commit_block(&mut self, job: MiningJob) -> Result<&Block, ChainError> {
        let MiningJob {
            block, included, ..
        } = job;

        let tip = self.last_block();
        if block.index != self.chain.len() as u64 || block.previous_hash != tip.hash {
            return Err(ChainError::StaleBlock(format!(
                "block #{} does not extend the current tip #{}",
                block.index, tip.index
            )));
        }
        let still_pending = self.pending_transactions.len() >= included
            && self.pending_transactions[..included] == block.transactions[..included];
        if !still_pending {
            return Err(ChainError::StaleBlock(
                "pending pool changed while mining".into(),
            ));
        }
        if block.hash != block.calculate_hash() || !block.meets_difficulty(self.difficulty) {
            return Err(ChainError::StaleBlock(format!(
                "block #{} does not meet difficulty {}",
                block.index, self.difficulty
            )));
        }
        if !block.is_signature_valid() {
            return Err(ChainError::InvalidSignature);
        }

        self.chain.push(block);
        if let Err(e) = self.store.save(&self.chain) {
            self.chain.pop();
            return Err(e.into());
        }
        self.pending_transactions.drain(..included);

        let sealed = self.last_block();
        info!(
            "MINER - sealed block #{} (hash={}, nonce={}, txs={})",
            sealed.index,
            sealed.hash,
            sealed.nonce,
            sealed.transactions.len()
        );
        Ok(sealed)
    }

    /// Mine the pending pool in one call: prepare, proof-of-work, sign,
    /// append and persist. The pool is revalidated before the miner key
    /// is looked at.
    pub fn mine_pending(
        &mut self,
        miner_address: &str,
        miner_private_key: &str,
    ) -> Result<&Block, ChainError> {
        let mut job = self.prepare_block(miner_address)?;
        job.seal(miner_private_key)?;
        self.commit_block(job)
    }

    pub fn validate_chain(&self) -> Result<(), ChainError> {
        validate_blocks(&self.chain, self.system.public_key())
    }

    /// Validate the entire chain: signatures, hashes, linkage. The
    /// genesis block is exempt.
    pub fn is_chain_valid(&self) -> bool {
        match self.validate_chain() {
            Ok(()) => true,
            Err(e) => {
                warn!("chain validation failed: {e}");
                false
            }
        }
    }
}
