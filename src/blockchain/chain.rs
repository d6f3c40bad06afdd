use log::{info, warn};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::block::Block;
use super::crypto::CryptoError;
use super::output::TransactionOutput;
use super::template::{BlockTemplate, TransactionSearch};
use super::transaction::{Transaction, TransactionType};
use super::validation::{Validation, ValidationError};
use crate::config::LedgerConfig;

/// Summary of the chain for status queries
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChainStatus {
    /// Number of pending transactions
    pub mempool: usize,

    pub is_blockchain_valid: bool,

    /// Number of blocks in the chain
    pub blocks: usize,

    pub next_index: u64,

    /// Hash of the chain tip
    pub last_block: String,
}

/// State guarded by the ledger lock
#[derive(Debug)]
struct ChainState {
    blocks: Vec<Block>,
    mempool: Vec<Transaction>,
    difficulty: u32,
}

impl ChainState {
    fn last_block(&self) -> &Block {
        // The genesis block is pushed at construction and blocks are never removed
        &self.blocks[self.blocks.len() - 1]
    }

    fn next_index(&self) -> u64 {
        self.blocks.len() as u64
    }

    fn is_mined(&self, hash: &str) -> bool {
        self.blocks
            .iter()
            .any(|block| block.transactions.iter().any(|tx| tx.hash == hash))
    }

    fn new_block_template(&self, config: &LedgerConfig) -> Option<BlockTemplate> {
        if self.mempool.len() < config.tx_per_block {
            return None;
        }

        Some(BlockTemplate {
            index: self.next_index(),
            previous_hash: self.last_block().current_hash.clone(),
            difficulty: self.difficulty,
            fee_per_tx: config.fee_per_tx,
            max_difficulty: config.max_difficulty,
            reward: config.reward_for(self.difficulty),
            transactions: self.mempool[..config.tx_per_block].to_vec(),
        })
    }

    fn validate_chain(&self, config: &LedgerConfig) -> Result<Validation, CryptoError> {
        for pair in self.blocks.windows(2) {
            let (previous, current) = (&pair[0], &pair[1]);
            let difficulty = config.difficulty_at(current.index);

            let validation = current.validate(
                previous,
                difficulty,
                config.fee_per_tx,
                config.reward_for(difficulty),
            )?;
            if !validation.is_valid() {
                return Ok(ValidationError::InvalidBlockAt {
                    index: current.index,
                    reason: validation.into_message(),
                }
                .into());
            }
        }

        Ok(Validation::ok())
    }

    fn utxos_for(&self, address: &str) -> Vec<TransactionOutput> {
        let transactions = || self.blocks.iter().flat_map(|block| block.transactions.iter());

        let mut unspent: Vec<TransactionOutput> = transactions()
            .flat_map(|tx| tx.outputs.iter())
            .filter(|output| output.to_address == address)
            .cloned()
            .collect();

        let spent = transactions()
            .flat_map(|tx| tx.inputs.iter())
            .filter(|input| input.from_address == address);

        // Each input consumes exactly one of the outputs it references
        for input in spent {
            if let Some(position) = unspent
                .iter()
                .position(|output| output.owning_tx_hash == input.previous_tx_hash)
            {
                unspent.remove(position);
            }
        }

        unspent
    }
}

/// The ledger: an append-only chain of blocks plus the pool of pending
/// transactions
///
/// All state sits behind one lock. Mutations hold the write lock for their whole
/// duration, so concurrent callers observe a linear history. Mining happens on
/// caller-owned blocks and never touches the lock.
#[derive(Debug)]
pub struct Blockchain {
    config: LedgerConfig,
    state: RwLock<ChainState>,
}

impl Blockchain {
    /// Creates a ledger whose genesis block rewards `miner`
    pub fn new(config: LedgerConfig, miner: &str) -> Self {
        // Difficulty in force for block 1; differs from the initial one only
        // when every block escalates
        let difficulty = config.difficulty_at(1);
        let genesis = Self::create_genesis_block(&config, miner);
        info!("Created genesis block {}", genesis.current_hash);

        Blockchain {
            config,
            state: RwLock::new(ChainState {
                blocks: vec![genesis],
                mempool: Vec::new(),
                difficulty,
            }),
        }
    }

    fn create_genesis_block(config: &LedgerConfig, miner: &str) -> Block {
        let reward = config.reward_for(config.initial_difficulty);
        let transaction = Transaction::from_reward(TransactionOutput::new(miner, reward));

        let mut genesis = Block::new(0, vec![transaction], String::new());
        genesis.mine(config.initial_difficulty, miner);

        genesis
    }

    fn read(&self) -> RwLockReadGuard<'_, ChainState> {
        // State is only written after every check passed, so a poisoned lock
        // still holds a consistent chain
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ChainState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Submits a transaction to the mempool
    ///
    /// On success the returned message is the transaction hash. A rejection
    /// leaves the mempool untouched.
    pub fn add_transaction(&self, transaction: Transaction) -> Result<Validation, CryptoError> {
        let mut state = self.write();

        if state.mempool.iter().any(|tx| tx.hash == transaction.hash) {
            warn!("Rejected transaction {}: already pending", transaction.hash);
            return Ok(ValidationError::AlreadyPending.into());
        }

        if let Some(first) = transaction.inputs.first() {
            let from = first.from_address.as_str();
            let pending = state.mempool.iter().any(|tx| {
                tx.inputs.iter().any(|input| input.from_address == from)
            });

            if pending {
                warn!("Rejected transaction {}: pending spend from {}", transaction.hash, from);
                return Ok(ValidationError::PendingFromSameSender.into());
            }
        }

        let validation =
            transaction.validate(self.config.fee_per_tx, self.config.reward_for(state.difficulty))?;
        if !validation.is_valid() {
            warn!("Rejected transaction {}: {}", transaction.hash, validation.message());
            return Ok(validation);
        }

        if transaction.is_fee() {
            warn!("Rejected fee transaction {} submitted outside a block", transaction.hash);
            return Ok(ValidationError::FeeTransactionNotAllowed.into());
        }

        if transaction.inputs.is_empty() {
            warn!("Rejected transaction {}: spends no inputs", transaction.hash);
            return Ok(ValidationError::MissingInputs.into());
        }

        if state.is_mined(&transaction.hash) {
            warn!("Rejected transaction {}: already mined", transaction.hash);
            return Ok(ValidationError::AlreadyMined.into());
        }

        let hash = transaction.hash.clone();
        state.mempool.push(transaction);
        info!("Accepted transaction {} ({} pending)", hash, state.mempool.len());

        Ok(Validation::accepted(hash))
    }

    /// Returns the next block to mine, or `None` while fewer than
    /// `tx_per_block` transactions are pending
    pub fn get_new_block_template(&self) -> Option<BlockTemplate> {
        self.read().new_block_template(&self.config)
    }

    /// Appends a mined block
    ///
    /// On success the returned message is the block hash. The block's regular
    /// transactions must all come from the mempool; any rejection leaves the
    /// ledger untouched.
    pub fn add_block(&self, block: Block) -> Result<Validation, CryptoError> {
        let mut state = self.write();

        if state.new_block_template(&self.config).is_none() {
            warn!("Rejected block {}: not enough pending transactions", block.index);
            return Ok(ValidationError::NotEnoughTransactions.into());
        }

        let validation = block.validate(
            state.last_block(),
            state.difficulty,
            self.config.fee_per_tx,
            self.config.reward_for(state.difficulty),
        )?;
        if !validation.is_valid() {
            warn!("Rejected block {}: {}", block.index, validation.message());
            return Ok(validation);
        }

        let included: Vec<&str> = block
            .transactions
            .iter()
            .filter(|tx| tx.tx_type == TransactionType::Regular)
            .map(|tx| tx.hash.as_str())
            .collect();
        let remaining: Vec<Transaction> = state
            .mempool
            .iter()
            .filter(|tx| !included.contains(&tx.hash.as_str()))
            .cloned()
            .collect();

        if included.len() + remaining.len() != state.mempool.len() {
            warn!("Rejected block {}: transactions not in mempool", block.index);
            return Ok(ValidationError::MempoolInconsistent.into());
        }

        let hash = block.current_hash.clone();
        state.mempool = remaining;
        state.blocks.push(block);
        info!("Appended block {} ({})", state.blocks.len() - 1, hash);

        if self.config.raises_difficulty_at(state.blocks.len() as u64) {
            state.difficulty += 1;
            info!("Difficulty increased to {}", state.difficulty);
        }

        Ok(Validation::accepted(hash))
    }

    /// Re-validates every block against its predecessor
    pub fn is_blockchain_valid(&self) -> Result<Validation, CryptoError> {
        self.read().validate_chain(&self.config)
    }

    /// Looks a transaction up in the mempool first, then in the chain
    pub fn get_transaction_by_hash(&self, hash: &str) -> Option<TransactionSearch> {
        let state = self.read();

        if let Some(position) = state.mempool.iter().position(|tx| tx.hash == hash) {
            return Some(TransactionSearch {
                transaction: state.mempool[position].clone(),
                mempool_index: Some(position),
                block_index: None,
            });
        }

        state.blocks.iter().find_map(|block| {
            block
                .transactions
                .iter()
                .find(|tx| tx.hash == hash)
                .map(|tx| TransactionSearch {
                    transaction: tx.clone(),
                    mempool_index: None,
                    block_index: Some(block.index),
                })
        })
    }

    /// Unspent outputs paid to `address`, considering mined blocks only
    pub fn get_utxos_for(&self, address: &str) -> Vec<TransactionOutput> {
        self.read().utxos_for(address)
    }

    /// Sum of the unspent outputs paid to `address`
    pub fn get_balance(&self, address: &str) -> i64 {
        TransactionOutput::sum(&self.get_utxos_for(address))
    }

    /// Block reward at the current difficulty
    pub fn get_reward_amount(&self) -> i64 {
        self.config.reward_for(self.difficulty())
    }

    pub fn difficulty(&self) -> u32 {
        self.read().difficulty
    }

    pub fn fee_per_tx(&self) -> i64 {
        self.config.fee_per_tx
    }

    pub fn next_index(&self) -> u64 {
        self.read().next_index()
    }

    pub fn last_block(&self) -> Block {
        self.read().last_block().clone()
    }

    pub fn blocks(&self) -> Vec<Block> {
        self.read().blocks.clone()
    }

    pub fn block(&self, index: u64) -> Option<Block> {
        let state = self.read();
        usize::try_from(index)
            .ok()
            .and_then(|index| state.blocks.get(index))
            .cloned()
    }

    pub fn block_by_hash(&self, hash: &str) -> Option<Block> {
        self.read()
            .blocks
            .iter()
            .find(|block| block.current_hash == hash)
            .cloned()
    }

    pub fn mempool_len(&self) -> usize {
        self.read().mempool.len()
    }

    /// The oldest `limit` pending transactions
    pub fn pending_transactions(&self, limit: usize) -> Vec<Transaction> {
        self.read().mempool.iter().take(limit).cloned().collect()
    }

    /// Snapshot of the chain taken under a single read lock
    pub fn status(&self) -> Result<ChainStatus, CryptoError> {
        let state = self.read();

        Ok(ChainStatus {
            mempool: state.mempool.len(),
            is_blockchain_valid: state.validate_chain(&self.config)?.is_valid(),
            blocks: state.blocks.len(),
            next_index: state.next_index(),
            last_block: state.last_block().current_hash.clone(),
        })
    }
}
