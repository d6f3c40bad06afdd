use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::transaction::Transaction;

/// Work handed to a miner: everything needed to assemble the next block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BlockTemplate {
    /// Index the mined block must carry
    pub index: u64,

    /// Hash of the current chain tip
    pub previous_hash: String,

    /// Leading zero characters the block hash must have
    pub difficulty: u32,

    /// Fee expected per transaction in the block
    pub fee_per_tx: i64,

    /// Difficulty above which no block reward is paid
    pub max_difficulty: u32,

    /// Block reward at the current difficulty
    pub reward: i64,

    /// Oldest pending transactions, in submission order
    pub transactions: Vec<Transaction>,
}

/// Where a transaction was found: the mempool or a mined block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransactionSearch {
    pub transaction: Transaction,

    /// Position in the mempool when still pending
    pub mempool_index: Option<usize>,

    /// Index of the block holding the transaction when mined
    pub block_index: Option<u64>,
}
