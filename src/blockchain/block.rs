use chrono::Utc;
use log::debug;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::crypto::{sha256_hex, CryptoError};
use super::template::BlockTemplate;
use super::transaction::Transaction;
use super::validation::{join_failures, Validation, ValidationError};

/// Represents a block in the blockchain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// Index of the block in the chain
    pub index: u64,

    /// Creation time in milliseconds since the Unix epoch
    pub timestamp: i64,

    /// List of transactions included in this block
    #[serde(default)]
    pub transactions: Vec<Transaction>,

    /// Hash of the block (calculated)
    #[serde(default)]
    pub current_hash: String,

    /// Hash of the previous block, empty for the genesis block
    #[serde(default)]
    pub previous_hash: String,

    /// Proof of work
    #[serde(default)]
    pub nonce: i64,

    /// Address credited with the block reward
    #[serde(default)]
    pub miner: String,
}

impl Block {
    /// Creates an unmined block
    ///
    /// # Arguments
    ///
    /// * `index` - The index of the block in the chain
    /// * `transactions` - The list of transactions to include in the block
    /// * `previous_hash` - The hash of the previous block
    pub fn new(index: u64, transactions: Vec<Transaction>, previous_hash: String) -> Self {
        let mut block = Block {
            index,
            timestamp: Utc::now().timestamp_millis(),
            transactions,
            current_hash: String::new(),
            previous_hash,
            nonce: 0,
            miner: String::new(),
        };
        block.current_hash = block.compute_hash();

        block
    }

    /// Builds an unmined block from a ledger template
    pub fn from_template(template: &BlockTemplate) -> Self {
        Block::new(
            template.index,
            template.transactions.clone(),
            template.previous_hash.clone(),
        )
    }

    /// Rebuilds a block received from outside with the construction rules
    /// applied to it and to every transaction it holds
    pub fn from_existing(block: Block) -> Self {
        let mut rebuilt = Block {
            transactions: block
                .transactions
                .into_iter()
                .map(Transaction::from_existing)
                .collect(),
            ..block
        };
        if rebuilt.current_hash.is_empty() {
            rebuilt.current_hash = rebuilt.compute_hash();
        }

        rebuilt
    }

    /// Digest over index, timestamp, transaction hashes, previous hash, nonce
    /// and miner
    pub fn compute_hash(&self) -> String {
        let transactions: String = self
            .transactions
            .iter()
            .map(|transaction| transaction.hash.as_str())
            .collect();

        sha256_hex(&format!(
            "{}{}{}{}{}{}",
            self.index, self.timestamp, transactions, self.previous_hash, self.nonce, self.miner
        ))
    }

    fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
        hash.starts_with(&"0".repeat(difficulty as usize))
    }

    /// Performs proof of work on behalf of `miner`
    ///
    /// The search moves forward from the current nonce and stops at the first
    /// nonce >= 1 whose hash has `difficulty` leading zeros, so a block that is
    /// already mined for this miner is left untouched.
    pub fn mine(&mut self, difficulty: u32, miner: &str) {
        self.miner = miner.to_string();
        if self.nonce < 1 {
            self.nonce = 1;
        }

        loop {
            let hash = self.compute_hash();
            if Self::meets_difficulty(&hash, difficulty) {
                self.current_hash = hash;
                break;
            }
            self.nonce += 1;
        }

        debug!(
            "Mined block {} with nonce {} at difficulty {}",
            self.index, self.nonce, difficulty
        );
    }

    /// Validates the block against its predecessor
    ///
    /// Transaction content is checked before the block structure. Every
    /// transaction is validated against a fee budget of
    /// `fee_per_tx * transactions.len()`.
    pub fn validate(
        &self,
        previous_block: &Block,
        difficulty: u32,
        fee_per_tx: i64,
        block_reward: i64,
    ) -> Result<Validation, CryptoError> {
        if !self.transactions.is_empty() {
            let fee_transactions: Vec<&Transaction> =
                self.transactions.iter().filter(|tx| tx.is_fee()).collect();

            if fee_transactions.len() > 1 {
                return Ok(ValidationError::TooManyFeeTx.into());
            }

            if let Some(fee_transaction) = fee_transactions.first() {
                let pays_miner = match fee_transaction.outputs.as_slice() {
                    [output] => output.to_address == self.miner,
                    _ => false,
                };
                if !pays_miner {
                    return Ok(ValidationError::InvalidMinerWallet.into());
                }
            }

            let count = i64::try_from(self.transactions.len()).unwrap_or(i64::MAX);
            let total_fees = fee_per_tx.saturating_mul(count);

            let mut invalid = Vec::new();
            for transaction in &self.transactions {
                let validation = transaction.validate(total_fees, block_reward)?;
                if !validation.is_valid() {
                    invalid.push(validation);
                }
            }
            if !invalid.is_empty() {
                return Ok(ValidationError::InvalidTransaction(join_failures(&invalid)).into());
            }
        }

        if previous_block.index.checked_add(1) != Some(self.index) {
            return Ok(ValidationError::InvalidIndex.into());
        }
        if self.previous_hash != previous_block.current_hash {
            return Ok(ValidationError::InvalidPreviousBlockHash.into());
        }
        if self.nonce < 1 {
            return Ok(ValidationError::InvalidNonce.into());
        }
        if self.miner.is_empty() {
            return Ok(ValidationError::InvalidMiner.into());
        }
        if self.compute_hash() != self.current_hash
            || !Self::meets_difficulty(&self.current_hash, difficulty)
        {
            return Ok(ValidationError::InvalidHash.into());
        }

        Ok(Validation::ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::crypto::Wallet;
    use crate::blockchain::input::TransactionInput;
    use crate::blockchain::output::TransactionOutput;
    use crate::blockchain::transaction::TransactionType;

    const DIFFICULTY: u32 = 2;
    const FEE_PER_TX: i64 = 1;
    const REWARD: i64 = 44;

    fn valid_transaction() -> Transaction {
        let sender = Wallet::generate();
        let recipient = Wallet::generate();
        let mut input = TransactionInput::new(sender.public_key(), 10, "some hash");
        input.sign(&sender.private_key()).unwrap();

        Transaction::new(
            TransactionType::Regular,
            vec![input],
            vec![TransactionOutput::new(recipient.public_key(), 10)],
        )
    }

    fn genesis() -> Block {
        let reward = Transaction::from_reward(TransactionOutput::new("genesis miner", REWARD));
        let mut block = Block::new(0, vec![reward], String::new());
        block.mine(DIFFICULTY, "genesis miner");
        block
    }

    fn mined_successor(previous: &Block, miner: &str) -> Block {
        let reward = Transaction::from_reward(TransactionOutput::new(miner, REWARD));
        let mut block = Block::new(
            previous.index + 1,
            vec![valid_transaction(), reward],
            previous.current_hash.clone(),
        );
        block.mine(DIFFICULTY, miner);
        block
    }

    fn check(block: &Block, previous: &Block) -> Validation {
        block
            .validate(previous, DIFFICULTY, FEE_PER_TX, REWARD)
            .unwrap()
    }

    #[test]
    fn test_new_block() {
        let block = Block::new(1, vec![valid_transaction()], "previous_hash".to_string());

        assert_eq!(block.index, 1);
        assert_eq!(block.nonce, 0);
        assert_eq!(block.previous_hash, "previous_hash");
        assert_eq!(block.current_hash, block.compute_hash());
        assert_eq!(block.current_hash.len(), 64);
    }

    #[test]
    fn test_mine_meets_difficulty() {
        let block = genesis();
        assert!(block.current_hash.starts_with("00"));
        assert!(block.nonce >= 1);
        assert_eq!(block.miner, "genesis miner");
        assert_eq!(block.current_hash, block.compute_hash());
    }

    #[test]
    fn test_mine_is_idempotent() {
        let mut block = genesis();
        let (nonce, hash) = (block.nonce, block.current_hash.clone());

        block.mine(DIFFICULTY, "genesis miner");
        assert_eq!(block.nonce, nonce);
        assert_eq!(block.current_hash, hash);
    }

    #[test]
    fn test_validate_block() {
        let previous = genesis();
        let block = mined_successor(&previous, "miner");
        assert!(check(&block, &previous).is_valid());
    }

    #[test]
    fn test_validate_block_without_fee_transaction() {
        let previous = genesis();
        let mut block = Block::new(1, vec![valid_transaction()], previous.current_hash.clone());
        block.mine(DIFFICULTY, "miner");
        assert!(check(&block, &previous).is_valid());
    }

    #[test]
    fn test_rejects_two_fee_transactions() {
        let previous = genesis();
        let mut block = Block::new(
            1,
            vec![
                Transaction::from_reward(TransactionOutput::new("miner", 1)),
                Transaction::from_reward(TransactionOutput::new("miner", 1)),
            ],
            previous.current_hash.clone(),
        );
        block.mine(DIFFICULTY, "miner");
        assert_eq!(
            check(&block, &previous).message(),
            "Invalid number of fee transactions"
        );
    }

    #[test]
    fn test_rejects_fee_paid_to_someone_else() {
        let previous = genesis();
        let mut block = mined_successor(&previous, "miner");
        block.mine(DIFFICULTY, "another miner");
        assert_eq!(check(&block, &previous).message(), "Invalid miner wallet");
    }

    #[test]
    fn test_rejects_fee_split_with_another_address() {
        let previous = genesis();
        let split = Transaction::new(
            TransactionType::Fee,
            Vec::new(),
            vec![
                TransactionOutput::new("miner", REWARD),
                TransactionOutput::new("someone else", 1_000_000),
            ],
        );
        let mut block = Block::new(
            1,
            vec![valid_transaction(), split],
            previous.current_hash.clone(),
        );
        block.mine(DIFFICULTY, "miner");
        assert_eq!(check(&block, &previous).message(), "Invalid miner wallet");
    }

    #[test]
    fn test_aggregates_invalid_transactions() {
        let previous = genesis();
        let mut broken = valid_transaction();
        broken.hash = "invalid hash".to_string();

        let mut block = Block::new(
            1,
            vec![valid_transaction(), broken],
            previous.current_hash.clone(),
        );
        block.mine(DIFFICULTY, "miner");
        assert_eq!(
            check(&block, &previous).message(),
            "Invalid transaction: Invalid hash"
        );
    }

    #[test]
    fn test_fee_budget_counts_every_transaction() {
        let previous = genesis();
        // Two transactions with a fee of 1 each allow REWARD + 2
        let mut block = Block::new(
            1,
            vec![
                valid_transaction(),
                Transaction::from_reward(TransactionOutput::new("miner", REWARD + 2)),
            ],
            previous.current_hash.clone(),
        );
        block.mine(DIFFICULTY, "miner");
        assert!(check(&block, &previous).is_valid());

        let mut greedy = Block::new(
            1,
            vec![
                valid_transaction(),
                Transaction::from_reward(TransactionOutput::new("miner", REWARD + 3)),
            ],
            previous.current_hash.clone(),
        );
        greedy.mine(DIFFICULTY, "miner");
        assert_eq!(
            check(&greedy, &previous).message(),
            "Invalid transaction: Invalid fee amount"
        );
    }

    #[test]
    fn test_rejects_wrong_index() {
        let previous = genesis();
        let mut block = Block::new(0, vec![valid_transaction()], previous.current_hash.clone());
        block.mine(DIFFICULTY, "miner");
        assert_eq!(check(&block, &previous).message(), "Invalid index");
    }

    #[test]
    fn test_rejects_wrong_previous_hash() {
        let previous = genesis();
        let mut block = Block::new(1, vec![valid_transaction()], "invalid".to_string());
        block.mine(DIFFICULTY, "miner");
        assert_eq!(check(&block, &previous).message(), "Invalid previous hash");
    }

    #[test]
    fn test_rejects_negative_nonce() {
        let previous = genesis();
        let mut block = mined_successor(&previous, "miner");
        block.nonce = -1;
        assert_eq!(check(&block, &previous).message(), "Invalid nonce");
    }

    #[test]
    fn test_rejects_unmined_block() {
        let previous = genesis();
        let block = Block::new(1, vec![valid_transaction()], previous.current_hash.clone());
        assert_eq!(check(&block, &previous).message(), "Invalid nonce");
    }

    #[test]
    fn test_rejects_empty_miner() {
        let previous = genesis();
        let mut block = Block::new(1, vec![valid_transaction()], previous.current_hash.clone());
        block.mine(DIFFICULTY, "miner");
        block.miner = String::new();
        assert_eq!(check(&block, &previous).message(), "Invalid miner");
    }

    #[test]
    fn test_rejects_changed_hash() {
        let previous = genesis();
        let mut block = mined_successor(&previous, "miner");
        block.current_hash = "invalid".to_string();
        assert_eq!(check(&block, &previous).message(), "Invalid hash");
    }

    #[test]
    fn test_rejects_insufficient_difficulty() {
        let previous = genesis();
        let block = mined_successor(&previous, "miner");
        let validation = block
            .validate(&previous, 64, FEE_PER_TX, REWARD)
            .unwrap();
        assert_eq!(validation.message(), "Invalid hash");
    }

    #[test]
    fn test_transaction_checks_run_before_structure() {
        let previous = genesis();
        let mut block = mined_successor(&previous, "miner");
        block.transactions[0].hash = "invalid hash".to_string();
        block.index = 7;
        assert_eq!(
            check(&block, &previous).message(),
            "Invalid transaction: Invalid hash"
        );
    }

    #[test]
    fn test_from_template() {
        let template = BlockTemplate {
            index: 3,
            previous_hash: "tip".to_string(),
            difficulty: DIFFICULTY,
            fee_per_tx: FEE_PER_TX,
            max_difficulty: 5,
            reward: REWARD,
            transactions: vec![valid_transaction()],
        };
        let block = Block::from_template(&template);

        assert_eq!(block.index, 3);
        assert_eq!(block.previous_hash, "tip");
        assert_eq!(block.transactions, template.transactions);
        assert_eq!(block.nonce, 0);
        assert!(block.miner.is_empty());
    }

    #[test]
    fn test_from_existing_reproduces_hash() {
        let block = mined_successor(&genesis(), "miner");
        let copy = Block::from_existing(block.clone());
        assert_eq!(copy, block);
        assert_eq!(copy.compute_hash(), block.current_hash);
    }
}
