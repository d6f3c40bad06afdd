use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Reasons a transaction, block or chain is refused by the ledger
///
/// The display strings are the diagnostics returned to clients, so their wording
/// is part of the public contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid transaction output: toAddress must be a valid public key")]
    EmptyToAddress,

    #[error("Invalid transaction output: txHash must be a valid hash")]
    EmptyOwningTxHash,

    #[error("Invalid transaction output: amount must be greater than 0")]
    NonPositiveOutputAmount,

    #[error("Invalid previousTxHash")]
    InvalidPreviousHash,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Invalid amount")]
    InvalidAmount,

    #[error("Invalid hash")]
    InvalidHash,

    #[error("Invalid TXO: No outputs")]
    NoOutputs,

    #[error("Invalid TXO: {0}")]
    InvalidOutputs(String),

    #[error("Invalid TXI: {0}")]
    InvalidInputs(String),

    #[error("Invalid transaction: input amount is less than output amount")]
    InsufficientInput,

    #[error("Invalid TXO reference hash")]
    InvalidOutputReference,

    #[error("Invalid fee amount")]
    InvalidFeeAmount,

    #[error("Invalid fee transaction: expected no inputs and a single output")]
    InvalidFeeShape,

    #[error("Invalid number of fee transactions")]
    TooManyFeeTx,

    #[error("Invalid miner wallet")]
    InvalidMinerWallet,

    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("Invalid index")]
    InvalidIndex,

    #[error("Invalid previous hash")]
    InvalidPreviousBlockHash,

    #[error("Invalid nonce")]
    InvalidNonce,

    #[error("Invalid miner")]
    InvalidMiner,

    #[error("There is a pending transaction from this address")]
    PendingFromSameSender,

    #[error("Transaction already exists in the blockchain")]
    AlreadyMined,

    #[error("Fee transactions are only accepted inside mined blocks")]
    FeeTransactionNotAllowed,

    #[error("Transaction already exists in the mempool")]
    AlreadyPending,

    #[error("Invalid transaction: regular transactions must spend at least one input")]
    MissingInputs,

    #[error("There are not enough transactions to create a new block")]
    NotEnoughTransactions,

    #[error("Invalid block: mempool length is not consistent with transactions in the block.")]
    MempoolInconsistent,

    #[error("Invalid block of index {index}: {reason}")]
    InvalidBlockAt { index: u64, reason: String },
}

/// Outcome of a ledger check: a message and a success flag
///
/// Failed checks carry the rejection diagnostic; successful ledger submissions
/// carry the accepted hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Validation {
    message: String,
    success: bool,
}

impl Validation {
    /// A passing check with no message
    pub fn ok() -> Self {
        Validation {
            message: String::new(),
            success: true,
        }
    }

    /// A passing check carrying a message (usually an accepted hash)
    pub fn accepted(message: impl Into<String>) -> Self {
        Validation {
            message: message.into(),
            success: true,
        }
    }

    pub fn rejected(error: ValidationError) -> Self {
        Validation {
            message: error.to_string(),
            success: false,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.success
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn into_message(self) -> String {
        self.message
    }
}

impl Default for Validation {
    fn default() -> Self {
        Validation::ok()
    }
}

impl From<ValidationError> for Validation {
    fn from(error: ValidationError) -> Self {
        Validation::rejected(error)
    }
}

/// Joins the messages of failed checks in the order they were found
pub(crate) fn join_failures<'a, I>(failures: I) -> String
where
    I: IntoIterator<Item = &'a Validation>,
{
    failures
        .into_iter()
        .map(Validation::message)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_is_valid_and_empty() {
        let validation = Validation::ok();
        assert!(validation.is_valid());
        assert_eq!(validation.message(), "");
    }

    #[test]
    fn test_rejected_uses_error_message() {
        let validation = Validation::rejected(ValidationError::InvalidNonce);
        assert!(!validation.is_valid());
        assert_eq!(validation.message(), "Invalid nonce");
    }

    #[test]
    fn test_join_failures_preserves_order() {
        let failures = vec![
            Validation::rejected(ValidationError::InvalidAmount),
            Validation::rejected(ValidationError::InvalidSignature),
        ];
        assert_eq!(join_failures(&failures), "Invalid amount, Invalid signature");
    }

    #[test]
    fn test_indexed_block_message() {
        let error = ValidationError::InvalidBlockAt {
            index: 3,
            reason: "Invalid hash".to_string(),
        };
        assert_eq!(error.to_string(), "Invalid block of index 3: Invalid hash");
    }
}
