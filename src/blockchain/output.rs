use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::crypto::sha256_hex;
use super::transaction::total;
use super::validation::{Validation, ValidationError};

/// A claim of value payable to an address
///
/// `owning_tx_hash` is stamped by the transaction that creates the output and
/// identifies the output when it is later spent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransactionOutput {
    /// Hex public key of the recipient
    pub to_address: String,

    /// Value paid to the recipient
    pub amount: i64,

    /// Hash of the transaction that created this output
    #[serde(default)]
    pub owning_tx_hash: String,
}

impl TransactionOutput {
    /// Creates an output not yet attached to a transaction
    pub fn new(to_address: impl Into<String>, amount: i64) -> Self {
        TransactionOutput {
            to_address: to_address.into(),
            amount,
            owning_tx_hash: String::new(),
        }
    }

    /// Digest over the recipient and amount
    pub fn compute_hash(&self) -> String {
        sha256_hex(&format!("{}{}", self.to_address, self.amount))
    }

    /// Sum of the amounts of `outputs`, saturating at the `i64` bounds
    pub fn sum(outputs: &[TransactionOutput]) -> i64 {
        let sum = total(outputs.iter().map(|output| output.amount));
        i64::try_from(sum).unwrap_or(if sum > 0 { i64::MAX } else { i64::MIN })
    }

    pub fn validate(&self) -> Validation {
        if self.to_address.is_empty() {
            return ValidationError::EmptyToAddress.into();
        }
        if self.owning_tx_hash.is_empty() {
            return ValidationError::EmptyOwningTxHash.into();
        }
        if self.amount <= 0 {
            return ValidationError::NonPositiveOutputAmount.into();
        }

        Validation::ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stamped(to: &str, amount: i64) -> TransactionOutput {
        TransactionOutput {
            owning_tx_hash: "tx hash".to_string(),
            ..TransactionOutput::new(to, amount)
        }
    }

    #[test]
    fn test_sum_saturates() {
        assert_eq!(TransactionOutput::sum(&[]), 0);
        assert_eq!(
            TransactionOutput::sum(&[stamped("a", 3), stamped("a", 4)]),
            7
        );
        assert_eq!(
            TransactionOutput::sum(&[stamped("a", i64::MAX), stamped("a", 1)]),
            i64::MAX
        );
    }

    #[test]
    fn test_valid_output() {
        assert!(stamped("address", 10).validate().is_valid());
    }

    #[test]
    fn test_rejects_empty_address() {
        let validation = stamped("", 10).validate();
        assert!(!validation.is_valid());
        assert_eq!(
            validation.message(),
            "Invalid transaction output: toAddress must be a valid public key"
        );
    }

    #[test]
    fn test_rejects_missing_owning_hash() {
        let validation = TransactionOutput::new("address", 10).validate();
        assert_eq!(
            validation.message(),
            "Invalid transaction output: txHash must be a valid hash"
        );
    }

    #[test]
    fn test_rejects_non_positive_amount() {
        assert!(!stamped("address", 0).validate().is_valid());
        assert!(!stamped("address", -5).validate().is_valid());
    }

    #[test]
    fn test_hash_ignores_owning_hash() {
        let a = stamped("address", 10);
        let b = TransactionOutput::new("address", 10);
        assert_eq!(a.compute_hash(), b.compute_hash());
        assert_eq!(a.compute_hash().len(), 64);
    }
}
