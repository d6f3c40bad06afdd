use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use std::fmt;

use super::crypto::{sha256_hex, CryptoError};
use super::input::TransactionInput;
use super::output::TransactionOutput;
use super::validation::{join_failures, Validation, ValidationError};

/// Kind of transaction: a value transfer or a block reward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    Regular,
    Fee,
}

impl Default for TransactionType {
    fn default() -> Self {
        TransactionType::Regular
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionType::Regular => write!(f, "REGULAR"),
            TransactionType::Fee => write!(f, "FEE"),
        }
    }
}

/// Represents a transaction in the blockchain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Regular transfer or block reward
    #[serde(rename = "type", default)]
    pub tx_type: TransactionType,

    /// Creation time in milliseconds since the Unix epoch
    pub timestamp: i64,

    /// Content hash; empty on submission means "compute it"
    #[serde(default)]
    pub hash: String,

    /// Spent outputs, empty for reward transactions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<TransactionInput>,

    /// Newly created outputs
    #[serde(default)]
    pub outputs: Vec<TransactionOutput>,
}

/// Sums amounts without overflowing on adversarial values
pub(crate) fn total<I: IntoIterator<Item = i64>>(amounts: I) -> i128 {
    amounts.into_iter().map(i128::from).sum()
}

fn clamp_to_i64(value: i128) -> i64 {
    i64::try_from(value).unwrap_or(if value > 0 { i64::MAX } else { i64::MIN })
}

impl Transaction {
    /// Creates a transaction stamped with the current time
    ///
    /// The hash is computed from the contents and every output is stamped with it.
    pub fn new(
        tx_type: TransactionType,
        inputs: Vec<TransactionInput>,
        outputs: Vec<TransactionOutput>,
    ) -> Self {
        Transaction::from_parts(tx_type, Utc::now().timestamp_millis(), inputs, outputs, None)
    }

    /// Creates a transaction from explicit parts
    ///
    /// A supplied hash is kept as-is (so tampering stays detectable); a missing
    /// one is computed. Outputs are stamped with the resulting hash either way.
    pub fn from_parts(
        tx_type: TransactionType,
        timestamp: i64,
        inputs: Vec<TransactionInput>,
        outputs: Vec<TransactionOutput>,
        hash: Option<String>,
    ) -> Self {
        let mut transaction = Transaction {
            tx_type,
            timestamp,
            hash: String::new(),
            inputs,
            outputs,
        };

        transaction.hash = match hash {
            Some(hash) if !hash.is_empty() => hash,
            _ => transaction.compute_hash(),
        };
        transaction.stamp_outputs();

        transaction
    }

    /// Rebuilds a transaction received from outside (e.g. decoded JSON) with
    /// the construction rules applied
    pub fn from_existing(transaction: Transaction) -> Self {
        let Transaction {
            tx_type,
            timestamp,
            hash,
            inputs,
            outputs,
        } = transaction;

        Transaction::from_parts(tx_type, timestamp, inputs, outputs, Some(hash))
    }

    /// Builds a reward transaction paying exactly `output`
    pub fn from_reward(output: TransactionOutput) -> Self {
        Transaction::new(TransactionType::Fee, Vec::new(), vec![output])
    }

    fn stamp_outputs(&mut self) {
        for output in &mut self.outputs {
            output.owning_tx_hash = self.hash.clone();
        }
    }

    /// Digest over type, timestamp, input signatures and output hashes
    pub fn compute_hash(&self) -> String {
        let signatures: String = self.inputs.iter().map(|input| input.signature.as_str()).collect();
        let outputs: String = self.outputs.iter().map(TransactionOutput::compute_hash).collect();

        sha256_hex(&format!(
            "{}{}{}{}",
            self.tx_type, self.timestamp, signatures, outputs
        ))
    }

    /// Input total minus output total, 0 when there are no inputs
    pub fn get_fee(&self) -> i64 {
        if self.inputs.is_empty() {
            return 0;
        }

        clamp_to_i64(self.input_total() - self.output_total())
    }

    fn input_total(&self) -> i128 {
        total(self.inputs.iter().map(|input| input.amount))
    }

    fn output_total(&self) -> i128 {
        total(self.outputs.iter().map(|output| output.amount))
    }

    /// Checks if the transaction is a block reward
    pub fn is_fee(&self) -> bool {
        self.tx_type == TransactionType::Fee
    }

    /// Validates the transaction, reporting the first failing check
    ///
    /// `total_fees` is the fee budget of the enclosing block and `block_reward`
    /// the reward currently paid per block; together they bound a reward output.
    pub fn validate(&self, total_fees: i64, block_reward: i64) -> Result<Validation, CryptoError> {
        if self.hash != self.compute_hash() {
            return Ok(ValidationError::InvalidHash.into());
        }
        if self.outputs.is_empty() {
            return Ok(ValidationError::NoOutputs.into());
        }

        let invalid_outputs: Vec<Validation> = self
            .outputs
            .iter()
            .map(TransactionOutput::validate)
            .filter(|validation| !validation.is_valid())
            .collect();
        if !invalid_outputs.is_empty() {
            return Ok(ValidationError::InvalidOutputs(join_failures(&invalid_outputs)).into());
        }

        if !self.inputs.is_empty() {
            let mut invalid_inputs = Vec::new();
            for input in &self.inputs {
                let validation = input.validate()?;
                if !validation.is_valid() {
                    invalid_inputs.push(validation);
                }
            }
            if !invalid_inputs.is_empty() {
                return Ok(ValidationError::InvalidInputs(join_failures(&invalid_inputs)).into());
            }

            if self.input_total() < self.output_total() {
                return Ok(ValidationError::InsufficientInput.into());
            }
        }

        if self.outputs.iter().any(|output| output.owning_tx_hash != self.hash) {
            return Ok(ValidationError::InvalidOutputReference.into());
        }

        if self.is_fee() {
            if !self.inputs.is_empty() || self.outputs.len() != 1 {
                return Ok(ValidationError::InvalidFeeShape.into());
            }

            let ceiling = i128::from(block_reward) + i128::from(total_fees);
            if i128::from(self.outputs[0].amount) > ceiling {
                return Ok(ValidationError::InvalidFeeAmount.into());
            }
        }

        Ok(Validation::ok())
    }
}
