use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::crypto::{sha256_digest, sign_digest, verify_signature, CryptoError};
use super::output::TransactionOutput;
use super::validation::{Validation, ValidationError};

/// A reference to an earlier output being spent, signed by its owner
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransactionInput {
    /// Hex public key of the spender
    pub from_address: String,

    /// Value being spent, equal to the referenced output's amount
    pub amount: i64,

    /// Owning hash of the output being spent
    pub previous_tx_hash: String,

    /// Hex signature over the input digest, empty until signed
    #[serde(default)]
    pub signature: String,
}

impl TransactionInput {
    /// Creates an unsigned input
    pub fn new(from_address: impl Into<String>, amount: i64, previous_tx_hash: impl Into<String>) -> Self {
        TransactionInput {
            from_address: from_address.into(),
            amount,
            previous_tx_hash: previous_tx_hash.into(),
            signature: String::new(),
        }
    }

    /// Builds an unsigned input spending `output`
    pub fn from_output(output: &TransactionOutput) -> Self {
        TransactionInput::new(
            output.to_address.clone(),
            output.amount,
            output.owning_tx_hash.clone(),
        )
    }

    fn digest(&self) -> [u8; 32] {
        sha256_digest(&format!(
            "{}{}{}",
            self.from_address, self.amount, self.previous_tx_hash
        ))
    }

    /// Digest over (from_address, amount, previous_tx_hash) as hex
    pub fn compute_hash(&self) -> String {
        hex::encode(self.digest())
    }

    /// Signs the input digest with a hex private key
    pub fn sign(&mut self, private_key: &str) -> Result<(), CryptoError> {
        self.signature = sign_digest(&self.digest(), private_key)?;
        Ok(())
    }

    /// Checks the input in a fixed order: previous hash, signature presence,
    /// amount, then cryptographic verification
    pub fn validate(&self) -> Result<Validation, CryptoError> {
        if self.previous_tx_hash.is_empty() {
            return Ok(ValidationError::InvalidPreviousHash.into());
        }
        if self.signature.is_empty() {
            return Ok(ValidationError::InvalidSignature.into());
        }
        if self.amount <= 0 {
            return Ok(ValidationError::InvalidAmount.into());
        }

        if !verify_signature(&self.digest(), &self.signature, &self.from_address)? {
            return Ok(ValidationError::InvalidSignature.into());
        }

        Ok(Validation::ok())
    }
}
