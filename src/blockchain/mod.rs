// Blockchain module
//
// This module contains the ledger engine including:
// - Validation results and rejection reasons
// - Hashing, signatures and wallet key pairs
// - Transaction outputs, inputs and transactions
// - Block structure and proof of work
// - The ledger state machine (chain + mempool)

pub mod block;
pub mod chain;
pub mod crypto;
pub mod input;
pub mod output;
pub mod template;
pub mod transaction;
pub mod validation;

// Re-export main components for easier access
pub use block::Block;
pub use chain::{Blockchain, ChainStatus};
pub use crypto::{CryptoError, Wallet};
pub use input::TransactionInput;
pub use output::TransactionOutput;
pub use template::{BlockTemplate, TransactionSearch};
pub use transaction::{Transaction, TransactionType};
pub use validation::{Validation, ValidationError};
