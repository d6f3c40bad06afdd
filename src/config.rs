// Configuration module
//
// Ledger policy constants and process settings, read from the environment.

use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::blockchain::crypto::{CryptoError, Wallet};

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required setting: {0}")]
    Missing(String),

    #[error("Invalid wallet key: {0}")]
    InvalidWallet(#[from] CryptoError),
}

/// Reads `key` from the environment, falling back to `default` when unset
fn env_or<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => value.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value,
        }),
        Err(_) => Ok(default),
    }
}

/// Policy parameters owned by each ledger instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Difficulty of the genesis block
    pub initial_difficulty: u32,

    /// Difficulty above which mining no longer pays a reward
    pub max_difficulty: u32,

    /// Pending transactions required before a block template is offered
    pub tx_per_block: usize,

    /// Fee expected per transaction
    pub fee_per_tx: i64,

    /// Reward at difficulty zero
    pub base_reward: i64,

    /// Reward lost per difficulty step
    pub reward_decay_per_difficulty: i64,

    /// Blocks appended between difficulty increases
    pub difficulty_interval: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            initial_difficulty: 2,
            max_difficulty: 5,
            tx_per_block: 2,
            fee_per_tx: 1,
            base_reward: 64,
            reward_decay_per_difficulty: 10,
            difficulty_interval: 5,
        }
    }
}

impl LedgerConfig {
    /// Loads the policy, letting `LEDGER_*` variables override the defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = LedgerConfig::default();

        let config = LedgerConfig {
            initial_difficulty: env_or("LEDGER_INITIAL_DIFFICULTY", defaults.initial_difficulty)?,
            max_difficulty: env_or("LEDGER_MAX_DIFFICULTY", defaults.max_difficulty)?,
            tx_per_block: env_or("LEDGER_TX_PER_BLOCK", defaults.tx_per_block)?,
            fee_per_tx: env_or("LEDGER_FEE_PER_TX", defaults.fee_per_tx)?,
            base_reward: env_or("LEDGER_BASE_REWARD", defaults.base_reward)?,
            reward_decay_per_difficulty: env_or(
                "LEDGER_REWARD_DECAY",
                defaults.reward_decay_per_difficulty,
            )?,
            difficulty_interval: env_or(
                "LEDGER_DIFFICULTY_INTERVAL",
                defaults.difficulty_interval,
            )?,
        };
        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.tx_per_block == 0 {
            return Err(ConfigError::InvalidValue {
                key: "LEDGER_TX_PER_BLOCK".to_string(),
                value: "0".to_string(),
            });
        }
        if self.difficulty_interval == 0 {
            return Err(ConfigError::InvalidValue {
                key: "LEDGER_DIFFICULTY_INTERVAL".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    /// Block reward at `difficulty`, zero past the maximum difficulty
    pub fn reward_for(&self, difficulty: u32) -> i64 {
        if difficulty > self.max_difficulty {
            return 0;
        }

        let decay = self
            .reward_decay_per_difficulty
            .saturating_mul(i64::from(difficulty));
        self.base_reward.saturating_sub(decay).max(0)
    }

    fn interval(&self) -> u64 {
        self.difficulty_interval.max(1)
    }

    /// Difficulty in force when the block at `index` was appended
    pub fn difficulty_at(&self, index: u64) -> u32 {
        let steps = index / self.interval();
        self.initial_difficulty
            .saturating_add(u32::try_from(steps).unwrap_or(u32::MAX))
    }

    /// Whether difficulty goes up once the chain reaches `length` blocks
    ///
    /// An interval of zero behaves like an interval of one.
    pub fn raises_difficulty_at(&self, length: u64) -> bool {
        length % self.interval() == 0
    }
}

/// Settings of the ledger HTTP server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,

    /// Hex private key of the genesis miner
    pub wallet_private_key: String,

    pub ledger: LedgerConfig,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env_or("HOST", "127.0.0.1".to_string())?;
        let port = env_or("PORT", 3000u16)?;

        let wallet_private_key = match env::var("BLOCKCHAIN_WALLET") {
            Ok(key) => {
                // Reject unusable keys at startup rather than on first use
                Wallet::from_private_key(&key)?;
                key
            }
            Err(_) => {
                let wallet = Wallet::generate();
                warn!(
                    "BLOCKCHAIN_WALLET not set, generated genesis wallet {}",
                    wallet.public_key()
                );
                wallet.private_key()
            }
        };

        Ok(ServerConfig {
            host,
            port,
            wallet_private_key,
            ledger: LedgerConfig::from_env()?,
        })
    }
}

/// Settings of the mining driver
#[derive(Debug, Clone)]
pub struct MinerConfig {
    /// Base URL of the ledger server
    pub server: String,

    /// Hex private key of the wallet credited with rewards
    pub wallet_private_key: String,

    /// Delay between polls for a block template
    pub poll_interval: Duration,

    /// Delay before retrying when pending fees are too low
    pub low_fee_backoff: Duration,
}

impl MinerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let server = env_or("BLOCKCHAIN_SERVER", "http://localhost:3000".to_string())?;
        let wallet_private_key = env::var("MINER_WALLET_PRIVATE_KEY")
            .map_err(|_| ConfigError::Missing("MINER_WALLET_PRIVATE_KEY".to_string()))?;
        Wallet::from_private_key(&wallet_private_key)?;

        Ok(MinerConfig {
            server: server.trim_end_matches('/').to_string(),
            wallet_private_key,
            poll_interval: Duration::from_millis(env_or("MINER_POLL_INTERVAL_MS", 1000u64)?),
            low_fee_backoff: Duration::from_millis(env_or("MINER_LOW_FEE_BACKOFF_MS", 5000u64)?),
        })
    }
}
