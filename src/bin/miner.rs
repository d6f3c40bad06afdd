//! Mining driver
//!
//! Polls the ledger server for a block template, appends a reward
//! transaction paying the configured wallet, performs proof of work and
//! submits the mined block.

use anyhow::{bail, Context, Result};
use log::{info, warn};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use pow_ledger::blockchain::{Block, BlockTemplate, Transaction, TransactionOutput, Wallet};
use pow_ledger::config::MinerConfig;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

struct Miner {
    client: Client,
    config: MinerConfig,
    address: String,
}

impl Miner {
    fn new(config: MinerConfig) -> Result<Self> {
        let wallet = Wallet::from_private_key(&config.wallet_private_key)
            .context("loading miner wallet")?;

        Ok(Miner {
            client: Client::new(),
            address: wallet.public_key(),
            config,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.config.server, path)
    }

    async fn next_template(&self) -> Result<Option<BlockTemplate>> {
        let response = self
            .client
            .get(self.url("/blocks/next"))
            .send()
            .await
            .context("requesting block template")?
            .error_for_status()?;

        Ok(response.json().await?)
    }

    /// Reward paid by a block built from `template`
    ///
    /// Nothing is paid past the maximum difficulty, and the amount never
    /// exceeds what the ledger accepts for a block of this size.
    fn reward_amount(template: &BlockTemplate, fees: i64) -> i64 {
        let reward = if template.difficulty <= template.max_difficulty {
            template.reward
        } else {
            0
        };

        let count = i64::try_from(template.transactions.len()).unwrap_or(i64::MAX);
        let ceiling = reward.saturating_add(template.fee_per_tx.saturating_mul(count.saturating_add(1)));

        reward.saturating_add(fees).min(ceiling)
    }

    /// Returns the block ready to mine, or `None` when the pending fees do not
    /// cover the expected fee per transaction
    fn assemble(&self, template: &BlockTemplate) -> Option<Block> {
        let fees: i64 = template
            .transactions
            .iter()
            .map(Transaction::get_fee)
            .fold(0, i64::saturating_add);

        let count = i64::try_from(template.transactions.len()).unwrap_or(i64::MAX);
        if fees < template.fee_per_tx.saturating_mul(count) {
            return None;
        }

        let mut block = Block::from_template(template);
        block
            .transactions
            .push(Transaction::from_reward(TransactionOutput::new(
                self.address.clone(),
                Self::reward_amount(template, fees),
            )));

        Some(block)
    }

    async fn submit(&self, block: &Block) -> Result<()> {
        let response = self
            .client
            .post(self.url("/blocks"))
            .json(block)
            .send()
            .await
            .context("submitting block")?;

        let status = response.status();
        if status == StatusCode::CREATED {
            info!("Block {} accepted ({})", block.index, block.current_hash);
            return Ok(());
        }

        let body: ErrorBody = response.json().await.unwrap_or(ErrorBody {
            error: status.to_string(),
        });
        bail!("block {} rejected: {}", block.index, body.error)
    }

    async fn run(&self) -> Result<()> {
        info!("Mining for {} against {}", self.address, self.config.server);

        loop {
            let template = match self.next_template().await {
                Ok(Some(template)) => template,
                Ok(None) => {
                    tokio::time::sleep(self.config.poll_interval).await;
                    continue;
                }
                Err(err) => {
                    warn!("Could not fetch block template: {:#}", err);
                    tokio::time::sleep(self.config.poll_interval).await;
                    continue;
                }
            };

            let Some(mut block) = self.assemble(&template) else {
                warn!(
                    "Pending fees below {} per transaction, retrying later",
                    template.fee_per_tx
                );
                tokio::time::sleep(self.config.low_fee_backoff).await;
                continue;
            };

            info!(
                "Mining block {} at difficulty {} with {} transactions",
                block.index,
                template.difficulty,
                block.transactions.len()
            );

            let difficulty = template.difficulty;
            let miner = self.address.clone();
            block = tokio::task::spawn_blocking(move || {
                block.mine(difficulty, &miner);
                block
            })
            .await
            .context("mining task failed")?;

            if let Err(err) = self.submit(&block).await {
                warn!("{:#}", err);
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = MinerConfig::from_env().context("loading miner configuration")?;
    Miner::new(config)?.run().await
}
