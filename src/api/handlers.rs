use actix_web::{web, HttpResponse, Responder};
use log::error;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::blockchain::{
    Block, BlockTemplate, Blockchain, ChainStatus, CryptoError, Transaction, TransactionOutput,
    TransactionSearch, Validation, Wallet,
};

/// Data structure for the blockchain state
pub type BlockchainData = web::Data<Blockchain>;

/// Error body returned for every failed request
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

fn bad_request(message: impl Into<String>) -> HttpResponse {
    HttpResponse::BadRequest().json(ErrorResponse {
        error: message.into(),
    })
}

fn not_found(message: &str) -> HttpResponse {
    HttpResponse::NotFound().json(ErrorResponse {
        error: message.to_string(),
    })
}

fn malformed(err: CryptoError) -> HttpResponse {
    bad_request(format!("Malformed key material: {}", err))
}

/// Maps a ledger outcome to a response, answering `on_success` when accepted
fn respond<T: Serialize>(outcome: Result<Validation, CryptoError>, on_success: &T) -> HttpResponse {
    match outcome {
        Ok(validation) if validation.is_valid() => HttpResponse::Created().json(on_success),
        Ok(validation) => bad_request(validation.into_message()),
        Err(err) => malformed(err),
    }
}

/// Get the chain status
///
/// Returns mempool size, chain length, next index, tip hash and overall validity
#[utoipa::path(
    get,
    path = "/api/v1/status",
    responses(
        (status = 200, description = "Status retrieved successfully", body = ChainStatus),
        (status = 500, description = "Chain holds malformed key material")
    )
)]
pub async fn get_status(blockchain: BlockchainData) -> impl Responder {
    match blockchain.status() {
        Ok(status) => HttpResponse::Ok().json(status),
        Err(err) => {
            error!("Chain validation failed on malformed key material: {}", err);
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: err.to_string(),
            })
        }
    }
}

/// Get the next block to mine
///
/// Returns a block template, or null while too few transactions are pending
#[utoipa::path(
    get,
    path = "/api/v1/blocks/next",
    responses(
        (status = 200, description = "Block template, or null when not enough transactions are pending", body = BlockTemplate)
    )
)]
pub async fn get_next_block(blockchain: BlockchainData) -> impl Responder {
    HttpResponse::Ok().json(blockchain.get_new_block_template())
}

/// Get a block
///
/// Looks a block up by its decimal index or by its hash
#[utoipa::path(
    get,
    path = "/api/v1/blocks/{index_or_hash}",
    responses(
        (status = 200, description = "Block found", body = Block),
        (status = 404, description = "Block not found", body = ErrorResponse)
    )
)]
pub async fn get_block(
    blockchain: BlockchainData,
    index_or_hash: web::Path<String>,
) -> impl Responder {
    let key = index_or_hash.into_inner();

    let block = if !key.is_empty() && key.chars().all(|c| c.is_ascii_digit()) {
        key.parse().ok().and_then(|index| blockchain.block(index))
    } else {
        blockchain.block_by_hash(&key)
    };

    match block {
        Some(block) => HttpResponse::Ok().json(block),
        None => not_found("Block not found"),
    }
}

/// Submit a mined block
#[utoipa::path(
    post,
    path = "/api/v1/blocks",
    request_body = Block,
    responses(
        (status = 201, description = "Block appended", body = Block),
        (status = 400, description = "Block rejected", body = ErrorResponse)
    )
)]
pub async fn add_block(blockchain: BlockchainData, block: web::Json<Block>) -> impl Responder {
    let block = Block::from_existing(block.into_inner());
    let outcome = blockchain.add_block(block.clone());
    respond(outcome, &block)
}

/// Pending transactions summary
#[derive(Serialize, Deserialize, ToSchema)]
pub struct MempoolResponse {
    /// Transactions the next block template will contain
    pub next: Vec<Transaction>,

    /// Number of pending transactions
    pub total: usize,
}

/// Get pending transactions
#[utoipa::path(
    get,
    path = "/api/v1/transactions",
    responses(
        (status = 200, description = "Pending transactions retrieved successfully", body = MempoolResponse)
    )
)]
pub async fn get_pending_transactions(blockchain: BlockchainData) -> impl Responder {
    let response = MempoolResponse {
        next: blockchain.pending_transactions(blockchain.config().tx_per_block),
        total: blockchain.mempool_len(),
    };

    HttpResponse::Ok().json(response)
}

/// Find a transaction
///
/// Searches the mempool first, then the mined blocks
#[utoipa::path(
    get,
    path = "/api/v1/transactions/{hash}",
    responses(
        (status = 200, description = "Transaction found", body = TransactionSearch),
        (status = 404, description = "Transaction not found", body = ErrorResponse)
    )
)]
pub async fn get_transaction(
    blockchain: BlockchainData,
    hash: web::Path<String>,
) -> impl Responder {
    match blockchain.get_transaction_by_hash(&hash) {
        Some(search) => HttpResponse::Ok().json(search),
        None => not_found("Transaction not found"),
    }
}

/// Submit a transaction
#[utoipa::path(
    post,
    path = "/api/v1/transactions",
    request_body = Transaction,
    responses(
        (status = 201, description = "Transaction queued", body = Transaction),
        (status = 400, description = "Transaction rejected", body = ErrorResponse)
    )
)]
pub async fn add_transaction(
    blockchain: BlockchainData,
    transaction: web::Json<Transaction>,
) -> impl Responder {
    let transaction = Transaction::from_existing(transaction.into_inner());
    let outcome = blockchain.add_transaction(transaction.clone());
    respond(outcome, &transaction)
}

/// Spendable state of a wallet
#[derive(Serialize, Deserialize, ToSchema)]
pub struct WalletSummary {
    /// Unspent outputs paid to the wallet
    pub utxo: Vec<TransactionOutput>,

    /// Sum of the unspent outputs
    pub balance: i64,

    /// Fee expected per transaction
    pub fee: i64,
}

/// Get wallet balance
///
/// Returns the unspent outputs and balance of an address, from mined blocks only
#[utoipa::path(
    get,
    path = "/api/v1/wallet/{address}",
    responses(
        (status = 200, description = "Wallet retrieved successfully", body = WalletSummary)
    )
)]
pub async fn get_wallet(blockchain: BlockchainData, address: web::Path<String>) -> impl Responder {
    // One snapshot, so the balance always matches the listed outputs
    let utxo = blockchain.get_utxos_for(&address);
    let balance = TransactionOutput::sum(&utxo);

    HttpResponse::Ok().json(WalletSummary {
        utxo,
        balance,
        fee: blockchain.fee_per_tx(),
    })
}

/// Response for the create wallet endpoint
#[derive(Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WalletResponse {
    /// The wallet's public key (hex encoded), used as its address
    pub public_key: String,

    /// The wallet's private key (hex encoded)
    pub private_key: String,
}

/// Create a new wallet
///
/// Creates a new wallet with a random keypair
///
/// The private key must be stored by your own
#[utoipa::path(
    post,
    path = "/api/v1/wallet/new",
    responses(
        (status = 201, description = "Wallet created successfully", body = WalletResponse)
    )
)]
pub async fn create_wallet() -> impl Responder {
    let wallet = Wallet::generate();

    HttpResponse::Created().json(WalletResponse {
        public_key: wallet.public_key(),
        private_key: wallet.private_key(),
    })
}
