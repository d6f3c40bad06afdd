use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use log::{error, info};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use pow_ledger::api;
use pow_ledger::blockchain::{self, Wallet};
use pow_ledger::config::ServerConfig;

// Initialize the ledger with a genesis block paying the server wallet
fn initialize_blockchain(config: &ServerConfig) -> std::io::Result<blockchain::Blockchain> {
    let wallet = Wallet::from_private_key(&config.wallet_private_key)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

    info!("Genesis wallet address: {}", wallet.public_key());
    info!(
        "Ledger policy: difficulty {} (max {}), {} tx per block, fee {} per tx",
        config.ledger.initial_difficulty,
        config.ledger.max_difficulty,
        config.ledger.tx_per_block,
        config.ledger.fee_per_tx
    );

    Ok(blockchain::Blockchain::new(
        config.ledger.clone(),
        &wallet.public_key(),
    ))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::get_status,
        api::handlers::get_next_block,
        api::handlers::get_block,
        api::handlers::add_block,
        api::handlers::get_pending_transactions,
        api::handlers::get_transaction,
        api::handlers::add_transaction,
        api::handlers::get_wallet,
        api::handlers::create_wallet
    ),
    components(
        schemas(
            blockchain::Block,
            blockchain::BlockTemplate,
            blockchain::ChainStatus,
            blockchain::Transaction,
            blockchain::TransactionType,
            blockchain::TransactionInput,
            blockchain::TransactionOutput,
            blockchain::TransactionSearch,
            api::handlers::ErrorResponse,
            api::handlers::MempoolResponse,
            api::handlers::WalletSummary,
            api::handlers::WalletResponse
        )
    ),
    tags(
        (name = "ledger", description = "Proof-of-work ledger API endpoints")
    ),
    info(
        title = "Ledger API",
        version = "1.0.0",
        description = "A single-authority proof-of-work ledger",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
struct ApiDoc;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = ServerConfig::from_env().map_err(|e| {
        error!("Invalid configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e)
    })?;

    let blockchain = web::Data::new(initialize_blockchain(&config)?);

    info!("Starting HTTP server at http://{}:{}", config.host, config.port);

    // Start HTTP server
    HttpServer::new(move || {
        // Configure CORS
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        // Configure OpenAPI documentation
        let openapi = ApiDoc::openapi();

        App::new()
            .wrap(middleware::Logger::default())
            .wrap(cors)
            .app_data(blockchain.clone())
            // API routes
            .configure(api::configure_routes)
            // Swagger UI
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", openapi.clone())
            )
    })
    .bind((config.host.clone(), config.port))?
    .run()
    .await
}
