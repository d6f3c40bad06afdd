use actix_web::web;

use super::handlers;

/// Configures the API routes
///
/// # Arguments
///
/// * `cfg` - The service configuration
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/status", web::get().to(handlers::get_status))
            // Registered before the catch-all block lookup
            .route("/blocks/next", web::get().to(handlers::get_next_block))
            .route("/blocks/{index_or_hash}", web::get().to(handlers::get_block))
            .route("/blocks", web::post().to(handlers::add_block))
            .route("/transactions", web::get().to(handlers::get_pending_transactions))
            .route("/transactions", web::post().to(handlers::add_transaction))
            .route("/transactions/{hash}", web::get().to(handlers::get_transaction))
            .route("/wallet/new", web::post().to(handlers::create_wallet))
            .route("/wallet/{address}", web::get().to(handlers::get_wallet))
    );
}
