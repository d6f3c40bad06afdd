// API module
//
// This module contains the HTTP request layer in front of the ledger

pub mod handlers;
pub mod routes;

// Re-export main components for easier access
pub use routes::configure_routes;
