//! A single-authority proof-of-work ledger.
//!
//! `blockchain` holds the ledger engine (transactions, blocks, UTXO accounting and
//! the chain/mempool state machine), `config` the policy and process settings,
//! and `api` the HTTP layer exposing the ledger.

pub mod api;
pub mod blockchain;
pub mod config;
