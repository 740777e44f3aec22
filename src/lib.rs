//! Cross-exchange token/ETH arbitrage trader
//!
//! - Exchange adapters (Binance, KuCoin, OKEx) behind one capability trait
//! - Per-token spread comparison and balance eligibility
//! - Durable seven-step transaction state machine with a flag-based halt

pub mod adapters;
pub mod config;
pub mod core;
pub mod error;
pub mod notify;
pub mod store;

pub use error::AppError;
