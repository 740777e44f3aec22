//! Exchange adapters for Binance, KuCoin and OKEx
//!
//! This module provides the capability interface the trading cycle uses
//! and one REST implementation per exchange.

pub mod binance;
pub mod errors;
pub mod factory;
mod http;
pub mod kucoin;
pub mod okex;
pub mod registry;
pub mod signing;
pub mod traits;
pub mod types;

#[cfg(test)]
pub mod test_utils;

// Re-export commonly used types for convenience
pub use errors::{ExchangeError, ExchangeResult};
pub use factory::{create_adapter, AnyAdapter};
pub use registry::{ExchangeRegistry, SharedAdapter};
pub use traits::ExchangeAdapter;
pub use types::{BalanceMap, FillStatus, OrderSide, PriceMap, Submission};
