//! Exchange adapter trait definition
//!
//! The ExchangeAdapter trait is the single capability surface the trading
//! cycle talks to. One implementation exists per exchange; the cycle never
//! branches on exchange names.
//!
//! Every capability method is fail-closed: transport or parse failures are
//! logged inside the adapter and reported as "nothing happened yet"
//! (empty map, `accepted == false`, `filled == false`). Only
//! `validate_credentials` surfaces an error, because a bad key at startup
//! is fatal.

use async_trait::async_trait;
use tracing::warn;

use crate::adapters::errors::ExchangeResult;
use crate::adapters::types::{BalanceMap, FillStatus, PriceMap, Submission};

/// Common trait for all exchange adapters
#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    /// Exchange identifier ("binance", "kucoin", "okex", ...)
    fn exchange_name(&self) -> &'static str;

    /// Make one authenticated read to prove the configured keys work
    async fn validate_credentials(&self) -> ExchangeResult<()>;

    /// Latest quote for each requested token against the settlement asset
    ///
    /// Tokens the exchange does not list are simply absent from the map.
    async fn get_prices(&self, tokens: &[String]) -> PriceMap;

    /// Free balance for each requested token
    async fn get_balances(&self, tokens: &[String]) -> BalanceMap;

    /// Submit a limit sell of `quantity` units at `price`
    async fn place_sell(&self, token: &str, quantity: f64, price: f64) -> Submission;

    /// Inspect a sell order; `proceeds` is the realized settlement amount
    async fn check_sold(&self, token: &str, tx_id: &str) -> FillStatus;

    /// Withdraw `amount` of `asset` to `destination`
    async fn start_transfer(&self, asset: &str, destination: &str, amount: f64) -> Submission;

    /// True once a successful settlement-asset deposit of `expected_amount`
    /// (compared at the transfer rounding precision) is visible
    async fn check_transferred(&self, expected_amount: f64) -> bool;

    /// Submit a limit buy of `quantity` units at `price`
    async fn place_buy(&self, token: &str, quantity: f64, price: f64) -> Submission;

    /// True once the buy order is fully executed
    async fn check_bought(&self, token: &str, tx_id: &str) -> bool;

    /// Deposit address on this exchange for `asset`
    async fn deposit_address(&self, asset: &str) -> Option<String>;
}

/// Collapse an internal result into the fail-closed outcome, logging the cause
pub(crate) fn fail_closed<T>(
    exchange: &'static str,
    operation: &'static str,
    result: ExchangeResult<T>,
    fallback: T,
) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            warn!(exchange = exchange, operation = operation, error = %e, "Exchange call failed");
            fallback
        }
    }
}
