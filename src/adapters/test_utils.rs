//! Shared test utilities for adapter testing
//!
//! Provides a scriptable `TestMockAdapter` used by the trait, state machine
//! and coordinator test modules.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::adapters::errors::{ExchangeError, ExchangeResult};
use crate::adapters::traits::ExchangeAdapter;
use crate::adapters::types::{BalanceMap, FillStatus, PriceMap, Submission};
use crate::core::rounding::format_decimal;

/// Mutable script behind the mock
#[derive(Debug, Default)]
pub struct MockScript {
    pub prices: PriceMap,
    pub balances: BalanceMap,
    /// `Some(proceeds)` once the sell should report filled
    pub sell_fill: Option<f64>,
    pub transfer_seen: bool,
    pub buy_filled: bool,
    pub deposit_address: Option<String>,
    pub next_id: u64,
    pub calls: Vec<String>,
}

/// Scriptable mock exchange; every call is recorded
pub struct TestMockAdapter {
    pub name: &'static str,
    /// When true, placements and withdrawals are not confirmed and
    /// `validate_credentials` fails
    pub should_fail: bool,
    pub script: Arc<Mutex<MockScript>>,
}

impl TestMockAdapter {
    pub fn new(name: &'static str) -> Self {
        let script = MockScript {
            deposit_address: Some(format!("{}-deposit", name)),
            ..Default::default()
        };
        Self {
            name,
            should_fail: false,
            script: Arc::new(Mutex::new(script)),
        }
    }

    pub fn with_failure(name: &'static str) -> Self {
        let mut mock = Self::new(name);
        mock.should_fail = true;
        mock
    }

    pub fn with_price(self, token: &str, price: f64) -> Self {
        self.script.lock().unwrap().prices.insert(token.to_string(), price);
        self
    }

    pub fn with_balance(self, token: &str, balance: f64) -> Self {
        self.script.lock().unwrap().balances.insert(token.to_string(), balance);
        self
    }

    pub fn set_price(&self, token: &str, price: f64) {
        self.script.lock().unwrap().prices.insert(token.to_string(), price);
    }

    pub fn set_sell_fill(&self, proceeds: f64) {
        self.script.lock().unwrap().sell_fill = Some(proceeds);
    }

    pub fn set_transfer_seen(&self, seen: bool) {
        self.script.lock().unwrap().transfer_seen = seen;
    }

    pub fn set_buy_filled(&self, filled: bool) {
        self.script.lock().unwrap().buy_filled = filled;
    }

    pub fn set_deposit_address(&self, address: Option<&str>) {
        self.script.lock().unwrap().deposit_address = address.map(str::to_string);
    }

    /// Recorded calls, e.g. `"place_sell NULS 10 0.06"`
    pub fn calls(&self) -> Vec<String> {
        self.script.lock().unwrap().calls.clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn record(&self, call: String) -> u64 {
        let mut script = self.script.lock().unwrap();
        script.calls.push(call);
        script.next_id += 1;
        script.next_id
    }

    fn submission(&self, call: String) -> Submission {
        let id = self.record(call);
        if self.should_fail {
            Submission::not_confirmed()
        } else {
            Submission::accepted(format!("{}-{}", self.name, id))
        }
    }
}

impl Default for TestMockAdapter {
    fn default() -> Self {
        Self::new("mock")
    }
}

#[async_trait]
impl ExchangeAdapter for TestMockAdapter {
    fn exchange_name(&self) -> &'static str {
        self.name
    }

    async fn validate_credentials(&self) -> ExchangeResult<()> {
        if self.should_fail {
            Err(ExchangeError::AuthenticationFailed("mock rejection".to_string()))
        } else {
            Ok(())
        }
    }

    async fn get_prices(&self, tokens: &[String]) -> PriceMap {
        let script = self.script.lock().unwrap();
        tokens
            .iter()
            .filter_map(|t| script.prices.get(t).map(|p| (t.clone(), *p)))
            .collect()
    }

    async fn get_balances(&self, tokens: &[String]) -> BalanceMap {
        let script = self.script.lock().unwrap();
        tokens
            .iter()
            .filter_map(|t| script.balances.get(t).map(|b| (t.clone(), *b)))
            .collect()
    }

    async fn place_sell(&self, token: &str, quantity: f64, price: f64) -> Submission {
        self.submission(format!(
            "place_sell {} {} {}",
            token,
            format_decimal(quantity),
            format_decimal(price)
        ))
    }

    async fn check_sold(&self, token: &str, tx_id: &str) -> FillStatus {
        let fill = self.script.lock().unwrap().sell_fill;
        self.record(format!("check_sold {} {}", token, tx_id));
        match fill {
            Some(proceeds) => FillStatus::filled(proceeds),
            None => FillStatus::pending(),
        }
    }

    async fn start_transfer(&self, asset: &str, destination: &str, amount: f64) -> Submission {
        self.submission(format!(
            "start_transfer {} {} {}",
            asset,
            destination,
            format_decimal(amount)
        ))
    }

    async fn check_transferred(&self, expected_amount: f64) -> bool {
        let seen = self.script.lock().unwrap().transfer_seen;
        self.record(format!("check_transferred {}", format_decimal(expected_amount)));
        seen
    }

    async fn place_buy(&self, token: &str, quantity: f64, price: f64) -> Submission {
        self.submission(format!(
            "place_buy {} {} {}",
            token,
            format_decimal(quantity),
            format_decimal(price)
        ))
    }

    async fn check_bought(&self, token: &str, tx_id: &str) -> bool {
        let filled = self.script.lock().unwrap().buy_filled;
        self.record(format!("check_bought {} {}", token, tx_id));
        filled
    }

    async fn deposit_address(&self, asset: &str) -> Option<String> {
        let address = self.script.lock().unwrap().deposit_address.clone();
        self.record(format!("deposit_address {}", asset));
        address
    }
}
