//! Balance gate for new opportunities
//!
//! A token may open a new trade only when at least two exchanges hold its
//! full trade quantity. In-flight transactions are not affected.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::adapters::BalanceMap;
use crate::config::{AppConfig, TokenConfig};

/// Minimum number of exchanges that must hold the trade quantity
pub const MIN_FUNDED_EXCHANGES: usize = 2;

/// Exchanges whose free balance covers the token's trade quantity
pub fn funded_exchanges(
    token: &TokenConfig,
    balances_by_exchange: &BTreeMap<String, BalanceMap>,
) -> Vec<String> {
    balances_by_exchange
        .iter()
        .filter(|(_, balances)| {
            balances
                .get(&token.symbol)
                .map_or(false, |amount| *amount >= token.trade_quantity)
        })
        .map(|(exchange, _)| exchange.clone())
        .collect()
}

pub fn is_eligible(token: &TokenConfig, balances_by_exchange: &BTreeMap<String, BalanceMap>) -> bool {
    token.is_tradable() && funded_exchanges(token, balances_by_exchange).len() >= MIN_FUNDED_EXCHANGES
}

/// Symbols allowed to open a new transaction this cycle
pub fn eligible_tokens(
    config: &AppConfig,
    balances_by_exchange: &BTreeMap<String, BalanceMap>,
) -> BTreeSet<String> {
    config
        .tokens
        .iter()
        .filter(|token| {
            let eligible = is_eligible(token, balances_by_exchange);
            if !eligible {
                debug!(token = %token.symbol, "Excluded from new opportunities");
            }
            eligible
        })
        .map(|token| token.symbol.clone())
        .collect()
}
