//! Cross-exchange spread computation
//!
//! Quotes are iterated in lexicographic exchange order and min/max only move
//! on a strictly better price, so on a tie the alphabetically first exchange
//! wins. Zero, negative and non-finite quotes mean "pair not offered" and are
//! dropped before the search.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::adapters::PriceMap;
use crate::config::constants::{DIFFERENCE_DECIMALS, NOTIFICATION_DECIMALS};
use crate::core::rounding::to_fixed;
use crate::core::types::Comparison;

/// Largest storable spread; a positive minimum can never reach 100%
const MAX_DIFFERENCE: f64 = 99.99;

/// Prices for one token keyed by exchange name
pub type TokenQuotes = BTreeMap<String, f64>;

/// Regroup per-exchange price maps into per-token quote books
pub fn quotes_by_token(
    tokens: &[String],
    prices_by_exchange: &BTreeMap<String, PriceMap>,
) -> BTreeMap<String, TokenQuotes> {
    let mut books = BTreeMap::new();
    for token in tokens {
        let quotes: TokenQuotes = prices_by_exchange
            .iter()
            .filter_map(|(exchange, prices)| prices.get(token).map(|p| (exchange.clone(), *p)))
            .collect();
        books.insert(token.clone(), quotes);
    }
    books
}

/// Spread for one token, `None` when no exchange offers a usable quote
pub fn compare_token(token: &str, quotes: &TokenQuotes, now: DateTime<Utc>) -> Option<Comparison> {
    let mut min: Option<(&String, f64)> = None;
    let mut max: Option<(&String, f64)> = None;

    for (exchange, &price) in quotes.iter().filter(|(_, p)| p.is_finite() && **p > 0.0) {
        if min.map_or(true, |(_, m)| price < m) {
            min = Some((exchange, price));
        }
        if max.map_or(true, |(_, m)| price > m) {
            max = Some((exchange, price));
        }
    }

    let ((min_exchange, min_price), (max_exchange, max_price)) = (min?, max?);
    let difference = spread_percent(min_price, max_price);

    Some(Comparison {
        token: token.to_string(),
        min_price,
        max_price,
        min_exchange: min_exchange.clone(),
        max_exchange: max_exchange.clone(),
        difference,
        timestamp: now,
    })
}

/// Comparisons for every token with at least one usable quote
pub fn compare_all(
    tokens: &[String],
    prices_by_exchange: &BTreeMap<String, PriceMap>,
) -> BTreeMap<String, Comparison> {
    let now = Utc::now();
    quotes_by_token(tokens, prices_by_exchange)
        .iter()
        .filter_map(|(token, quotes)| compare_token(token, quotes, now).map(|c| (token.clone(), c)))
        .collect()
}

/// `(1 - min/max) * 100` at storage precision, kept inside [0, 100)
pub fn spread_percent(min_price: f64, max_price: f64) -> f64 {
    if max_price <= 0.0 {
        return 0.0;
    }
    let raw = (1.0 - min_price / max_price) * 100.0;
    to_fixed(raw, DIFFERENCE_DECIMALS).clamp(0.0, MAX_DIFFERENCE)
}

/// Spread as shown to humans (whole percent)
pub fn notification_difference(comparison: &Comparison) -> f64 {
    to_fixed(
        (1.0 - comparison.min_price / comparison.max_price) * 100.0,
        NOTIFICATION_DECIMALS,
    )
}

/// `"NULS 17% difference between ex1(min) and ex2(max) on ETH pair"`
pub fn alert_line(comparison: &Comparison, settlement_asset: &str) -> String {
    format!(
        "{} {:.0}% difference between {}(min) and {}(max) on {} pair",
        comparison.token,
        notification_difference(comparison),
        comparison.min_exchange,
        comparison.max_exchange,
        settlement_asset
    )
}
