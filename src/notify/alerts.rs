//! Message composition for spread alerts and the daily summary

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::adapters::BalanceMap;
use crate::core::comparison::{alert_line, notification_difference};
use crate::core::types::{Comparison, Subscriber};

/// Operator alert: one line per token whose stored spread reaches `threshold`
pub fn threshold_alert(
    comparisons: &BTreeMap<String, Comparison>,
    threshold: f64,
    settlement_asset: &str,
) -> Option<String> {
    let lines: Vec<String> = comparisons
        .values()
        .filter(|c| c.difference >= threshold)
        .map(|c| alert_line(c, settlement_asset))
        .collect();
    (!lines.is_empty()).then(|| lines.join("\n"))
}

/// Subscriber alert: watched tokens whose whole-percent spread reaches the
/// subscriber's threshold
pub fn subscriber_alert(
    subscriber: &Subscriber,
    comparisons: &BTreeMap<String, Comparison>,
    settlement_asset: &str,
) -> Option<String> {
    let lines: Vec<String> = comparisons
        .iter()
        .filter(|(token, _)| subscriber.tokens.iter().any(|t| t.eq_ignore_ascii_case(token)))
        .filter(|(_, c)| notification_difference(c) >= subscriber.threshold)
        .map(|(_, c)| alert_line(c, settlement_asset))
        .collect();
    (!lines.is_empty()).then(|| lines.join("\n"))
}

/// Largest spread per token within a comparison history
pub fn max_spreads(history: &[Comparison]) -> BTreeMap<String, Comparison> {
    let mut best: BTreeMap<String, Comparison> = BTreeMap::new();
    for comparison in history {
        let replace = best
            .get(&comparison.token)
            .map_or(true, |current| comparison.difference > current.difference);
        if replace {
            best.insert(comparison.token.clone(), comparison.clone());
        }
    }
    best
}

/// Per-token balances across exchanges and the largest spread of the last day
pub fn daily_summary(
    tokens: &[String],
    balances_by_exchange: &BTreeMap<String, BalanceMap>,
    history: &[Comparison],
    settlement_asset: &str,
) -> String {
    let spreads = max_spreads(history);
    let mut message = format!("Daily summary ({} pairs)", settlement_asset);

    for token in tokens {
        let holdings: Vec<String> = balances_by_exchange
            .iter()
            .filter_map(|(exchange, balances)| {
                balances.get(token).map(|amount| format!("{} {}", exchange, amount))
            })
            .collect();
        let holdings = if holdings.is_empty() {
            "no balances".to_string()
        } else {
            holdings.join(", ")
        };

        let _ = write!(message, "\n{}: {}", token, holdings);
        match spreads.get(token) {
            Some(c) => {
                let _ = write!(
                    message,
                    " | max spread 24h: {}% ({}(min) / {}(max))",
                    c.difference, c.min_exchange, c.max_exchange
                );
            }
            None => message.push_str(" | max spread 24h: n/a"),
        }
    }

    message
}
