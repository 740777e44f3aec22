//! Application-wide constants and configuration defaults
//!
//! This module centralizes tunable values that are not part of the trading
//! configuration proper. Values can be overridden via environment variables.

use std::time::Duration;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

// =============================================================================
// Scheduling
// =============================================================================

/// Interval between trading cycles (default: 60 seconds)
///
/// Environment variable: `CYCLE_INTERVAL_SECS`
pub fn cycle_interval() -> Duration {
    Duration::from_secs(env_or("CYCLE_INTERVAL_SECS", 60u64).max(1))
}

/// UTC hour at which the daily balance snapshot and summary run (default: 0)
///
/// Environment variable: `DAILY_SUMMARY_HOUR`
pub fn daily_summary_hour() -> u32 {
    env_or("DAILY_SUMMARY_HOUR", 0u32).min(23)
}

/// Minimum time between two operator alerts for the same token (default: 60 minutes)
///
/// Environment variable: `OPERATOR_ALERT_MINUTES`
pub fn operator_alert_interval() -> Duration {
    Duration::from_secs(env_or("OPERATOR_ALERT_MINUTES", 60u64) * 60)
}

// =============================================================================
// Network
// =============================================================================

/// Timeout for every exchange, store and notification request (default: 10000ms)
///
/// Environment variable: `HTTP_TIMEOUT_MS`
pub fn http_timeout() -> Duration {
    Duration::from_millis(env_or("HTTP_TIMEOUT_MS", 10_000u64))
}

// =============================================================================
// Trading Safety
// =============================================================================

/// Percent above the per-trade quantity a buy must reach to be profitable (default: 4)
///
/// A token traded 10 units at a time needs at least 10.4 units on the buy leg.
///
/// Environment variable: `BUY_QUANTITY_MARGIN`
pub fn buy_quantity_margin() -> f64 {
    env_or("BUY_QUANTITY_MARGIN", 4.0f64)
}

/// Decimal places used when matching a transferred amount (default: 6)
///
/// Environment variable: `TRANSFER_AMOUNT_DECIMALS`
pub fn transfer_amount_decimals() -> u32 {
    env_or("TRANSFER_AMOUNT_DECIMALS", 6u32)
}

/// Decimal places kept on computed buy quantities (default: 4)
///
/// Environment variable: `QUANTITY_DECIMALS`
pub fn quantity_decimals() -> u32 {
    env_or("QUANTITY_DECIMALS", 4u32)
}

/// Decimal places kept on stored spreads
pub const DIFFERENCE_DECIMALS: u32 = 2;

/// Decimal places shown for spreads in notification text
pub const NOTIFICATION_DECIMALS: u32 = 0;

// =============================================================================
// Helper Functions
// =============================================================================

/// Print all configuration values (for startup logs)
pub fn log_configuration() {
    tracing::info!("=== Engine Constants ===");
    tracing::info!("  - Cycle interval: {:?}", cycle_interval());
    tracing::info!("  - Daily summary hour (UTC): {}", daily_summary_hour());
    tracing::info!("  - Operator alert interval: {:?}", operator_alert_interval());
    tracing::info!("  - HTTP timeout: {:?}", http_timeout());
    tracing::info!("  - Buy quantity margin: {}%", buy_quantity_margin());
    tracing::info!("  - Transfer amount decimals: {}", transfer_amount_decimals());
    tracing::info!("  - Quantity decimals: {}", quantity_decimals());
    tracing::info!("========================");
}
