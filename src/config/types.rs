//! Configuration types for the arbitrage engine
//!
//! The configuration is built once at startup from a flat key/value list,
//! validated, and then shared immutably via `Arc<AppConfig>`.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

// ============================================================================
// Type Aliases
// ============================================================================

/// Type alias for the immutable configuration handed to every component
pub type SharedConfig = Arc<AppConfig>;

// ============================================================================
// Enums
// ============================================================================

/// Supported exchanges
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeKind {
    Binance,
    Kucoin,
    Okex,
}

impl ExchangeKind {
    /// Parse an exchange identifier as written in `EXCHANGES`
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "binance" => Some(ExchangeKind::Binance),
            "kucoin" => Some(ExchangeKind::Kucoin),
            "okex" => Some(ExchangeKind::Okex),
            _ => None,
        }
    }

    /// Prefix of the per-exchange configuration keys (e.g. `KUCOIN_URL`)
    pub fn env_prefix(&self) -> &'static str {
        match self {
            ExchangeKind::Binance => "BINANCE",
            ExchangeKind::Kucoin => "KUCOIN",
            ExchangeKind::Okex => "OKEX",
        }
    }

    pub fn default_url(&self) -> &'static str {
        match self {
            ExchangeKind::Binance => "https://api.binance.com",
            ExchangeKind::Kucoin => "https://api.kucoin.com",
            ExchangeKind::Okex => "https://www.okex.com",
        }
    }
}

impl std::fmt::Display for ExchangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExchangeKind::Binance => write!(f, "binance"),
            ExchangeKind::Kucoin => write!(f, "kucoin"),
            ExchangeKind::Okex => write!(f, "okex"),
        }
    }
}

/// Persistence backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    #[default]
    Supabase,
    /// In-process store, nothing survives a restart (dry runs)
    Memory,
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// A tracked token and the number of units sold per trade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenConfig {
    pub symbol: String,
    /// Units sold per trade; 0 means "track price only, never trade"
    pub trade_quantity: f64,
}

impl TokenConfig {
    pub fn is_tradable(&self) -> bool {
        self.trade_quantity > 0.0
    }
}

/// Credentials and fee for one exchange
#[derive(Debug, Clone)]
pub struct ExchangeCredentials {
    pub kind: ExchangeKind,
    pub base_url: String,
    pub api_key: String,
    pub api_secret: String,
    /// OKEx API passphrase
    pub passphrase: Option<String>,
    /// OKEx fund password required for withdrawals
    pub trade_password: Option<String>,
    /// Withdrawal fee in settlement-asset units
    pub withdrawal_fee: f64,
}

/// Discord bot destination for operator messages
#[derive(Debug, Clone)]
pub struct DiscordConfig {
    pub token: String,
    pub channel_id: String,
}

/// Root application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Tracked tokens in configuration order
    pub tokens: Vec<TokenConfig>,
    /// Spread (percent) at or above which a new trade is opened
    pub percent_threshold: f64,
    /// Spread (percent) at or above which the operator is alerted
    pub notify_threshold: f64,
    /// Common quote currency (e.g. "ETH")
    pub settlement_asset: String,
    /// Enabled exchanges
    pub exchanges: Vec<ExchangeCredentials>,
    pub store_backend: StoreBackend,
    pub discord: Option<DiscordConfig>,
}

impl AppConfig {
    /// Validate all configuration rules
    pub fn validate(&self) -> Result<(), AppError> {
        if self.tokens.is_empty() {
            return Err(AppError::Config(
                "TOKENS must contain at least one token".to_string(),
            ));
        }

        for token in &self.tokens {
            if token.symbol.trim().is_empty() {
                return Err(AppError::Config("Token symbol cannot be empty".to_string()));
            }
            if token.trade_quantity < 0.0 || !token.trade_quantity.is_finite() {
                return Err(AppError::Config(format!(
                    "Token '{}': trade quantity must be >= 0 (got {})",
                    token.symbol, token.trade_quantity
                )));
            }
        }

        if self.percent_threshold <= 0.0 || self.percent_threshold >= 100.0 {
            return Err(AppError::Config(format!(
                "PERCENT_THRESHOLD must be > 0 and < 100 (got {})",
                self.percent_threshold
            )));
        }

        if self.notify_threshold <= 0.0 || self.notify_threshold > self.percent_threshold {
            return Err(AppError::Config(format!(
                "NOTIFY_THRESHOLD ({}) must be > 0 and <= PERCENT_THRESHOLD ({})",
                self.notify_threshold, self.percent_threshold
            )));
        }

        if self.settlement_asset.trim().is_empty() {
            return Err(AppError::Config("SETTLEMENT_ASSET cannot be empty".to_string()));
        }

        if self.exchanges.len() < 2 {
            return Err(AppError::Config(format!(
                "At least two exchanges are required for arbitrage (got {})",
                self.exchanges.len()
            )));
        }

        for exchange in &self.exchanges {
            if exchange.api_key.is_empty() || exchange.api_secret.is_empty() {
                return Err(AppError::Config(format!(
                    "{}: {}_KEY and {}_SECRET are required",
                    exchange.kind,
                    exchange.kind.env_prefix(),
                    exchange.kind.env_prefix()
                )));
            }
            if exchange.withdrawal_fee < 0.0 {
                return Err(AppError::Config(format!(
                    "{}: withdrawal fee cannot be negative (got {})",
                    exchange.kind, exchange.withdrawal_fee
                )));
            }
            if exchange.kind == ExchangeKind::Okex && exchange.passphrase.is_none() {
                return Err(AppError::Config(
                    "okex: OKEX_PASSPHRASE is required".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Look up a tracked token
    pub fn token(&self, symbol: &str) -> Option<&TokenConfig> {
        self.tokens.iter().find(|t| t.symbol == symbol)
    }

    /// Per-trade quantity for a token (0 when untracked)
    pub fn trade_quantity(&self, symbol: &str) -> f64 {
        self.token(symbol).map(|t| t.trade_quantity).unwrap_or(0.0)
    }

    /// Symbols of every tracked token
    pub fn token_symbols(&self) -> Vec<String> {
        self.tokens.iter().map(|t| t.symbol.clone()).collect()
    }

    /// Withdrawal fee table keyed by exchange name
    pub fn fee_table(&self) -> BTreeMap<String, f64> {
        self.exchanges
            .iter()
            .map(|e| (e.kind.to_string(), e.withdrawal_fee))
            .collect()
    }

    /// Withdrawal fee for one exchange (0 when unknown)
    pub fn withdrawal_fee(&self, exchange: &str) -> f64 {
        self.exchanges
            .iter()
            .find(|e| e.kind.to_string() == exchange)
            .map(|e| e.withdrawal_fee)
            .unwrap_or(0.0)
    }

    /// Convert to the shared immutable wrapper
    pub fn into_shared(self) -> SharedConfig {
        Arc::new(self)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    fn credentials(kind: ExchangeKind, fee: f64) -> ExchangeCredentials {
        ExchangeCredentials {
            kind,
            base_url: kind.default_url().to_string(),
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
            passphrase: Some("pass".to_string()),
            trade_password: None,
            withdrawal_fee: fee,
        }
    }

    pub(crate) fn create_valid_config() -> AppConfig {
        AppConfig {
            tokens: vec![
                TokenConfig { symbol: "NULS".to_string(), trade_quantity: 10.0 },
                TokenConfig { symbol: "REQ".to_string(), trade_quantity: 0.0 },
            ],
            percent_threshold: 10.0,
            notify_threshold: 5.0,
            settlement_asset: "ETH".to_string(),
            exchanges: vec![
                credentials(ExchangeKind::Binance, 0.01),
                credentials(ExchangeKind::Kucoin, 0.005),
            ],
            store_backend: StoreBackend::Memory,
            discord: None,
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(create_valid_config().validate().is_ok());
    }

    #[test]
    fn test_empty_tokens_fails() {
        let mut config = create_valid_config();
        config.tokens.clear();
        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("at least one token"));
    }

    #[test]
    fn test_threshold_out_of_range_fails() {
        let mut config = create_valid_config();
        config.percent_threshold = 0.0;
        assert!(config.validate().is_err());

        config.percent_threshold = 100.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_notify_threshold_above_trading_threshold_fails() {
        let mut config = create_valid_config();
        config.notify_threshold = 12.0;
        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("NOTIFY_THRESHOLD"));
    }

    #[test]
    fn test_single_exchange_fails() {
        let mut config = create_valid_config();
        config.exchanges.truncate(1);
        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("At least two exchanges"));
    }

    #[test]
    fn test_missing_credentials_fail() {
        let mut config = create_valid_config();
        config.exchanges[1].api_secret.clear();
        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("KUCOIN_SECRET"));
    }

    #[test]
    fn test_okex_requires_passphrase() {
        let mut config = create_valid_config();
        let mut okex = credentials(ExchangeKind::Okex, 0.0);
        okex.passphrase = None;
        config.exchanges.push(okex);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_trade_quantity_lookup() {
        let config = create_valid_config();
        assert_eq!(config.trade_quantity("NULS"), 10.0);
        assert_eq!(config.trade_quantity("REQ"), 0.0);
        assert_eq!(config.trade_quantity("UNKNOWN"), 0.0);
        assert!(!config.token("REQ").unwrap().is_tradable());
    }

    #[test]
    fn test_fee_table() {
        let config = create_valid_config();
        let fees = config.fee_table();
        assert_eq!(fees.get("binance"), Some(&0.01));
        assert_eq!(config.withdrawal_fee("kucoin"), 0.005);
        assert_eq!(config.withdrawal_fee("okex"), 0.0);
    }

    #[test]
    fn test_exchange_kind_parse_and_display() {
        assert_eq!(ExchangeKind::parse(" KuCoin "), Some(ExchangeKind::Kucoin));
        assert_eq!(ExchangeKind::parse("bitz"), None);
        assert_eq!(ExchangeKind::Okex.to_string(), "okex");
        assert_eq!(ExchangeKind::Binance.env_prefix(), "BINANCE");
    }
}
