//! Configuration loader for flat `KEY=VALUE` lists
//!
//! The same format is accepted from a `.env`-style file, from a string, or
//! from the process environment (after `dotenvy::dotenv()` has run).

use std::collections::HashMap;
use std::path::Path;

use crate::error::AppError;

use super::types::{
    AppConfig, DiscordConfig, ExchangeCredentials, ExchangeKind, StoreBackend, TokenConfig,
};

/// Exchanges enabled when `EXCHANGES` is not set
const DEFAULT_EXCHANGES: &str = "binance,kucoin,okex";

/// Load configuration from a `.env`-style file
///
/// # Returns
/// * `Ok(AppConfig)` - Successfully loaded and validated configuration
/// * `Err(AppError)` - File not found, parse error, or validation failure
pub fn load_config(path: &Path) -> Result<AppConfig, AppError> {
    if !path.exists() {
        return Err(AppError::Config(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let iter = dotenvy::from_path_iter(path).map_err(|e| {
        AppError::Config(format!("Parse error in '{}': {}", path.display(), e))
    })?;

    let mut pairs = HashMap::new();
    for item in iter {
        let (key, value) = item.map_err(|e| {
            AppError::Config(format!("Parse error in '{}': {}", path.display(), e))
        })?;
        pairs.insert(key, value);
    }

    config_from_pairs(&pairs)
}

/// Load configuration from a `KEY=VALUE` string (useful for testing)
pub fn load_config_from_str(content: &str) -> Result<AppConfig, AppError> {
    let mut pairs = HashMap::new();
    for item in dotenvy::from_read_iter(content.as_bytes()) {
        let (key, value) = item.map_err(|e| AppError::Config(format!("Parse error: {}", e)))?;
        pairs.insert(key, value);
    }

    config_from_pairs(&pairs)
}

/// Load configuration from the process environment
pub fn load_config_from_env() -> Result<AppConfig, AppError> {
    let pairs: HashMap<String, String> = std::env::vars().collect();
    config_from_pairs(&pairs)
}

/// Build and validate an `AppConfig` from a flat key/value map
pub fn config_from_pairs(pairs: &HashMap<String, String>) -> Result<AppConfig, AppError> {
    let get = |key: &str| pairs.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

    let tokens = parse_tokens(get("TOKENS").ok_or_else(|| missing("TOKENS"))?)?;

    let percent_threshold = parse_f64("PERCENT_THRESHOLD", get("PERCENT_THRESHOLD"))?
        .ok_or_else(|| missing("PERCENT_THRESHOLD"))?;
    let notify_threshold =
        parse_f64("NOTIFY_THRESHOLD", get("NOTIFY_THRESHOLD"))?.unwrap_or(percent_threshold);

    let settlement_asset = get("SETTLEMENT_ASSET").unwrap_or("ETH").to_uppercase();

    let mut exchanges = Vec::new();
    for name in get("EXCHANGES").unwrap_or(DEFAULT_EXCHANGES).split(',') {
        if name.trim().is_empty() {
            continue;
        }
        let kind = ExchangeKind::parse(name)
            .ok_or_else(|| AppError::Config(format!("Unsupported exchange: {}", name.trim())))?;
        if exchanges.iter().any(|e: &ExchangeCredentials| e.kind == kind) {
            continue;
        }
        let prefix = kind.env_prefix();
        let key = |suffix: &str| format!("{}_{}", prefix, suffix);

        exchanges.push(ExchangeCredentials {
            kind,
            base_url: get(&key("URL"))
                .unwrap_or(kind.default_url())
                .trim_end_matches('/')
                .to_string(),
            api_key: get(&key("KEY")).unwrap_or_default().to_string(),
            api_secret: get(&key("SECRET")).unwrap_or_default().to_string(),
            passphrase: get(&key("PASSPHRASE")).map(str::to_string),
            trade_password: get(&key("TRADEPW")).map(str::to_string),
            withdrawal_fee: parse_f64(&key("FEE"), get(&key("FEE")))?.unwrap_or(0.0),
        });
    }

    let store_backend = match get("STORE_BACKEND").map(|s| s.to_lowercase()) {
        None => StoreBackend::Supabase,
        Some(ref s) if s == "supabase" => StoreBackend::Supabase,
        Some(ref s) if s == "memory" => StoreBackend::Memory,
        Some(other) => {
            return Err(AppError::Config(format!("Unsupported STORE_BACKEND: {}", other)));
        }
    };

    let discord = match (get("DISCORD_TOKEN"), get("DISCORD_CHANNEL_ID")) {
        (Some(token), Some(channel_id)) => Some(DiscordConfig {
            token: token.to_string(),
            channel_id: channel_id.to_string(),
        }),
        _ => None,
    };

    let config = AppConfig {
        tokens,
        percent_threshold,
        notify_threshold,
        settlement_asset,
        exchanges,
        store_backend,
        discord,
    };

    config.validate()?;

    Ok(config)
}

/// Parse `SYM:qty,SYM:qty` (spaces ignored)
pub fn parse_tokens(raw: &str) -> Result<Vec<TokenConfig>, AppError> {
    let no_spaces: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let mut tokens: Vec<TokenConfig> = Vec::new();

    for pair in no_spaces.split(',').filter(|p| !p.is_empty()) {
        let (symbol, quantity) = pair.split_once(':').ok_or_else(|| {
            AppError::Config(format!("TOKENS entry '{}' must be SYMBOL:QUANTITY", pair))
        })?;

        let trade_quantity: f64 = quantity.parse().map_err(|_| {
            AppError::Config(format!("TOKENS entry '{}': invalid quantity '{}'", pair, quantity))
        })?;

        let symbol = symbol.to_uppercase();
        if tokens.iter().any(|t| t.symbol == symbol) {
            return Err(AppError::Config(format!("TOKENS lists '{}' twice", symbol)));
        }

        tokens.push(TokenConfig { symbol, trade_quantity });
    }

    Ok(tokens)
}

fn parse_f64(key: &str, value: Option<&str>) -> Result<Option<f64>, AppError> {
    value
        .map(|v| {
            v.parse::<f64>()
                .map_err(|_| AppError::Config(format!("{} must be a number (got '{}')", key, v)))
        })
        .transpose()
}

fn missing(key: &str) -> AppError {
    AppError::Config(format!("Missing required key: {}", key))
}

// ============================================================================
// Tests
// ============================================================================
