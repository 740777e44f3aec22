//! Structured logging setup and credential redaction
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `RUST_LOG` | `arb_bot=info` | Log level filter (standard tracing format) |
//! | `LOG_FORMAT` | `json` | Output format: `json` or `pretty` |
//!
//! ```rust,ignore
//! use arb_bot::core::logging::{init_logging, sanitize};
//!
//! init_logging();
//! tracing::info!(api_key = %sanitize(&credentials.api_key), "Adapter ready");
//! // api_key = "abcd...REDACTED"
//! ```

use std::env;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing_subscriber::{fmt as ts_fmt, prelude::*, EnvFilter};

static LOGGING_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Default log level when RUST_LOG is not set
pub const DEFAULT_LOG_LEVEL: &str = "arb_bot=info";

/// Redacting wrapper for keys, secrets and passphrases
///
/// Values longer than 8 characters keep their first 4; shorter ones are
/// fully redacted.
#[derive(Clone)]
pub struct SanitizedValue<'a>(&'a str);

impl<'a> SanitizedValue<'a> {
    pub fn new(value: &'a str) -> Self {
        Self(value)
    }
}

impl fmt::Display for SanitizedValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.char_indices().nth(4) {
            Some((cut, _)) if self.0.chars().count() > 8 => write!(f, "{}...REDACTED", &self.0[..cut]),
            _ => write!(f, "REDACTED"),
        }
    }
}

impl fmt::Debug for SanitizedValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SanitizedValue(***)")
    }
}

pub fn sanitize(value: &str) -> SanitizedValue<'_> {
    SanitizedValue::new(value)
}

/// First 8 characters of a request signature
pub fn sanitize_signature(sig: &str) -> String {
    if sig.len() > 12 && sig.is_char_boundary(8) {
        format!("{}...", &sig[..8])
    } else {
        "REDACTED".to_string()
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Filter string (e.g. "arb_bot=debug,arb_bot::adapters=trace")
    pub level_filter: String,
    pub use_pretty_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level_filter: DEFAULT_LOG_LEVEL.to_string(),
            use_pretty_format: false,
        }
    }
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        let level_filter = env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string());
        let use_pretty_format = env::var("LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("pretty"))
            .unwrap_or(false);
        Self {
            level_filter,
            use_pretty_format,
        }
    }
}

/// Install the global subscriber from `RUST_LOG` / `LOG_FORMAT`; later calls are no-ops
pub fn init_logging() {
    init_logging_with_config(LoggingConfig::from_env());
}

pub fn init_logging_with_config(config: LoggingConfig) {
    if LOGGING_INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }

    let env_filter = EnvFilter::try_new(&config.level_filter)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));

    if config.use_pretty_format {
        tracing_subscriber::registry()
            .with(ts_fmt::layer().pretty().with_target(true).with_file(false).with_line_number(false))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(ts_fmt::layer().json().with_target(true).with_current_span(true))
            .with(env_filter)
            .init();
    }
}
