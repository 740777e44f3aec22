//! Exchange adapter error types
//!
//! All exchange-related errors are wrapped in ExchangeError enum.
//! Apart from `validate_credentials`, these never escape an adapter: the
//! capability methods log them and report "not yet" instead.

use thiserror::Error;

/// Exchange-specific error types for adapter operations
#[derive(Error, Debug)]
pub enum ExchangeError {
    /// Connection to exchange failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Network operation timed out
    #[error("Network timeout after {0}ms")]
    NetworkTimeout(u64),

    /// Invalid or unexpected response from exchange
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Credentials rejected or request signing failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Order was not accepted by the exchange
    #[error("Order rejected: {0}")]
    OrderRejected(String),

    /// Withdrawal request was not accepted by the exchange
    #[error("Withdrawal rejected: {0}")]
    WithdrawalRejected(String),

    /// Exchange name has no adapter implementation
    #[error("Unsupported exchange: {0}")]
    UnsupportedExchange(String),
}

impl ExchangeError {
    /// Map a reqwest failure, keeping timeouts distinguishable
    pub fn from_request(err: reqwest::Error, timeout_ms: u64) -> Self {
        if err.is_timeout() {
            ExchangeError::NetworkTimeout(timeout_ms)
        } else if err.is_decode() {
            ExchangeError::InvalidResponse(err.to_string())
        } else {
            ExchangeError::ConnectionFailed(err.to_string())
        }
    }
}

/// Result type alias for exchange operations
pub type ExchangeResult<T> = std::result::Result<T, ExchangeError>;
