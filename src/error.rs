//! Application-wide error types using thiserror
//!
//! All errors that can escape a trading cycle are wrapped in AppError
//! so the scheduler can decide how the process terminates.

use thiserror::Error;

use crate::adapters::errors::ExchangeError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Exchange error: {0}")]
    Exchange(#[from] ExchangeError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// One or more operator flags are present; trading must not run
    #[error("Trading halted by flag: {0}")]
    Halted(String),

    /// A transition would have produced an uneconomical trade
    #[error("Safety violation: {0}")]
    SafetyViolation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Errors that require operator review before the engine may run again
    pub fn requires_operator(&self) -> bool {
        matches!(self, AppError::Halted(_) | AppError::SafetyViolation(_))
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
