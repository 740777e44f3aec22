//! Durable storage for the transaction ledger and history collections
//!
//! Collections: transactions (queried by status), prices, balances,
//! comparisons, flags and notification subscribers. Writes to one
//! transaction are last-writer-wins; a single process drives the engine.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::core::transaction::Transaction;
use crate::core::types::{BalanceSnapshot, Comparison, Flag, PriceSnapshot, Subscriber};

pub mod memory;
pub mod supabase;

pub use memory::MemoryStore;
pub use supabase::SupabaseStore;

/// Errors for store operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database operation failed
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Record not found
    #[error("Record not found")]
    NotFound,

    /// Invalid data provided or returned
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Network error during API call
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Storage contract used by the trading cycle
#[async_trait]
pub trait Store: Send + Sync {
    /// Prove the backend is reachable; called once at startup
    async fn ping(&self) -> StoreResult<()>;

    async fn insert_transaction(&self, tx: &Transaction) -> StoreResult<()>;

    /// Replace the stored record with the same id
    async fn update_transaction(&self, tx: &Transaction) -> StoreResult<()>;

    /// Every transaction whose status is below BalancesReset, oldest first
    async fn incomplete_transactions(&self) -> StoreResult<Vec<Transaction>>;

    async fn flags(&self) -> StoreResult<Vec<Flag>>;

    async fn raise_flag(&self, flag: &Flag) -> StoreResult<()>;

    async fn save_prices(&self, prices: &[PriceSnapshot]) -> StoreResult<()>;

    async fn save_balances(&self, balances: &[BalanceSnapshot]) -> StoreResult<()>;

    async fn save_comparisons(&self, comparisons: &[Comparison]) -> StoreResult<()>;

    async fn comparisons_since(&self, since: DateTime<Utc>) -> StoreResult<Vec<Comparison>>;

    /// Subscribers with `on == true`
    async fn active_subscribers(&self) -> StoreResult<Vec<Subscriber>>;

    /// Upsert the subscriber record by id (used to store `last_notification`)
    async fn upsert_subscriber(&self, subscriber: &Subscriber) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_variants() {
        assert_eq!(StoreError::NotFound.to_string(), "Record not found");
        assert_eq!(
            StoreError::DatabaseError("boom".to_string()).to_string(),
            "Database error: boom"
        );
        assert_eq!(
            StoreError::InvalidData("bad".to_string()).to_string(),
            "Invalid data: bad"
        );
    }
}
