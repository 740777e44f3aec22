//! Supabase (PostgREST) store
//!
//! Each collection is a table under `/rest/v1/`. Transactions carry their
//! status as an integer so "incomplete" is the filter `status=lt.6`.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::constants::http_timeout;
use crate::config::SupabaseConfig;
use crate::core::transaction::{Transaction, TransactionStatus};
use crate::core::types::{BalanceSnapshot, Comparison, Flag, PriceSnapshot, Subscriber};
use crate::store::{Store, StoreError, StoreResult};

const TRANSACTIONS: &str = "transactions";
const FLAGS: &str = "flags";
const PRICES: &str = "prices";
const BALANCES: &str = "balances";
const COMPARISONS: &str = "comparisons";
const SUBSCRIBERS: &str = "subscribers";

/// Store persisting every collection to Supabase
pub struct SupabaseStore {
    /// Supabase project URL (e.g., https://xxx.supabase.co)
    supabase_url: String,
    client: reqwest::Client,
}

impl SupabaseStore {
    /// Build the client with `apikey` and bearer headers
    pub fn new(config: SupabaseConfig) -> StoreResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "apikey",
            HeaderValue::from_str(&config.anon_key)
                .map_err(|e| StoreError::InvalidData(format!("Invalid apikey header value: {}", e)))?,
        );
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", config.anon_key)).map_err(|e| {
                StoreError::InvalidData(format!("Invalid authorization header value: {}", e))
            })?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(http_timeout())
            .build()?;

        Ok(Self {
            supabase_url: config.url,
            client,
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.supabase_url, table)
    }

    /// Map non-success status codes to `DatabaseError`
    async fn check(table: &str, response: reqwest::Response) -> StoreResult<reqwest::Response> {
        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::CONFLICT => {
                let err_msg = format!("Record already exists in {} (key conflict)", table);
                tracing::error!(table = table, "Supabase write failed: {}", err_msg);
                Err(StoreError::DatabaseError(err_msg))
            }
            StatusCode::UNAUTHORIZED => {
                let err_msg = "Invalid Supabase credentials".to_string();
                tracing::error!(table = table, "Supabase request failed: {}", err_msg);
                Err(StoreError::DatabaseError(err_msg))
            }
            status => {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "<no body>".to_string());
                tracing::error!(table = table, status = %status, response_body = %body, "Supabase request failed");
                Err(StoreError::DatabaseError(format!(
                    "Supabase error {}: {}",
                    status, body
                )))
            }
        }
    }

    async fn select<T: DeserializeOwned>(&self, table: &str, query: &str) -> StoreResult<Vec<T>> {
        let url = format!("{}?{}", self.table_url(table), query);
        let response = self.client.get(&url).send().await?;
        let response = Self::check(table, response).await?;
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| StoreError::InvalidData(format!("{} rows: {}", table, e)))
    }

    async fn insert<T: Serialize + ?Sized>(&self, table: &str, rows: &T) -> StoreResult<()> {
        let response = self
            .client
            .post(self.table_url(table))
            .header("Prefer", "return=minimal")
            .json(rows)
            .send()
            .await?;
        Self::check(table, response).await?;
        Ok(())
    }
}

fn timestamp_param(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[async_trait]
impl Store for SupabaseStore {
    async fn ping(&self) -> StoreResult<()> {
        let _: Vec<serde_json::Value> = self.select(FLAGS, "select=message&limit=1").await?;
        tracing::info!(url = %self.supabase_url, "Supabase store reachable");
        Ok(())
    }

    async fn insert_transaction(&self, tx: &Transaction) -> StoreResult<()> {
        self.insert(TRANSACTIONS, tx).await?;
        tracing::info!(
            id = %tx.id,
            token = %tx.token,
            sell_exchange = %tx.sell_exchange,
            status = %tx.status,
            "Transaction saved to Supabase"
        );
        Ok(())
    }

    async fn update_transaction(&self, tx: &Transaction) -> StoreResult<()> {
        let url = format!("{}?id=eq.{}", self.table_url(TRANSACTIONS), tx.id);
        let response = self
            .client
            .patch(&url)
            .header("Prefer", "return=representation")
            .json(tx)
            .send()
            .await?;
        let response = Self::check(TRANSACTIONS, response).await?;
        let text = response.text().await?;
        let updated: Vec<serde_json::Value> = serde_json::from_str(&text)
            .map_err(|e| StoreError::InvalidData(format!("update reply: {}", e)))?;
        if updated.is_empty() {
            return Err(StoreError::NotFound);
        }
        tracing::debug!(id = %tx.id, status = %tx.status, "Transaction updated in Supabase");
        Ok(())
    }

    async fn incomplete_transactions(&self) -> StoreResult<Vec<Transaction>> {
        let query = format!(
            "status=lt.{}&order=timestamp.asc",
            TransactionStatus::BalancesReset.code()
        );
        self.select(TRANSACTIONS, &query).await
    }

    async fn flags(&self) -> StoreResult<Vec<Flag>> {
        self.select(FLAGS, "select=message,timestamp").await
    }

    async fn raise_flag(&self, flag: &Flag) -> StoreResult<()> {
        self.insert(FLAGS, flag).await?;
        tracing::warn!(message = %flag.message, "Flag raised in Supabase");
        Ok(())
    }

    async fn save_prices(&self, prices: &[PriceSnapshot]) -> StoreResult<()> {
        if prices.is_empty() {
            return Ok(());
        }
        self.insert(PRICES, prices).await
    }

    async fn save_balances(&self, balances: &[BalanceSnapshot]) -> StoreResult<()> {
        if balances.is_empty() {
            return Ok(());
        }
        self.insert(BALANCES, balances).await
    }

    async fn save_comparisons(&self, comparisons: &[Comparison]) -> StoreResult<()> {
        if comparisons.is_empty() {
            return Ok(());
        }
        self.insert(COMPARISONS, comparisons).await
    }

    async fn comparisons_since(&self, since: DateTime<Utc>) -> StoreResult<Vec<Comparison>> {
        let query = format!("timestamp=gte.{}&order=timestamp.asc", timestamp_param(since));
        self.select(COMPARISONS, &query).await
    }

    async fn active_subscribers(&self) -> StoreResult<Vec<Subscriber>> {
        self.select(SUBSCRIBERS, "on=is.true").await
    }

    async fn upsert_subscriber(&self, subscriber: &Subscriber) -> StoreResult<()> {
        let url = format!("{}?on_conflict=id", self.table_url(SUBSCRIBERS));
        let response = self
            .client
            .post(&url)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(subscriber)
            .send()
            .await?;
        Self::check(SUBSCRIBERS, response).await?;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
