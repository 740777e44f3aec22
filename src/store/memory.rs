//! In-process store used for dry runs and tests

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::core::transaction::Transaction;
use crate::core::types::{BalanceSnapshot, Comparison, Flag, PriceSnapshot, Subscriber};
use crate::store::{Store, StoreError, StoreResult};

#[derive(Debug, Default)]
struct Collections {
    transactions: Vec<Transaction>,
    flags: Vec<Flag>,
    prices: Vec<PriceSnapshot>,
    balances: Vec<BalanceSnapshot>,
    comparisons: Vec<Comparison>,
    subscribers: Vec<Subscriber>,
}

/// Store backed by process memory; nothing survives a restart
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every transaction, terminal ones included
    pub async fn transactions(&self) -> Vec<Transaction> {
        self.inner.read().await.transactions.clone()
    }

    pub async fn transaction(&self, id: &str) -> Option<Transaction> {
        self.inner
            .read()
            .await
            .transactions
            .iter()
            .find(|t| t.id == id)
            .cloned()
    }

    pub async fn prices(&self) -> Vec<PriceSnapshot> {
        self.inner.read().await.prices.clone()
    }

    pub async fn balances(&self) -> Vec<BalanceSnapshot> {
        self.inner.read().await.balances.clone()
    }

    pub async fn comparisons(&self) -> Vec<Comparison> {
        self.inner.read().await.comparisons.clone()
    }

    pub async fn subscribers(&self) -> Vec<Subscriber> {
        self.inner.read().await.subscribers.clone()
    }

    /// Remove every flag (operator review done)
    pub async fn clear_flags(&self) {
        self.inner.write().await.flags.clear();
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn insert_transaction(&self, tx: &Transaction) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner.transactions.iter().any(|t| t.id == tx.id) {
            return Err(StoreError::DatabaseError(format!(
                "Transaction already exists: {}",
                tx.id
            )));
        }
        inner.transactions.push(tx.clone());
        Ok(())
    }

    async fn update_transaction(&self, tx: &Transaction) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let slot = inner
            .transactions
            .iter_mut()
            .find(|t| t.id == tx.id)
            .ok_or(StoreError::NotFound)?;
        *slot = tx.clone();
        Ok(())
    }

    async fn incomplete_transactions(&self) -> StoreResult<Vec<Transaction>> {
        let inner = self.inner.read().await;
        let mut open: Vec<Transaction> = inner
            .transactions
            .iter()
            .filter(|t| !t.is_complete())
            .cloned()
            .collect();
        open.sort_by_key(|t| t.timestamp);
        Ok(open)
    }

    async fn flags(&self) -> StoreResult<Vec<Flag>> {
        Ok(self.inner.read().await.flags.clone())
    }

    async fn raise_flag(&self, flag: &Flag) -> StoreResult<()> {
        self.inner.write().await.flags.push(flag.clone());
        Ok(())
    }

    async fn save_prices(&self, prices: &[PriceSnapshot]) -> StoreResult<()> {
        self.inner.write().await.prices.extend_from_slice(prices);
        Ok(())
    }

    async fn save_balances(&self, balances: &[BalanceSnapshot]) -> StoreResult<()> {
        self.inner.write().await.balances.extend_from_slice(balances);
        Ok(())
    }

    async fn save_comparisons(&self, comparisons: &[Comparison]) -> StoreResult<()> {
        self.inner.write().await.comparisons.extend_from_slice(comparisons);
        Ok(())
    }

    async fn comparisons_since(&self, since: DateTime<Utc>) -> StoreResult<Vec<Comparison>> {
        Ok(self
            .inner
            .read()
            .await
            .comparisons
            .iter()
            .filter(|c| c.timestamp >= since)
            .cloned()
            .collect())
    }

    async fn active_subscribers(&self) -> StoreResult<Vec<Subscriber>> {
        Ok(self
            .inner
            .read()
            .await
            .subscribers
            .iter()
            .filter(|s| s.on)
            .cloned()
            .collect())
    }

    async fn upsert_subscriber(&self, subscriber: &Subscriber) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        match inner.subscribers.iter().position(|s| s.id == subscriber.id) {
            Some(index) => inner.subscribers[index] = subscriber.clone(),
            None => inner.subscribers.push(subscriber.clone()),
        }
        Ok(())
    }
}
