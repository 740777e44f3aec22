//! Cycle coordinator: one trading pass per tick, one summary per day
//!
//! Order of a trading cycle:
//! 1. flag gate
//! 2. prices from every exchange and per-token comparisons
//! 3. balances and the eligibility filter
//! 4. new transactions for eligible tokens at or above the trading threshold
//! 5. one step for every incomplete transaction
//! 6. price and comparison history
//! 7. operator and subscriber alerts
//!
//! A token reported to the operator stays quiet for `OPERATOR_ALERT_MINUTES`.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::adapters::{BalanceMap, ExchangeRegistry, PriceMap};
use crate::config::constants::operator_alert_interval;
use crate::config::SharedConfig;
use crate::core::comparison::compare_all;
use crate::core::eligibility::eligible_tokens;
use crate::core::safety::ensure_no_flags;
use crate::core::state_machine::{StepOutcome, TransactionEngine};
use crate::core::types::{BalanceSnapshot, Comparison, PriceSnapshot};
use crate::error::Result;
use crate::notify::alerts::{daily_summary, subscriber_alert, threshold_alert};
use crate::notify::{deliver, notify_operator, Notifier};
use crate::store::Store;

/// What one trading cycle did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub comparisons: usize,
    pub eligible: usize,
    pub opened: usize,
    pub advanced: usize,
    pub waiting: usize,
}

pub struct CycleCoordinator {
    config: SharedConfig,
    registry: ExchangeRegistry,
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
    engine: TransactionEngine,
    latest: BTreeMap<String, Comparison>,
    /// Last operator alert per token
    operator_alerted: BTreeMap<String, DateTime<Utc>>,
}

impl CycleCoordinator {
    pub fn new(
        config: SharedConfig,
        registry: ExchangeRegistry,
        store: Arc<dyn Store>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let engine = TransactionEngine::new(config.clone(), registry.clone(), store.clone());
        Self {
            config,
            registry,
            store,
            notifier,
            engine,
            latest: BTreeMap::new(),
            operator_alerted: BTreeMap::new(),
        }
    }

    /// Comparisons computed by the most recent cycle
    pub fn latest_comparisons(&self) -> &BTreeMap<String, Comparison> {
        &self.latest
    }

    async fn fetch_prices(&self, tokens: &[String]) -> BTreeMap<String, PriceMap> {
        let mut prices = BTreeMap::new();
        for (name, adapter) in self.registry.iter() {
            prices.insert(name.clone(), adapter.get_prices(tokens).await);
        }
        prices
    }

    async fn fetch_balances(&self, tokens: &[String]) -> BTreeMap<String, BalanceMap> {
        let mut balances = BTreeMap::new();
        for (name, adapter) in self.registry.iter() {
            balances.insert(name.clone(), adapter.get_balances(tokens).await);
        }
        balances
    }

    /// One full trading pass; any error is fatal for the process
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        ensure_no_flags(self.store.as_ref()).await?;

        let tokens = self.config.token_symbols();
        let prices = self.fetch_prices(&tokens).await;
        self.latest = compare_all(&tokens, &prices);

        let balances = self.fetch_balances(&tokens).await;
        let eligible = eligible_tokens(&self.config, &balances);

        let mut report = CycleReport {
            comparisons: self.latest.len(),
            eligible: eligible.len(),
            ..Default::default()
        };

        for comparison in self.latest.values() {
            if comparison.difference < self.config.percent_threshold {
                continue;
            }
            if !eligible.contains(&comparison.token) {
                debug!(token = %comparison.token, spread = comparison.difference, "Spread qualifies but token is not eligible");
                continue;
            }
            if self.engine.open(comparison).await?.is_some() {
                report.opened += 1;
            }
        }

        for tx in self.store.incomplete_transactions().await? {
            match self.engine.advance(&tx, &self.latest).await? {
                StepOutcome::Advanced(_) => report.advanced += 1,
                StepOutcome::Waiting => report.waiting += 1,
            }
        }

        self.persist_history(&prices).await;
        self.send_alerts().await;

        info!(
            comparisons = report.comparisons,
            eligible = report.eligible,
            opened = report.opened,
            advanced = report.advanced,
            waiting = report.waiting,
            "Cycle complete"
        );
        Ok(report)
    }

    async fn persist_history(&self, prices: &BTreeMap<String, PriceMap>) {
        let now = Utc::now();
        let snapshots: Vec<PriceSnapshot> = prices
            .iter()
            .flat_map(|(exchange, quotes)| {
                quotes.iter().map(move |(token, price)| PriceSnapshot {
                    exchange: exchange.clone(),
                    token: token.clone(),
                    price: *price,
                    timestamp: now,
                })
            })
            .collect();
        if let Err(e) = self.store.save_prices(&snapshots).await {
            warn!(error = %e, "Failed to persist price snapshots");
        }

        let comparisons: Vec<Comparison> = self.latest.values().cloned().collect();
        if let Err(e) = self.store.save_comparisons(&comparisons).await {
            warn!(error = %e, "Failed to persist comparisons");
        }
    }

    async fn send_alerts(&mut self) {
        let now = Utc::now();
        self.alert_operator(now).await;

        let asset = &self.config.settlement_asset;
        let subscribers = match self.store.active_subscribers().await {
            Ok(subscribers) => subscribers,
            Err(e) => {
                warn!(error = %e, "Failed to load subscribers");
                return;
            }
        };

        for mut subscriber in subscribers.into_iter().filter(|s| s.is_due(now)) {
            let Some(message) = subscriber_alert(&subscriber, &self.latest, asset) else {
                continue;
            };
            if !deliver(self.notifier.as_ref(), &subscriber.channel, &message).await {
                continue;
            }
            subscriber.last_notification = Some(now);
            if let Err(e) = self.store.upsert_subscriber(&subscriber).await {
                warn!(subscriber = %subscriber.id, error = %e, "Failed to record notification time");
            }
        }
    }

    async fn alert_operator(&mut self, now: DateTime<Utc>) {
        let quiet = Duration::from_std(operator_alert_interval()).unwrap_or_else(|_| Duration::hours(1));
        let due: BTreeMap<String, Comparison> = self
            .latest
            .iter()
            .filter(|(token, _)| {
                self.operator_alerted
                    .get(*token)
                    .map_or(true, |last| now - *last >= quiet)
            })
            .map(|(token, c)| (token.clone(), c.clone()))
            .collect();

        let threshold = self.config.notify_threshold;
        let Some(message) = threshold_alert(&due, threshold, &self.config.settlement_asset) else {
            return;
        };
        if !notify_operator(self.notifier.as_ref(), &message).await {
            return;
        }
        for token in due.values().filter(|c| c.difference >= threshold).map(|c| &c.token) {
            self.operator_alerted.insert(token.clone(), now);
        }
    }

    /// Daily balance snapshot and summary message
    pub async fn run_daily(&mut self) -> Result<()> {
        let tokens = self.config.token_symbols();
        let balances = self.fetch_balances(&tokens).await;

        let now = Utc::now();
        let snapshots: Vec<BalanceSnapshot> = balances
            .iter()
            .flat_map(|(exchange, amounts)| {
                amounts.iter().map(move |(token, amount)| BalanceSnapshot {
                    exchange: exchange.clone(),
                    token: token.clone(),
                    amount: *amount,
                    timestamp: now,
                })
            })
            .collect();
        if let Err(e) = self.store.save_balances(&snapshots).await {
            warn!(error = %e, "Failed to persist balance snapshots");
        }

        let history = match self.store.comparisons_since(now - Duration::hours(24)).await {
            Ok(history) => history,
            Err(e) => {
                warn!(error = %e, "Failed to load comparison history");
                Vec::new()
            }
        };

        let summary = daily_summary(&tokens, &balances, &history, &self.config.settlement_asset);
        notify_operator(self.notifier.as_ref(), &summary).await;
        info!(snapshots = snapshots.len(), history = history.len(), "Daily summary sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::test_utils::TestMockAdapter;
    use crate::config::create_valid_config;
    use crate::core::transaction::TransactionStatus;
    use crate::core::types::{Flag, Subscriber};
    use crate::error::AppError;
    use crate::notify::NotifyResult;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(String, String)>>,
    }

    impl RecordingNotifier {
        fn sent(&self) -> Vec<(String, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, destination: &str, message: &str) -> NotifyResult<()> {
            self.sent
                .lock()
                .unwrap()
                .push((destination.to_string(), message.to_string()));
            Ok(())
        }

        fn operator_destination(&self) -> &str {
            "ops"
        }
    }

    struct Fixture {
        coordinator: CycleCoordinator,
        store: Arc<MemoryStore>,
        notifier: Arc<RecordingNotifier>,
        ex1: Arc<TestMockAdapter>,
        ex2: Arc<TestMockAdapter>,
    }

    fn fixture(ex1_balance: f64, ex2_balance: f64) -> Fixture {
        let ex1 = Arc::new(
            TestMockAdapter::new("ex1")
                .with_price("NULS", 0.05)
                .with_balance("NULS", ex1_balance),
        );
        let ex2 = Arc::new(
            TestMockAdapter::new("ex2")
                .with_price("NULS", 0.06)
                .with_balance("NULS", ex2_balance),
        );
        let mut registry = ExchangeRegistry::new();
        registry.register(ex1.clone());
        registry.register(ex2.clone());
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let coordinator = CycleCoordinator::new(
            create_valid_config().into_shared(),
            registry,
            store.clone(),
            notifier.clone(),
        );
        Fixture {
            coordinator,
            store,
            notifier,
            ex1,
            ex2,
        }
    }

    #[tokio::test]
    async fn test_cycle_opens_on_expensive_exchange() {
        let mut fx = fixture(10.0, 10.0);

        let report = fx.coordinator.run_cycle().await.unwrap();

        assert_eq!(report.opened, 1);
        let comparison = &fx.coordinator.latest_comparisons()["NULS"];
        assert_eq!(comparison.difference, 16.67);
        assert_eq!(comparison.min_exchange, "ex1");
        assert_eq!(comparison.max_exchange, "ex2");
        assert_eq!(fx.ex2.count_calls("place_sell NULS 10 0.06"), 1);
        assert_eq!(fx.ex1.count_calls("place_sell"), 0);

        let transactions = fx.store.transactions().await;
        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0].status, TransactionStatus::SellPlaced);
    }

    #[tokio::test]
    async fn test_underfunded_token_is_not_traded() {
        let mut fx = fixture(10.0, 0.0);

        let report = fx.coordinator.run_cycle().await.unwrap();

        assert_eq!(report.eligible, 0);
        assert_eq!(report.opened, 0);
        assert!(fx.store.transactions().await.is_empty());
        assert_eq!(fx.ex2.count_calls("place_sell"), 0);
    }

    #[tokio::test]
    async fn test_flag_halts_before_any_exchange_call() {
        let mut fx = fixture(10.0, 10.0);
        fx.store.raise_flag(&Flag::new("manual review")).await.unwrap();

        let result = fx.coordinator.run_cycle().await;

        assert!(matches!(result, Err(AppError::Halted(_))));
        assert!(fx.ex1.calls().is_empty());
        assert!(fx.ex2.calls().is_empty());
    }

    #[tokio::test]
    async fn test_cycle_persists_history_and_alerts_operator() {
        let mut fx = fixture(10.0, 10.0);

        fx.coordinator.run_cycle().await.unwrap();

        assert_eq!(fx.store.prices().await.len(), 2);
        assert_eq!(fx.store.comparisons().await.len(), 1);
        let sent = fx.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "ops");
        assert_eq!(
            sent[0].1,
            "NULS 17% difference between ex1(min) and ex2(max) on ETH pair"
        );
    }

    #[tokio::test]
    async fn test_operator_alert_stays_quiet_between_cycles() {
        let mut fx = fixture(0.0, 0.0);

        for _ in 0..3 {
            fx.coordinator.run_cycle().await.unwrap();
        }

        let to_operator = fx.notifier.sent().into_iter().filter(|(dest, _)| dest == "ops").count();
        assert_eq!(to_operator, 1);
    }

    #[tokio::test]
    async fn test_operator_alert_repeats_after_quiet_period() {
        let mut fx = fixture(0.0, 0.0);
        fx.coordinator.run_cycle().await.unwrap();

        fx.coordinator
            .operator_alerted
            .insert("NULS".to_string(), Utc::now() - Duration::hours(2));
        fx.coordinator.run_cycle().await.unwrap();

        let to_operator = fx.notifier.sent().into_iter().filter(|(dest, _)| dest == "ops").count();
        assert_eq!(to_operator, 2);
    }

    #[tokio::test]
    async fn test_subscriber_alert_respects_frequency() {
        let mut fx = fixture(0.0, 0.0);
        let subscriber = Subscriber {
            id: "u1".to_string(),
            channel: "dm-1".to_string(),
            on: true,
            tokens: vec!["NULS".to_string()],
            threshold: 15.0,
            frequency: 60,
            last_notification: None,
        };
        fx.store.upsert_subscriber(&subscriber).await.unwrap();

        fx.coordinator.run_cycle().await.unwrap();
        fx.coordinator.run_cycle().await.unwrap();

        let to_subscriber = fx
            .notifier
            .sent()
            .into_iter()
            .filter(|(dest, _)| dest == "dm-1")
            .count();
        assert_eq!(to_subscriber, 1);
        let stored = fx.store.subscribers().await;
        assert!(stored[0].last_notification.is_some());
    }

    #[tokio::test]
    async fn test_pending_transaction_is_left_unchanged() {
        let mut fx = fixture(0.0, 0.0);
        let tx = crate::core::transaction::Transaction::new_sell("NULS", "ex2", 0.06, 10.0, "ex2-7");
        fx.store.insert_transaction(&tx).await.unwrap();

        let report = fx.coordinator.run_cycle().await.unwrap();

        assert_eq!(report.waiting, 1);
        assert_eq!(report.advanced, 0);
        let stored = fx.store.transaction(&tx.id).await.unwrap();
        assert_eq!(stored, tx);
    }

    #[tokio::test]
    async fn test_daily_snapshot_and_summary() {
        let mut fx = fixture(10.0, 25.5);
        fx.coordinator.run_cycle().await.unwrap();

        fx.coordinator.run_daily().await.unwrap();

        assert_eq!(fx.store.balances().await.len(), 2);
        let summary = fx.notifier.sent().last().cloned().unwrap();
        assert_eq!(summary.0, "ops");
        assert!(summary.1.starts_with("Daily summary (ETH pairs)"));
        assert!(summary.1.contains("NULS: ex1 10, ex2 25.5 | max spread 24h: 16.67%"));
    }
}
