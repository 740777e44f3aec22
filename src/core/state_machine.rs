//! Durable transaction state machine
//!
//! Each poll moves a transaction at most one status forward. The new status
//! (and the exchange response that justified it) is written to the store
//! before the step counts as done, so a restart resumes from the last
//! persisted status.
//!
//! ```text
//! SellPlaced → SellCompleted → TransferStarted → TransferCompleted
//!            → BuyPlaced → BuyCompleted → BalancesReset
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::adapters::{ExchangeRegistry, SharedAdapter};
use crate::config::constants::{buy_quantity_margin, quantity_decimals, transfer_amount_decimals};
use crate::config::SharedConfig;
use crate::core::rounding::{floor_to, to_fixed};
use crate::core::safety::{minimum_buy_quantity, raise_and_halt};
use crate::core::transaction::{Transaction, TransactionStatus};
use crate::core::types::Comparison;
use crate::error::Result;
use crate::store::Store;

/// Result of polling one transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Persisted at the new status
    Advanced(TransactionStatus),
    /// Nothing confirmed yet; retried next cycle
    Waiting,
}

pub struct TransactionEngine {
    config: SharedConfig,
    registry: ExchangeRegistry,
    store: Arc<dyn Store>,
}

impl TransactionEngine {
    pub fn new(config: SharedConfig, registry: ExchangeRegistry, store: Arc<dyn Store>) -> Self {
        Self {
            config,
            registry,
            store,
        }
    }

    fn adapter(&self, exchange: &str) -> Option<&SharedAdapter> {
        let adapter = self.registry.get(exchange);
        if adapter.is_none() {
            warn!(exchange = exchange, "No adapter configured for exchange");
        }
        adapter
    }

    /// Place the sell leg for a qualifying spread and record the transaction
    ///
    /// Nothing is recorded when the exchange does not confirm the placement.
    pub async fn open(&self, comparison: &Comparison) -> Result<Option<Transaction>> {
        let quantity = self.config.trade_quantity(&comparison.token);
        if quantity <= 0.0 {
            return Ok(None);
        }
        let Some(seller) = self.adapter(&comparison.max_exchange) else {
            return Ok(None);
        };

        let placement = seller
            .place_sell(&comparison.token, quantity, comparison.max_price)
            .await;
        if !placement.accepted {
            warn!(
                token = %comparison.token,
                exchange = %comparison.max_exchange,
                "Sell placement not confirmed; no transaction recorded"
            );
            return Ok(None);
        }

        let tx = Transaction::new_sell(
            &comparison.token,
            &comparison.max_exchange,
            comparison.max_price,
            quantity,
            &placement.tx_id,
        );
        self.store.insert_transaction(&tx).await?;
        info!(
            id = %tx.id,
            token = %tx.token,
            sell_exchange = %tx.sell_exchange,
            price = tx.sell_price,
            quantity = tx.sell_quantity,
            spread = comparison.difference,
            "Opened arbitrage transaction"
        );
        Ok(Some(tx))
    }

    /// Poll one transaction and persist it if it moved
    pub async fn advance(
        &self,
        tx: &Transaction,
        comparisons: &BTreeMap<String, Comparison>,
    ) -> Result<StepOutcome> {
        let mut next = tx.clone();
        let progressed = match tx.status {
            TransactionStatus::SellPlaced => self.check_sale(&mut next).await?,
            TransactionStatus::SellCompleted => {
                self.start_settlement_transfer(&mut next, comparisons).await?
            }
            TransactionStatus::TransferStarted => self.confirm_settlement(&mut next).await?,
            TransactionStatus::TransferCompleted => self.place_buy_order(&mut next).await?,
            TransactionStatus::BuyPlaced => self.confirm_buy(&mut next).await?,
            TransactionStatus::BuyCompleted => self.return_tokens(&mut next).await?,
            TransactionStatus::BalancesReset => false,
        };

        if !progressed {
            debug!(id = %tx.id, token = %tx.token, status = %tx.status, "Waiting");
            return Ok(StepOutcome::Waiting);
        }

        let status = next.advance()?;
        self.store.update_transaction(&next).await?;
        info!(id = %next.id, token = %next.token, from = %tx.status, to = %status, "Transaction advanced");
        Ok(StepOutcome::Advanced(status))
    }

    async fn require<T>(&self, tx: &Transaction, field: &str, value: Option<T>) -> Result<T> {
        match value {
            Some(v) => Ok(v),
            None => Err(raise_and_halt(
                self.store.as_ref(),
                format!(
                    "Transaction {} ({}) in {} has no {}",
                    tx.id, tx.token, tx.status, field
                ),
            )
            .await),
        }
    }

    // =========================================================================
    // Steps
    // =========================================================================

    async fn check_sale(&self, tx: &mut Transaction) -> Result<bool> {
        let Some(seller) = self.adapter(&tx.sell_exchange) else {
            return Ok(false);
        };
        let fill = seller.check_sold(&tx.token, &tx.sell_tx_id).await;
        if !fill.filled {
            return Ok(false);
        }
        if tx.sell_cost.is_none() {
            tx.sell_cost = Some(fill.proceeds);
        }
        Ok(true)
    }

    async fn start_settlement_transfer(
        &self,
        tx: &mut Transaction,
        comparisons: &BTreeMap<String, Comparison>,
    ) -> Result<bool> {
        let sell_cost = self.require(tx, "sell_cost", tx.sell_cost).await?;

        let Some(comparison) = comparisons.get(&tx.token) else {
            debug!(token = %tx.token, "No current comparison, transfer deferred");
            return Ok(false);
        };
        if comparison.difference < self.config.percent_threshold {
            info!(
                id = %tx.id,
                token = %tx.token,
                spread = comparison.difference,
                "Spread below threshold, funds stay on sell exchange"
            );
            return Ok(false);
        }
        if comparison.min_exchange == tx.sell_exchange {
            info!(id = %tx.id, token = %tx.token, "Cheapest exchange is the sell exchange, transfer deferred");
            return Ok(false);
        }

        let (Some(seller), Some(buyer)) = (
            self.adapter(&tx.sell_exchange),
            self.adapter(&comparison.min_exchange),
        ) else {
            return Ok(false);
        };

        let asset = &self.config.settlement_asset;
        let Some(destination) = buyer.deposit_address(asset).await else {
            warn!(exchange = %comparison.min_exchange, asset = %asset, "Deposit address unavailable");
            return Ok(false);
        };

        let transfer = seller.start_transfer(asset, &destination, sell_cost).await;
        if !transfer.accepted {
            return Ok(false);
        }

        tx.transfer_tx_id = Some(transfer.tx_id);
        tx.buy_exchange = Some(comparison.min_exchange.clone());
        tx.buy_price = Some(comparison.min_price);
        Ok(true)
    }

    async fn confirm_settlement(&self, tx: &mut Transaction) -> Result<bool> {
        let sell_cost = self.require(tx, "sell_cost", tx.sell_cost).await?;
        let buy_exchange = self.require(tx, "buy_exchange", tx.buy_exchange.clone()).await?;
        let Some(buyer) = self.adapter(&buy_exchange) else {
            return Ok(false);
        };

        let fee = self.config.withdrawal_fee(&buy_exchange);
        let expected = to_fixed(sell_cost - fee, transfer_amount_decimals());
        Ok(buyer.check_transferred(expected).await)
    }

    async fn place_buy_order(&self, tx: &mut Transaction) -> Result<bool> {
        let sell_cost = self.require(tx, "sell_cost", tx.sell_cost).await?;
        let buy_exchange = self.require(tx, "buy_exchange", tx.buy_exchange.clone()).await?;
        let recorded_price = self.require(tx, "buy_price", tx.buy_price).await?;
        let Some(buyer) = self.adapter(&buy_exchange) else {
            return Ok(false);
        };

        let price = buyer
            .get_prices(std::slice::from_ref(&tx.token))
            .await
            .get(&tx.token)
            .copied()
            .filter(|p| p.is_finite() && *p > 0.0)
            .unwrap_or(recorded_price);
        if price <= 0.0 {
            return Ok(false);
        }

        let quantity = floor_to(sell_cost / price, quantity_decimals());
        let minimum = minimum_buy_quantity(tx.sell_quantity, buy_quantity_margin());
        if quantity < minimum {
            return Err(raise_and_halt(
                self.store.as_ref(),
                format!(
                    "{} buy of {} on {} at {} is below the profitable minimum {} (transaction {})",
                    tx.token, quantity, buy_exchange, price, minimum, tx.id
                ),
            )
            .await);
        }

        let placement = buyer.place_buy(&tx.token, quantity, price).await;
        if !placement.accepted {
            return Ok(false);
        }

        tx.buy_tx_id = Some(placement.tx_id);
        tx.buy_quantity = Some(quantity);
        tx.buy_price = Some(price);
        tx.buy_cost = Some(quantity * price);
        Ok(true)
    }

    async fn confirm_buy(&self, tx: &mut Transaction) -> Result<bool> {
        let buy_exchange = self.require(tx, "buy_exchange", tx.buy_exchange.clone()).await?;
        let buy_tx_id = self.require(tx, "buy_tx_id", tx.buy_tx_id.clone()).await?;
        let Some(buyer) = self.adapter(&buy_exchange) else {
            return Ok(false);
        };
        Ok(buyer.check_bought(&tx.token, &buy_tx_id).await)
    }

    async fn return_tokens(&self, tx: &mut Transaction) -> Result<bool> {
        let buy_exchange = self.require(tx, "buy_exchange", tx.buy_exchange.clone()).await?;
        let quantity = self.require(tx, "buy_quantity", tx.buy_quantity).await?;
        let (Some(seller), Some(buyer)) = (self.adapter(&tx.sell_exchange), self.adapter(&buy_exchange))
        else {
            return Ok(false);
        };

        let Some(destination) = seller.deposit_address(&tx.token).await else {
            warn!(exchange = %tx.sell_exchange, token = %tx.token, "Deposit address unavailable");
            return Ok(false);
        };
        let transfer = buyer.start_transfer(&tx.token, &destination, quantity).await;
        if !transfer.accepted {
            return Ok(false);
        }
        tx.reset_tx_id = Some(transfer.tx_id);
        Ok(true)
    }
}
