//! Arbitrage transaction ledger entry and its lifecycle status

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

// =============================================================================
// TransactionStatus
// =============================================================================

/// Lifecycle status; persisted as its integer code so the store can query
/// "everything below BalancesReset"
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum TransactionStatus {
    SellPlaced,
    SellCompleted,
    TransferStarted,
    TransferCompleted,
    BuyPlaced,
    BuyCompleted,
    BalancesReset,
}

impl TransactionStatus {
    pub const ALL: [TransactionStatus; 7] = [
        TransactionStatus::SellPlaced,
        TransactionStatus::SellCompleted,
        TransactionStatus::TransferStarted,
        TransactionStatus::TransferCompleted,
        TransactionStatus::BuyPlaced,
        TransactionStatus::BuyCompleted,
        TransactionStatus::BalancesReset,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Following status, `None` for the terminal one
    pub fn next(self) -> Option<Self> {
        Self::ALL.get(self.code() as usize + 1).copied()
    }

    pub fn is_terminal(self) -> bool {
        self == TransactionStatus::BalancesReset
    }
}

impl From<TransactionStatus> for u8 {
    fn from(status: TransactionStatus) -> u8 {
        status.code()
    }
}

impl TryFrom<u8> for TransactionStatus {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .get(code as usize)
            .copied()
            .ok_or_else(|| format!("unknown transaction status code {}", code))
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionStatus::SellPlaced => "SellPlaced",
            TransactionStatus::SellCompleted => "SellCompleted",
            TransactionStatus::TransferStarted => "TransferStarted",
            TransactionStatus::TransferCompleted => "TransferCompleted",
            TransactionStatus::BuyPlaced => "BuyPlaced",
            TransactionStatus::BuyCompleted => "BuyCompleted",
            TransactionStatus::BalancesReset => "BalancesReset",
        };
        write!(f, "{}", name)
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// One arbitrage attempt for one token
///
/// Only `status` moves; every other field is written once, when its step's
/// exchange response is recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub status: TransactionStatus,
    pub token: String,

    pub sell_exchange: String,
    pub sell_price: f64,
    pub sell_quantity: f64,
    pub sell_tx_id: String,
    /// Realized settlement-asset proceeds once the sell filled
    #[serde(default)]
    pub sell_cost: Option<f64>,

    /// Withdrawal id of the settlement transfer (may be empty on some exchanges)
    #[serde(default)]
    pub transfer_tx_id: Option<String>,

    #[serde(default)]
    pub buy_exchange: Option<String>,
    #[serde(default)]
    pub buy_price: Option<f64>,
    #[serde(default)]
    pub buy_quantity: Option<f64>,
    #[serde(default)]
    pub buy_cost: Option<f64>,
    #[serde(default)]
    pub buy_tx_id: Option<String>,

    /// Withdrawal id of the token transfer back to the sell exchange
    #[serde(default)]
    pub reset_tx_id: Option<String>,

    /// Creation time; not touched on transitions
    pub timestamp: DateTime<Utc>,
}

impl Transaction {
    /// New ledger entry for a confirmed sell placement
    pub fn new_sell(
        token: &str,
        sell_exchange: &str,
        sell_price: f64,
        sell_quantity: f64,
        sell_tx_id: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            status: TransactionStatus::SellPlaced,
            token: token.to_string(),
            sell_exchange: sell_exchange.to_string(),
            sell_price,
            sell_quantity,
            sell_tx_id: sell_tx_id.to_string(),
            sell_cost: None,
            transfer_tx_id: None,
            buy_exchange: None,
            buy_price: None,
            buy_quantity: None,
            buy_cost: None,
            buy_tx_id: None,
            reset_tx_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Move exactly one status forward
    pub fn advance(&mut self) -> Result<TransactionStatus, AppError> {
        let next = self.status.next().ok_or_else(|| {
            AppError::SafetyViolation(format!(
                "transaction {} is already {}",
                self.id, self.status
            ))
        })?;
        self.status = next;
        Ok(next)
    }

    pub fn is_complete(&self) -> bool {
        self.status.is_terminal()
    }
}
