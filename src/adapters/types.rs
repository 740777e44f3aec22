//! Outcome types shared by every exchange adapter

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Current quote per token against the settlement asset
pub type PriceMap = HashMap<String, f64>;

/// Free (non-reserved) balance per token
pub type BalanceMap = HashMap<String, f64>;

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_upper(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }

    pub fn as_lower(&self) -> &'static str {
        match self {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
        }
    }
}

/// Result of an order placement or withdrawal request
///
/// `accepted == false` only means confirmation was not obtained; the remote
/// side may still have created the order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Submission {
    /// Exchange-assigned id (may be empty for withdrawals on some exchanges)
    pub tx_id: String,
    pub accepted: bool,
}

impl Submission {
    pub fn accepted(tx_id: impl Into<String>) -> Self {
        Self {
            tx_id: tx_id.into(),
            accepted: true,
        }
    }

    pub fn not_confirmed() -> Self {
        Self::default()
    }
}

/// Result of a sell order inspection
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FillStatus {
    /// Realized quote-asset amount
    pub proceeds: f64,
    /// True only when the order is fully executed
    pub filled: bool,
}

impl FillStatus {
    pub fn filled(proceeds: f64) -> Self {
        Self {
            proceeds,
            filled: true,
        }
    }

    pub fn pending() -> Self {
        Self::default()
    }
}
