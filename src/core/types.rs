//! Snapshot and record types persisted by the engine

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Cross-exchange pricing for one token at one instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub token: String,
    pub min_price: f64,
    pub max_price: f64,
    pub min_exchange: String,
    pub max_exchange: String,
    /// Percentage spread, 2 decimals
    pub difference: f64,
    pub timestamp: DateTime<Utc>,
}

/// Operator- or engine-raised halt marker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flag {
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl Flag {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// One quote as fetched during a cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub exchange: String,
    pub token: String,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

/// One free balance as fetched by the daily trigger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub exchange: String,
    pub token: String,
    pub amount: f64,
    pub timestamp: DateTime<Utc>,
}

/// Alert subscription for one chat destination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscriber {
    pub id: String,
    pub channel: String,
    #[serde(default)]
    pub on: bool,
    #[serde(default)]
    pub tokens: Vec<String>,
    /// Minimum rounded spread (percent) that triggers an alert
    pub threshold: f64,
    /// Minutes between two alerts
    pub frequency: i64,
    #[serde(default)]
    pub last_notification: Option<DateTime<Utc>>,
}

impl Subscriber {
    /// Active and past its quiet period
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        if !self.on {
            return false;
        }
        match self.last_notification {
            None => true,
            Some(last) => now - last >= Duration::minutes(self.frequency.max(0)),
        }
    }
}
