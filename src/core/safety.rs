//! Safety governor: flag gate and sub-profitable buy detection

use tracing::{error, warn};

use crate::core::types::Flag;
use crate::error::{AppError, Result};
use crate::store::Store;

/// Refuse to run while any flag is present
pub async fn ensure_no_flags(store: &dyn Store) -> Result<()> {
    let flags = store.flags().await?;
    if flags.is_empty() {
        return Ok(());
    }
    let messages: Vec<&str> = flags.iter().map(|f| f.message.as_str()).collect();
    let joined = messages.join("; ");
    error!(count = flags.len(), messages = %joined, "Flags present, trading halted");
    Err(AppError::Halted(joined))
}

/// Persist a flag and return the halting error
pub async fn raise_and_halt(store: &dyn Store, message: String) -> AppError {
    warn!(message = %message, "Raising safety flag");
    if let Err(e) = store.raise_flag(&Flag::new(message.clone())).await {
        error!(error = %e, "Failed to persist safety flag");
        return AppError::Store(e);
    }
    AppError::SafetyViolation(message)
}

/// Smallest buy quantity that still leaves a profit over `trade_quantity`
pub fn minimum_buy_quantity(trade_quantity: f64, margin_percent: f64) -> f64 {
    trade_quantity * (1.0 + margin_percent / 100.0)
}
