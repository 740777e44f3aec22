//! Core module - comparison engine, eligibility, transaction state machine,
//! safety governor, cycle coordination and scheduling
//!
//! Re-exports are explicit so the public surface only changes on purpose.

pub mod comparison;
pub mod coordinator;
pub mod eligibility;
pub mod logging;
pub mod rounding;
pub mod runtime;
pub mod safety;
pub mod state_machine;
pub mod transaction;
pub mod types;

pub use comparison::{compare_all, compare_token, spread_percent, TokenQuotes};
pub use coordinator::{CycleCoordinator, CycleReport};
pub use eligibility::{eligible_tokens, is_eligible, MIN_FUNDED_EXCHANGES};
pub use logging::{init_logging, sanitize, sanitize_signature, SanitizedValue, DEFAULT_LOG_LEVEL};
pub use safety::{ensure_no_flags, minimum_buy_quantity, raise_and_halt};
pub use state_machine::{StepOutcome, TransactionEngine};
pub use transaction::{Transaction, TransactionStatus};
pub use types::{BalanceSnapshot, Comparison, Flag, PriceSnapshot, Subscriber};
