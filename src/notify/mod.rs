//! One-way notification sink for operator summaries and spread alerts
//!
//! Delivery failures are logged by the caller and never retried.

use async_trait::async_trait;
use thiserror::Error;

pub mod alerts;
pub mod discord;

pub use discord::DiscordNotifier;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Notification request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Notification rejected ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Invalid notification setup: {0}")]
    InvalidSetup(String),
}

pub type NotifyResult<T> = std::result::Result<T, NotifyError>;

/// Plain-text message sink
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `message` to `destination` (a chat channel id)
    async fn send(&self, destination: &str, message: &str) -> NotifyResult<()>;

    /// Channel that receives summaries and operator alerts
    fn operator_destination(&self) -> &str;
}

/// Sink that only writes to the log (no chat credentials configured)
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, destination: &str, message: &str) -> NotifyResult<()> {
        tracing::info!(destination = destination, message = message, "Notification");
        Ok(())
    }

    fn operator_destination(&self) -> &str {
        "log"
    }
}

/// Send to the operator channel, logging instead of failing; true when delivered
pub async fn notify_operator(notifier: &dyn Notifier, message: &str) -> bool {
    deliver(notifier, notifier.operator_destination(), message).await
}

/// Send to any destination, logging instead of failing; true when delivered
pub async fn deliver(notifier: &dyn Notifier, destination: &str, message: &str) -> bool {
    if message.is_empty() {
        return false;
    }
    match notifier.send(destination, message).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(destination = destination, error = %e, "Notification delivery failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn send(&self, _destination: &str, _message: &str) -> NotifyResult<()> {
            Err(NotifyError::Rejected { status: 500, body: "down".to_string() })
        }

        fn operator_destination(&self) -> &str {
            "ops"
        }
    }

    #[tokio::test]
    async fn test_deliver_swallows_failures() {
        assert!(!deliver(&FailingNotifier, "ops", "hello").await);
    }

    #[tokio::test]
    async fn test_deliver_skips_empty_messages() {
        assert!(!deliver(&LogNotifier, "log", "").await);
        assert!(deliver(&LogNotifier, "log", "hello").await);
    }

    #[test]
    fn test_rejected_display() {
        let err = NotifyError::Rejected { status: 403, body: "Missing Access".to_string() };
        assert_eq!(err.to_string(), "Notification rejected (403): Missing Access");
    }
}
