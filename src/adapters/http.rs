//! REST plumbing shared by the exchange adapters

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::adapters::errors::{ExchangeError, ExchangeResult};
use crate::config::constants::http_timeout;

/// Build the pooled HTTP client used by one adapter
pub(crate) fn build_http_client(exchange: &'static str) -> ExchangeResult<reqwest::Client> {
    let timeout = http_timeout();
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .pool_max_idle_per_host(2)
        .connect_timeout(timeout)
        .build()
        .map_err(|e| ExchangeError::ConnectionFailed(format!("{} HTTP client: {}", exchange, e)))?;
    tracing::info!(exchange = exchange, timeout_ms = timeout.as_millis() as u64, "HTTP client configured");
    Ok(client)
}

/// Map a transport failure
pub(crate) fn request_error(err: reqwest::Error) -> ExchangeError {
    ExchangeError::from_request(err, http_timeout().as_millis() as u64)
}

/// Check the status code and decode the JSON body
pub(crate) async fn read_json<T: DeserializeOwned>(
    exchange: &'static str,
    response: reqwest::Response,
) -> ExchangeResult<T> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| ExchangeError::InvalidResponse(format!("Failed to read response: {}", e)))?;

    debug!(exchange = exchange, status = %status, body = %text, "Exchange response");

    if status.as_u16() == 401 || status.as_u16() == 403 {
        return Err(ExchangeError::AuthenticationFailed(format!(
            "{} rejected credentials ({}): {}",
            exchange, status, text
        )));
    }

    if !status.is_success() {
        return Err(ExchangeError::InvalidResponse(format!(
            "{} HTTP {}: {}",
            exchange, status, text
        )));
    }

    serde_json::from_str(&text)
        .map_err(|e| ExchangeError::InvalidResponse(format!("{} - {}", e, text)))
}

/// Parse a decimal transmitted as a JSON string
pub(crate) fn parse_decimal(field: &str, value: &str) -> ExchangeResult<f64> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| ExchangeError::InvalidResponse(format!("{} is not a number: {:?}", field, value)))
}
