//! Adapter factory for dynamic exchange selection
//!
//! Creates `ExchangeAdapter` instances from configured credentials.
//! Uses an enum-based dispatch pattern for the concrete adapters.

use async_trait::async_trait;

use crate::adapters::binance::BinanceAdapter;
use crate::adapters::errors::ExchangeResult;
use crate::adapters::kucoin::KucoinAdapter;
use crate::adapters::okex::OkexAdapter;
use crate::adapters::traits::ExchangeAdapter;
use crate::adapters::types::{BalanceMap, FillStatus, PriceMap, Submission};
use crate::config::{ExchangeCredentials, ExchangeKind};

// =============================================================================
// AnyAdapter — enum-based dispatch for dynamic exchange selection
// =============================================================================

/// Enum wrapping all concrete adapter types for runtime dispatch.
pub enum AnyAdapter {
    Binance(BinanceAdapter),
    Kucoin(KucoinAdapter),
    Okex(OkexAdapter),
}

/// Macro to reduce boilerplate for delegating trait methods
macro_rules! delegate {
    ($self:expr, $method:ident ( $($arg:expr),* )) => {
        match $self {
            AnyAdapter::Binance(a) => a.$method($($arg),*),
            AnyAdapter::Kucoin(a) => a.$method($($arg),*),
            AnyAdapter::Okex(a) => a.$method($($arg),*),
        }
    };
    (await $self:expr, $method:ident ( $($arg:expr),* )) => {
        match $self {
            AnyAdapter::Binance(a) => a.$method($($arg),*).await,
            AnyAdapter::Kucoin(a) => a.$method($($arg),*).await,
            AnyAdapter::Okex(a) => a.$method($($arg),*).await,
        }
    };
}

#[async_trait]
impl ExchangeAdapter for AnyAdapter {
    fn exchange_name(&self) -> &'static str {
        delegate!(self, exchange_name())
    }

    async fn validate_credentials(&self) -> ExchangeResult<()> {
        delegate!(await self, validate_credentials())
    }

    async fn get_prices(&self, tokens: &[String]) -> PriceMap {
        delegate!(await self, get_prices(tokens))
    }

    async fn get_balances(&self, tokens: &[String]) -> BalanceMap {
        delegate!(await self, get_balances(tokens))
    }

    async fn place_sell(&self, token: &str, quantity: f64, price: f64) -> Submission {
        delegate!(await self, place_sell(token, quantity, price))
    }

    async fn check_sold(&self, token: &str, tx_id: &str) -> FillStatus {
        delegate!(await self, check_sold(token, tx_id))
    }

    async fn start_transfer(&self, asset: &str, destination: &str, amount: f64) -> Submission {
        delegate!(await self, start_transfer(asset, destination, amount))
    }

    async fn check_transferred(&self, expected_amount: f64) -> bool {
        delegate!(await self, check_transferred(expected_amount))
    }

    async fn place_buy(&self, token: &str, quantity: f64, price: f64) -> Submission {
        delegate!(await self, place_buy(token, quantity, price))
    }

    async fn check_bought(&self, token: &str, tx_id: &str) -> bool {
        delegate!(await self, check_bought(token, tx_id))
    }

    async fn deposit_address(&self, asset: &str) -> Option<String> {
        delegate!(await self, deposit_address(asset))
    }
}

// =============================================================================
// Factory
// =============================================================================

/// Build the adapter matching the credentials' exchange kind
pub fn create_adapter(
    credentials: &ExchangeCredentials,
    settlement_asset: &str,
) -> ExchangeResult<AnyAdapter> {
    tracing::info!(exchange = %credentials.kind, url = %credentials.base_url, "Creating exchange adapter");
    let adapter = match credentials.kind {
        ExchangeKind::Binance => {
            AnyAdapter::Binance(BinanceAdapter::new(credentials.clone(), settlement_asset)?)
        }
        ExchangeKind::Kucoin => {
            AnyAdapter::Kucoin(KucoinAdapter::new(credentials.clone(), settlement_asset)?)
        }
        ExchangeKind::Okex => {
            AnyAdapter::Okex(OkexAdapter::new(credentials.clone(), settlement_asset)?)
        }
    };
    Ok(adapter)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials(kind: ExchangeKind) -> ExchangeCredentials {
        ExchangeCredentials {
            kind,
            base_url: kind.default_url().to_string(),
            api_key: "k".to_string(),
            api_secret: "s".to_string(),
            passphrase: Some("p".to_string()),
            trade_password: None,
            withdrawal_fee: 0.0,
        }
    }

    #[test]
    fn test_create_adapter_matches_kind() {
        for kind in [ExchangeKind::Binance, ExchangeKind::Kucoin, ExchangeKind::Okex] {
            let adapter = create_adapter(&credentials(kind), "ETH").unwrap();
            assert_eq!(adapter.exchange_name(), kind.to_string());
        }
    }

    #[test]
    fn test_any_adapter_variant() {
        let adapter = create_adapter(&credentials(ExchangeKind::Okex), "ETH").unwrap();
        assert!(matches!(adapter, AnyAdapter::Okex(_)));
    }
}
