//! OKEx adapter (v3 spot and account APIs)
//!
//! Authentication: `OK-ACCESS-SIGN = base64(hmac(timestamp + METHOD + path + body))`
//! with the ISO-8601 millisecond timestamp echoed in `OK-ACCESS-TIMESTAMP`
//! and the API passphrase in `OK-ACCESS-PASSPHRASE`. Withdrawals also need
//! the fund password (`OKEX_TRADEPW`).

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::adapters::errors::{ExchangeError, ExchangeResult};
use crate::adapters::http::{build_http_client, parse_decimal, read_json, request_error};
use crate::adapters::signing::{hmac_sha256_base64, okex_prehash};
use crate::adapters::traits::{fail_closed, ExchangeAdapter};
use crate::adapters::types::{BalanceMap, FillStatus, OrderSide, PriceMap, Submission};
use crate::config::constants::transfer_amount_decimals;
use crate::config::ExchangeCredentials;
use crate::core::rounding::{format_decimal, to_fixed};

const EXCHANGE: &str = "okex";

/// Order state "fully filled"
const ORDER_FILLED: &str = "2";
/// Deposit status "credited"
const DEPOSIT_CREDITED: &str = "2";
/// Withdrawal destination code for an on-chain address
const DESTINATION_ONCHAIN: &str = "4";

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Deserialize)]
struct Ticker {
    instrument_id: String,
    last: String,
}

#[derive(Debug, Deserialize)]
struct SpotAccount {
    currency: String,
    available: String,
}

#[derive(Debug, Deserialize)]
struct OrderAck {
    #[serde(default)]
    order_id: String,
    result: bool,
    #[serde(default)]
    error_message: String,
}

#[derive(Debug, Deserialize)]
struct OrderDetail {
    state: String,
    #[serde(default)]
    filled_notional: String,
}

#[derive(Debug, Deserialize)]
struct WithdrawalAck {
    #[serde(default)]
    withdrawal_id: String,
    result: bool,
}

#[derive(Debug, Deserialize)]
struct Deposit {
    amount: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct DepositAddress {
    address: String,
}

// =============================================================================
// Adapter
// =============================================================================

pub struct OkexAdapter {
    credentials: ExchangeCredentials,
    settlement_asset: String,
    http_client: reqwest::Client,
}

impl OkexAdapter {
    pub fn new(credentials: ExchangeCredentials, settlement_asset: &str) -> ExchangeResult<Self> {
        Ok(Self {
            credentials,
            settlement_asset: settlement_asset.to_uppercase(),
            http_client: build_http_client(EXCHANGE)?,
        })
    }

    fn instrument(&self, token: &str) -> String {
        format!("{}-{}", token, self.settlement_asset)
    }

    async fn signed<T: DeserializeOwned>(
        &self,
        method: Method,
        request_path: &str,
        body: Option<serde_json::Value>,
    ) -> ExchangeResult<T> {
        let body_text = body.as_ref().map(|b| b.to_string()).unwrap_or_default();
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let prehash = okex_prehash(&timestamp, method.as_str(), request_path, &body_text);
        let signature = hmac_sha256_base64(&self.credentials.api_secret, &prehash)?;

        debug!(exchange = EXCHANGE, method = %method, path = request_path, "Signed request");

        let mut request = self
            .http_client
            .request(method, format!("{}{}", self.credentials.base_url, request_path))
            .header("OK-ACCESS-KEY", &self.credentials.api_key)
            .header("OK-ACCESS-SIGN", signature)
            .header("OK-ACCESS-TIMESTAMP", timestamp)
            .header(
                "OK-ACCESS-PASSPHRASE",
                self.credentials.passphrase.as_deref().unwrap_or_default(),
            )
            .header("Content-Type", "application/json");
        if !body_text.is_empty() {
            request = request.body(body_text);
        }

        let response = request.send().await.map_err(request_error)?;
        read_json(EXCHANGE, response).await
    }

    async fn try_prices(&self, tokens: &[String]) -> ExchangeResult<PriceMap> {
        let response = self
            .http_client
            .get(format!("{}/api/spot/v3/instruments/ticker", self.credentials.base_url))
            .send()
            .await
            .map_err(request_error)?;
        let tickers: Vec<Ticker> = read_json(EXCHANGE, response).await?;

        let mut prices = PriceMap::new();
        for token in tokens {
            let instrument = self.instrument(token);
            if let Some(ticker) = tickers.iter().find(|t| t.instrument_id == instrument) {
                prices.insert(token.clone(), parse_decimal("last", &ticker.last)?);
            }
        }
        Ok(prices)
    }

    async fn try_balances(&self, tokens: &[String]) -> ExchangeResult<BalanceMap> {
        let accounts: Vec<SpotAccount> =
            self.signed(Method::GET, "/api/spot/v3/accounts", None).await?;
        let mut balances = BalanceMap::new();
        for token in tokens {
            if let Some(account) = accounts.iter().find(|a| a.currency.eq_ignore_ascii_case(token)) {
                balances.insert(token.clone(), parse_decimal("available", &account.available)?);
            }
        }
        Ok(balances)
    }

    async fn try_place(
        &self,
        side: OrderSide,
        token: &str,
        quantity: f64,
        price: f64,
    ) -> ExchangeResult<Submission> {
        let body = json!({
            "type": "limit",
            "side": side.as_lower(),
            "instrument_id": self.instrument(token),
            "size": format_decimal(quantity),
            "price": format_decimal(price),
        });
        let ack: OrderAck = self
            .signed(Method::POST, "/api/spot/v3/orders", Some(body))
            .await?;
        if !ack.result || ack.order_id.is_empty() {
            return Err(ExchangeError::OrderRejected(ack.error_message));
        }
        info!(exchange = EXCHANGE, side = side.as_lower(), token = token, order_id = %ack.order_id, "Order placed");
        Ok(Submission::accepted(ack.order_id))
    }

    async fn try_order(&self, token: &str, tx_id: &str) -> ExchangeResult<OrderDetail> {
        let path = format!(
            "/api/spot/v3/orders/{}?instrument_id={}",
            tx_id,
            self.instrument(token)
        );
        self.signed(Method::GET, &path, None).await
    }

    async fn try_check_sold(&self, token: &str, tx_id: &str) -> ExchangeResult<FillStatus> {
        let order = self.try_order(token, tx_id).await?;
        if order.state != ORDER_FILLED {
            return Ok(FillStatus::pending());
        }
        Ok(FillStatus::filled(parse_decimal("filled_notional", &order.filled_notional)?))
    }

    async fn try_transfer(
        &self,
        asset: &str,
        destination: &str,
        amount: f64,
    ) -> ExchangeResult<Submission> {
        let trade_pwd = self.credentials.trade_password.as_deref().ok_or_else(|| {
            ExchangeError::WithdrawalRejected("OKEX_TRADEPW is not configured".to_string())
        })?;
        let fee = if asset.eq_ignore_ascii_case(&self.settlement_asset) {
            self.credentials.withdrawal_fee
        } else {
            0.0
        };
        let body = json!({
            "currency": asset.to_lowercase(),
            "amount": format_decimal(amount),
            "destination": DESTINATION_ONCHAIN,
            "to_address": destination,
            "trade_pwd": trade_pwd,
            "fee": format_decimal(fee),
        });
        let ack: WithdrawalAck = self
            .signed(Method::POST, "/api/account/v3/withdrawal", Some(body))
            .await?;
        if !ack.result {
            return Err(ExchangeError::WithdrawalRejected(format!(
                "{} withdrawal of {} not accepted",
                asset, amount
            )));
        }
        Ok(Submission::accepted(ack.withdrawal_id))
    }

    async fn try_check_transferred(&self, expected_amount: f64) -> ExchangeResult<bool> {
        let path = format!(
            "/api/account/v3/deposit/history/{}",
            self.settlement_asset.to_lowercase()
        );
        let deposits: Vec<Deposit> = self.signed(Method::GET, &path, None).await?;

        let decimals = transfer_amount_decimals();
        let expected = to_fixed(expected_amount, decimals);
        for deposit in deposits.iter().filter(|d| d.status == DEPOSIT_CREDITED) {
            if to_fixed(parse_decimal("amount", &deposit.amount)?, decimals) == expected {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn try_deposit_address(&self, asset: &str) -> ExchangeResult<String> {
        let path = format!(
            "/api/account/v3/deposit/address?currency={}",
            asset.to_lowercase()
        );
        let addresses: Vec<DepositAddress> = self.signed(Method::GET, &path, None).await?;
        addresses
            .into_iter()
            .next()
            .map(|a| a.address)
            .ok_or_else(|| ExchangeError::InvalidResponse(format!("No deposit address for {}", asset)))
    }
}

#[async_trait]
impl ExchangeAdapter for OkexAdapter {
    fn exchange_name(&self) -> &'static str {
        EXCHANGE
    }

    async fn validate_credentials(&self) -> ExchangeResult<()> {
        let _: Vec<SpotAccount> = self.signed(Method::GET, "/api/spot/v3/accounts", None).await?;
        info!(exchange = EXCHANGE, "Credentials validated");
        Ok(())
    }

    async fn get_prices(&self, tokens: &[String]) -> PriceMap {
        fail_closed(EXCHANGE, "get_prices", self.try_prices(tokens).await, PriceMap::new())
    }

    async fn get_balances(&self, tokens: &[String]) -> BalanceMap {
        fail_closed(EXCHANGE, "get_balances", self.try_balances(tokens).await, BalanceMap::new())
    }

    async fn place_sell(&self, token: &str, quantity: f64, price: f64) -> Submission {
        let result = self.try_place(OrderSide::Sell, token, quantity, price).await;
        fail_closed(EXCHANGE, "place_sell", result, Submission::not_confirmed())
    }

    async fn check_sold(&self, token: &str, tx_id: &str) -> FillStatus {
        let result = self.try_check_sold(token, tx_id).await;
        fail_closed(EXCHANGE, "check_sold", result, FillStatus::pending())
    }

    async fn start_transfer(&self, asset: &str, destination: &str, amount: f64) -> Submission {
        let result = self.try_transfer(asset, destination, amount).await;
        fail_closed(EXCHANGE, "start_transfer", result, Submission::not_confirmed())
    }

    async fn check_transferred(&self, expected_amount: f64) -> bool {
        let result = self.try_check_transferred(expected_amount).await;
        fail_closed(EXCHANGE, "check_transferred", result, false)
    }

    async fn place_buy(&self, token: &str, quantity: f64, price: f64) -> Submission {
        let result = self.try_place(OrderSide::Buy, token, quantity, price).await;
        fail_closed(EXCHANGE, "place_buy", result, Submission::not_confirmed())
    }

    async fn check_bought(&self, token: &str, tx_id: &str) -> bool {
        let result = self
            .try_order(token, tx_id)
            .await
            .map(|order| order.state == ORDER_FILLED);
        fail_closed(EXCHANGE, "check_bought", result, false)
    }

    async fn deposit_address(&self, asset: &str) -> Option<String> {
        let result = self.try_deposit_address(asset).await.map(Some);
        fail_closed(EXCHANGE, "deposit_address", result, None)
    }
}

// =============================================================================
// Tests
// =============================================================================
