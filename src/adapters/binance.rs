//! Binance spot adapter
//!
//! Public quotes come from `/api/v3/ticker/price`; everything else is a
//! signed request (`timestamp` + hex HMAC `signature` query parameters,
//! `X-MBX-APIKEY` header). Symbols are `{TOKEN}{ASSET}`, e.g. `NULSETH`.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info};

use crate::adapters::errors::{ExchangeError, ExchangeResult};
use crate::adapters::http::{build_http_client, parse_decimal, read_json, request_error};
use crate::adapters::signing::hmac_sha256_hex;
use crate::adapters::traits::{fail_closed, ExchangeAdapter};
use crate::adapters::types::{BalanceMap, FillStatus, OrderSide, PriceMap, Submission};
use crate::config::constants::transfer_amount_decimals;
use crate::config::ExchangeCredentials;
use crate::core::logging::sanitize_signature;
use crate::core::rounding::{format_decimal, to_fixed};

const EXCHANGE: &str = "binance";

/// Deposit history status meaning "credited"
const DEPOSIT_SUCCESS: i64 = 1;

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Deserialize)]
struct TickerPrice {
    symbol: String,
    price: String,
}

#[derive(Debug, Deserialize)]
struct AccountInfo {
    balances: Vec<AssetBalance>,
}

#[derive(Debug, Deserialize)]
struct AssetBalance {
    asset: String,
    free: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderAck {
    order_id: u64,
}

#[derive(Debug, Deserialize)]
struct OrderDetail {
    status: String,
    #[serde(rename = "cummulativeQuoteQty")]
    cumulative_quote_qty: String,
}

#[derive(Debug, Deserialize)]
struct WithdrawAck {
    id: String,
}

#[derive(Debug, Deserialize)]
struct DepositRecord {
    amount: String,
    status: i64,
}

#[derive(Debug, Deserialize)]
struct DepositAddress {
    address: String,
}

// =============================================================================
// Adapter
// =============================================================================

pub struct BinanceAdapter {
    credentials: ExchangeCredentials,
    settlement_asset: String,
    http_client: reqwest::Client,
}

impl BinanceAdapter {
    pub fn new(credentials: ExchangeCredentials, settlement_asset: &str) -> ExchangeResult<Self> {
        Ok(Self {
            credentials,
            settlement_asset: settlement_asset.to_uppercase(),
            http_client: build_http_client(EXCHANGE)?,
        })
    }

    fn symbol(&self, token: &str) -> String {
        format!("{}{}", token, self.settlement_asset)
    }

    fn url(&self, path: &str) -> ExchangeResult<Url> {
        Url::parse(&format!("{}{}", self.credentials.base_url, path))
            .map_err(|e| ExchangeError::ConnectionFailed(format!("Bad URL {}: {}", path, e)))
    }

    async fn signed<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
    ) -> ExchangeResult<T> {
        let mut url = self.url(path)?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
            pairs.append_pair("timestamp", &Utc::now().timestamp_millis().to_string());
        }
        let query = url.query().unwrap_or_default().to_string();
        let signature = hmac_sha256_hex(&self.credentials.api_secret, &query)?;
        url.query_pairs_mut().append_pair("signature", &signature);

        debug!(
            exchange = EXCHANGE,
            method = %method,
            path = path,
            signature = %sanitize_signature(&signature),
            "Signed request"
        );

        let response = self
            .http_client
            .request(method, url)
            .header("X-MBX-APIKEY", &self.credentials.api_key)
            .send()
            .await
            .map_err(request_error)?;
        read_json(EXCHANGE, response).await
    }

    async fn try_prices(&self, tokens: &[String]) -> ExchangeResult<PriceMap> {
        let response = self
            .http_client
            .get(self.url("/api/v3/ticker/price")?)
            .send()
            .await
            .map_err(request_error)?;
        let tickers: Vec<TickerPrice> = read_json(EXCHANGE, response).await?;

        let mut prices = PriceMap::new();
        for token in tokens {
            let symbol = self.symbol(token);
            if let Some(ticker) = tickers.iter().find(|t| t.symbol == symbol) {
                prices.insert(token.clone(), parse_decimal("price", &ticker.price)?);
            }
        }
        Ok(prices)
    }

    async fn try_balances(&self, tokens: &[String]) -> ExchangeResult<BalanceMap> {
        let account: AccountInfo = self.signed(Method::GET, "/api/v3/account", &[]).await?;
        let mut balances = BalanceMap::new();
        for token in tokens {
            if let Some(entry) = account.balances.iter().find(|b| &b.asset == token) {
                balances.insert(token.clone(), parse_decimal("free", &entry.free)?);
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
        let params = [
            ("symbol", self.symbol(token)),
            ("side", side.as_upper().to_string()),
            ("type", "LIMIT".to_string()),
            ("timeInForce", "GTC".to_string()),
            ("quantity", format_decimal(quantity)),
            ("price", format_decimal(price)),
        ];
        let ack: OrderAck = self
            .signed(Method::POST, "/api/v3/order", &params)
            .await
            .map_err(|e| match e {
                ExchangeError::InvalidResponse(msg) => ExchangeError::OrderRejected(msg),
                other => other,
            })?;
        info!(exchange = EXCHANGE, side = side.as_upper(), token = token, order_id = ack.order_id, "Order placed");
        Ok(Submission::accepted(ack.order_id.to_string()))
    }

    async fn try_order(&self, token: &str, tx_id: &str) -> ExchangeResult<OrderDetail> {
        let params = [("symbol", self.symbol(token)), ("orderId", tx_id.to_string())];
        self.signed(Method::GET, "/api/v3/order", &params).await
    }

    async fn try_check_sold(&self, token: &str, tx_id: &str) -> ExchangeResult<FillStatus> {
        let order = self.try_order(token, tx_id).await?;
        if order.status != "FILLED" {
            return Ok(FillStatus::pending());
        }
        let proceeds = parse_decimal("cummulativeQuoteQty", &order.cumulative_quote_qty)?;
        Ok(FillStatus::filled(proceeds))
    }

    async fn try_transfer(
        &self,
        asset: &str,
        destination: &str,
        amount: f64,
    ) -> ExchangeResult<Submission> {
        let params = [
            ("coin", asset.to_string()),
            ("address", destination.to_string()),
            ("amount", format_decimal(amount)),
        ];
        let ack: WithdrawAck = self
            .signed(Method::POST, "/sapi/v1/capital/withdraw/apply", &params)
            .await
            .map_err(|e| match e {
                ExchangeError::InvalidResponse(msg) => ExchangeError::WithdrawalRejected(msg),
                other => other,
            })?;
        Ok(Submission::accepted(ack.id))
    }

    async fn try_check_transferred(&self, expected_amount: f64) -> ExchangeResult<bool> {
        let params = [
            ("coin", self.settlement_asset.clone()),
            ("status", DEPOSIT_SUCCESS.to_string()),
        ];
        let deposits: Vec<DepositRecord> = self
            .signed(Method::GET, "/sapi/v1/capital/deposit/hisrec", &params)
            .await?;

        let decimals = transfer_amount_decimals();
        let expected = to_fixed(expected_amount, decimals);
        for deposit in deposits.iter().filter(|d| d.status == DEPOSIT_SUCCESS) {
            if to_fixed(parse_decimal("amount", &deposit.amount)?, decimals) == expected {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn try_deposit_address(&self, asset: &str) -> ExchangeResult<String> {
        let params = [("coin", asset.to_string())];
        let reply: DepositAddress = self
            .signed(Method::GET, "/sapi/v1/capital/deposit/address", &params)
            .await?;
        Ok(reply.address)
    }
}

#[async_trait]
impl ExchangeAdapter for BinanceAdapter {
    fn exchange_name(&self) -> &'static str {
        EXCHANGE
    }

    async fn validate_credentials(&self) -> ExchangeResult<()> {
        let _: AccountInfo = self.signed(Method::GET, "/api/v3/account", &[]).await?;
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
            .map(|order| order.status == "FILLED");
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExchangeKind;
    use mockito::Matcher;

    fn adapter(url: &str) -> BinanceAdapter {
        BinanceAdapter::new(
            ExchangeCredentials {
                kind: ExchangeKind::Binance,
                base_url: url.to_string(),
                api_key: "test-key".to_string(),
                api_secret: "test-secret".to_string(),
                passphrase: None,
                trade_password: None,
                withdrawal_fee: 0.01,
            },
            "ETH",
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_get_prices_filters_settlement_pairs() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v3/ticker/price")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[{"symbol":"NULSETH","price":"0.06"},{"symbol":"NULSBTC","price":"0.001"},{"symbol":"LINKETH","price":"0.0031"}]"#,
            )
            .create_async()
            .await;

        let prices = adapter(&server.url())
            .get_prices(&["NULS".to_string(), "REQ".to_string()])
            .await;

        assert_eq!(prices.len(), 1);
        assert_eq!(prices.get("NULS"), Some(&0.06));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_balances_is_signed() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v3/account")
            .match_query(Matcher::AllOf(vec![
                Matcher::Regex("timestamp=\\d+".to_string()),
                Matcher::Regex("signature=[0-9a-f]{64}".to_string()),
            ]))
            .match_header("X-MBX-APIKEY", "test-key")
            .with_status(200)
            .with_body(r#"{"balances":[{"asset":"NULS","free":"12.5","locked":"0"},{"asset":"ETH","free":"1.0","locked":"0"}]}"#)
            .create_async()
            .await;

        let balances = adapter(&server.url()).get_balances(&["NULS".to_string()]).await;

        assert_eq!(balances.get("NULS"), Some(&12.5));
        assert!(!balances.contains_key("ETH"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_place_sell_returns_order_id() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v3/order")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("symbol".to_string(), "NULSETH".to_string()),
                Matcher::UrlEncoded("side".to_string(), "SELL".to_string()),
                Matcher::UrlEncoded("quantity".to_string(), "10".to_string()),
                Matcher::UrlEncoded("price".to_string(), "0.06".to_string()),
            ]))
            .with_status(200)
            .with_body(r#"{"symbol":"NULSETH","orderId":28,"status":"NEW"}"#)
            .create_async()
            .await;

        let placed = adapter(&server.url()).place_sell("NULS", 10.0, 0.06).await;

        assert!(placed.accepted);
        assert_eq!(placed.tx_id, "28");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_place_sell_rejected_is_not_placed() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/v3/order")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"code":-2010,"msg":"Account has insufficient balance"}"#)
            .create_async()
            .await;

        let placed = adapter(&server.url()).place_sell("NULS", 10.0, 0.06).await;
        assert!(!placed.accepted);
    }

    #[tokio::test]
    async fn test_check_sold_reports_quote_proceeds() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v3/order")
            .match_query(Matcher::UrlEncoded("orderId".to_string(), "28".to_string()))
            .with_status(200)
            .with_body(r#"{"orderId":28,"status":"FILLED","cummulativeQuoteQty":"0.60000000"}"#)
            .create_async()
            .await;

        let fill = adapter(&server.url()).check_sold("NULS", "28").await;
        assert!(fill.filled);
        assert_eq!(fill.proceeds, 0.6);
    }

    #[tokio::test]
    async fn test_check_sold_partial_fill_is_pending() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v3/order")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"orderId":28,"status":"PARTIALLY_FILLED","cummulativeQuoteQty":"0.3"}"#)
            .create_async()
            .await;

        let fill = adapter(&server.url()).check_sold("NULS", "28").await;
        assert!(!fill.filled);
    }

    #[tokio::test]
    async fn test_check_transferred_matches_rounded_amount() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/sapi/v1/capital/deposit/hisrec")
            .match_query(Matcher::UrlEncoded("coin".to_string(), "ETH".to_string()))
            .with_status(200)
            .with_body(r#"[{"amount":"0.1","status":1},{"amount":"0.5900004","status":1}]"#)
            .create_async()
            .await;

        let binance = adapter(&server.url());
        assert!(binance.check_transferred(0.59).await);
        assert!(!binance.check_transferred(0.58).await);
    }

    #[tokio::test]
    async fn test_deposit_address_failure_is_none() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/sapi/v1/capital/deposit/address")
            .match_query(Matcher::Any)
            .with_status(500)
            .create_async()
            .await;

        assert_eq!(adapter(&server.url()).deposit_address("ETH").await, None);
    }

    #[tokio::test]
    async fn test_validate_credentials_rejects_bad_key() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v3/account")
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body(r#"{"code":-2015,"msg":"Invalid API-key"}"#)
            .create_async()
            .await;

        let result = adapter(&server.url()).validate_credentials().await;
        assert!(matches!(result, Err(ExchangeError::AuthenticationFailed(_))));
    }
}
