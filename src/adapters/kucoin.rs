//! KuCoin adapter (legacy v1 REST API)
//!
//! Signed requests carry `KC-API-KEY`, `KC-API-NONCE` and `KC-API-SIGNATURE`.
//! The signature covers `{endpoint}/{nonce}/{sorted query}`; see
//! [`kucoin_signature`]. Every response is wrapped in a
//! `{success, code, msg, data}` envelope.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info};

use crate::adapters::errors::{ExchangeError, ExchangeResult};
use crate::adapters::http::{build_http_client, read_json, request_error};
use crate::adapters::signing::kucoin_signature;
use crate::adapters::traits::{fail_closed, ExchangeAdapter};
use crate::adapters::types::{BalanceMap, FillStatus, OrderSide, PriceMap, Submission};
use crate::config::constants::transfer_amount_decimals;
use crate::config::ExchangeCredentials;
use crate::core::rounding::{format_decimal, to_fixed};

const EXCHANGE: &str = "kucoin";

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Tick {
    symbol: String,
    #[serde(default)]
    last_deal_price: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct CoinBalance {
    balance: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderAck {
    order_oid: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderDetail {
    #[serde(default)]
    deal_value_total: f64,
    pending_amount: f64,
}

#[derive(Debug, Deserialize)]
struct WalletRecords {
    #[serde(default)]
    datas: Vec<WalletRecord>,
}

#[derive(Debug, Deserialize)]
struct WalletRecord {
    amount: f64,
    status: String,
}

#[derive(Debug, Deserialize)]
struct WalletAddress {
    address: String,
}

// =============================================================================
// Adapter
// =============================================================================

pub struct KucoinAdapter {
    credentials: ExchangeCredentials,
    settlement_asset: String,
    http_client: reqwest::Client,
}

impl KucoinAdapter {
    pub fn new(credentials: ExchangeCredentials, settlement_asset: &str) -> ExchangeResult<Self> {
        Ok(Self {
            credentials,
            settlement_asset: settlement_asset.to_uppercase(),
            http_client: build_http_client(EXCHANGE)?,
        })
    }

    fn symbol(&self, token: &str) -> String {
        format!("{}-{}", token, self.settlement_asset)
    }

    fn url(&self, path: &str) -> ExchangeResult<Url> {
        Url::parse(&format!("{}{}", self.credentials.base_url, path))
            .map_err(|e| ExchangeError::ConnectionFailed(format!("Bad URL {}: {}", path, e)))
    }

    fn unwrap_envelope<T>(envelope: Envelope<T>) -> ExchangeResult<Option<T>> {
        if envelope.success {
            return Ok(envelope.data);
        }
        let code = envelope.code.unwrap_or_default();
        let msg = envelope.msg.unwrap_or_default();
        if code == "UNAUTH" {
            Err(ExchangeError::AuthenticationFailed(msg))
        } else {
            Err(ExchangeError::InvalidResponse(format!("{}: {}", code, msg)))
        }
    }

    async fn signed<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        mut params: Vec<(&str, String)>,
    ) -> ExchangeResult<Option<T>> {
        params.sort_by(|a, b| a.0.cmp(b.0));

        let mut url = self.url(path)?;
        if !params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &params {
                pairs.append_pair(key, value);
            }
        }
        let query = url.query().unwrap_or_default().to_string();
        let nonce = Utc::now().timestamp_millis();
        let signature = kucoin_signature(&self.credentials.api_secret, path, nonce, &query)?;

        debug!(exchange = EXCHANGE, method = %method, path = path, "Signed request");

        let response = self
            .http_client
            .request(method, url)
            .header("KC-API-KEY", &self.credentials.api_key)
            .header("KC-API-NONCE", nonce.to_string())
            .header("KC-API-SIGNATURE", signature)
            .send()
            .await
            .map_err(request_error)?;
        Self::unwrap_envelope(read_json::<Envelope<T>>(EXCHANGE, response).await?)
    }

    fn require<T>(data: Option<T>, what: &str) -> ExchangeResult<T> {
        data.ok_or_else(|| ExchangeError::InvalidResponse(format!("{} missing from response", what)))
    }

    async fn try_prices(&self, tokens: &[String]) -> ExchangeResult<PriceMap> {
        let response = self
            .http_client
            .get(self.url("/v1/open/tick")?)
            .send()
            .await
            .map_err(request_error)?;
        let envelope: Envelope<Vec<Tick>> = read_json(EXCHANGE, response).await?;
        let ticks = Self::require(Self::unwrap_envelope(envelope)?, "ticks")?;

        let mut prices = PriceMap::new();
        for token in tokens {
            let symbol = self.symbol(token);
            let last = ticks
                .iter()
                .find(|t| t.symbol == symbol)
                .and_then(|t| t.last_deal_price);
            if let Some(price) = last {
                prices.insert(token.clone(), price);
            }
        }
        Ok(prices)
    }

    async fn try_balances(&self, tokens: &[String]) -> ExchangeResult<BalanceMap> {
        let mut balances = BalanceMap::new();
        for token in tokens {
            let path = format!("/v1/account/{}/balance", token);
            let data: Option<CoinBalance> = self.signed(Method::GET, &path, Vec::new()).await?;
            if let Some(coin) = data {
                balances.insert(token.clone(), coin.balance);
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
        let params = vec![
            ("amount", format_decimal(quantity)),
            ("price", format_decimal(price)),
            ("symbol", self.symbol(token)),
            ("type", side.as_upper().to_string()),
        ];
        let ack: Option<OrderAck> = self
            .signed(Method::POST, "/v1/order", params)
            .await
            .map_err(|e| match e {
                ExchangeError::InvalidResponse(msg) => ExchangeError::OrderRejected(msg),
                other => other,
            })?;
        let ack = Self::require(ack, "orderOid")?;
        info!(exchange = EXCHANGE, side = side.as_upper(), token = token, order_id = %ack.order_oid, "Order placed");
        Ok(Submission::accepted(ack.order_oid))
    }

    async fn try_order(
        &self,
        side: OrderSide,
        token: &str,
        tx_id: &str,
    ) -> ExchangeResult<Option<OrderDetail>> {
        let params = vec![
            ("limit", "20".to_string()),
            ("orderOid", tx_id.to_string()),
            ("page", "1".to_string()),
            ("symbol", self.symbol(token)),
            ("type", side.as_upper().to_string()),
        ];
        self.signed(Method::GET, "/v1/order/detail", params).await
    }

    async fn try_check_sold(&self, token: &str, tx_id: &str) -> ExchangeResult<FillStatus> {
        match self.try_order(OrderSide::Sell, token, tx_id).await? {
            Some(detail) if detail.pending_amount == 0.0 => {
                Ok(FillStatus::filled(detail.deal_value_total))
            }
            _ => Ok(FillStatus::pending()),
        }
    }

    async fn try_check_bought(&self, token: &str, tx_id: &str) -> ExchangeResult<bool> {
        let detail = self.try_order(OrderSide::Buy, token, tx_id).await?;
        Ok(matches!(detail, Some(d) if d.pending_amount == 0.0))
    }

    async fn try_transfer(
        &self,
        asset: &str,
        destination: &str,
        amount: f64,
    ) -> ExchangeResult<Submission> {
        let path = format!("/v1/account/{}/withdraw/apply", asset);
        let params = vec![
            ("address", destination.to_string()),
            ("amount", format_decimal(amount)),
            ("coin", asset.to_string()),
        ];
        // The legacy API acknowledges withdrawals without an id
        let _: Option<serde_json::Value> = self
            .signed(Method::POST, &path, params)
            .await
            .map_err(|e| match e {
                ExchangeError::InvalidResponse(msg) => ExchangeError::WithdrawalRejected(msg),
                other => other,
            })?;
        Ok(Submission::accepted(String::new()))
    }

    async fn try_check_transferred(&self, expected_amount: f64) -> ExchangeResult<bool> {
        let path = format!("/v1/account/{}/wallet/records", self.settlement_asset);
        let params = vec![
            ("limit", "20".to_string()),
            ("page", "1".to_string()),
            ("type", "DEPOSIT".to_string()),
        ];
        let records: Option<WalletRecords> = self.signed(Method::GET, &path, params).await?;

        let decimals = transfer_amount_decimals();
        let expected = to_fixed(expected_amount, decimals);
        Ok(records
            .map(|r| r.datas)
            .unwrap_or_default()
            .iter()
            .any(|r| r.status == "SUCCESS" && to_fixed(r.amount, decimals) == expected))
    }

    async fn try_deposit_address(&self, asset: &str) -> ExchangeResult<String> {
        let path = format!("/v1/account/{}/wallet/address", asset);
        let data: Option<WalletAddress> = self.signed(Method::GET, &path, Vec::new()).await?;
        Ok(Self::require(data, "address")?.address)
    }
}

#[async_trait]
impl ExchangeAdapter for KucoinAdapter {
    fn exchange_name(&self) -> &'static str {
        EXCHANGE
    }

    async fn validate_credentials(&self) -> ExchangeResult<()> {
        let path = format!("/v1/account/{}/balance", self.settlement_asset);
        let _: Option<CoinBalance> = self.signed(Method::GET, &path, Vec::new()).await?;
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
        let result = self.try_check_bought(token, tx_id).await;
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

    fn adapter(url: &str) -> KucoinAdapter {
        KucoinAdapter::new(
            ExchangeCredentials {
                kind: ExchangeKind::Kucoin,
                base_url: url.to_string(),
                api_key: "kc-key".to_string(),
                api_secret: "kc-secret".to_string(),
                passphrase: None,
                trade_password: None,
                withdrawal_fee: 0.005,
            },
            "ETH",
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_get_prices_reads_last_deal_price() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/v1/open/tick")
            .with_status(200)
            .with_body(
                r#"{"success":true,"code":"OK","data":[
                    {"symbol":"NULS-ETH","lastDealPrice":0.05},
                    {"symbol":"REQ-ETH"},
                    {"symbol":"NULS-BTC","lastDealPrice":0.0001}
                ]}"#,
            )
            .create_async()
            .await;

        let prices = adapter(&server.url())
            .get_prices(&["NULS".to_string(), "REQ".to_string()])
            .await;

        assert_eq!(prices.get("NULS"), Some(&0.05));
        assert!(!prices.contains_key("REQ"));
    }

    #[tokio::test]
    async fn test_signed_request_carries_kucoin_headers() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/account/NULS/balance")
            .match_header("KC-API-KEY", "kc-key")
            .match_header("KC-API-NONCE", Matcher::Regex("^\\d+$".to_string()))
            .match_header("KC-API-SIGNATURE", Matcher::Regex("^[0-9a-f]{64}$".to_string()))
            .with_status(200)
            .with_body(r#"{"success":true,"data":{"coinType":"NULS","balance":10.0,"freezeBalance":0}}"#)
            .create_async()
            .await;

        let balances = adapter(&server.url()).get_balances(&["NULS".to_string()]).await;

        assert_eq!(balances.get("NULS"), Some(&10.0));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_place_sell_sorted_query() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/order")
            .match_query(Matcher::Exact(
                "amount=10&price=0.06&symbol=NULS-ETH&type=SELL".to_string(),
            ))
            .with_status(200)
            .with_body(r#"{"success":true,"code":"OK","data":{"orderOid":"5a1b"}}"#)
            .create_async()
            .await;

        let placed = adapter(&server.url()).place_sell("NULS", 10.0, 0.06).await;

        assert!(placed.accepted);
        assert_eq!(placed.tx_id, "5a1b");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unsuccessful_envelope_is_not_placed() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/order")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"success":false,"code":"ERROR","msg":"Insufficient balance"}"#)
            .create_async()
            .await;

        assert!(!adapter(&server.url()).place_sell("NULS", 10.0, 0.06).await.accepted);
    }

    #[tokio::test]
    async fn test_check_sold_requires_zero_pending() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/v1/order/detail")
            .match_query(Matcher::UrlEncoded("orderOid".to_string(), "5a1b".to_string()))
            .with_status(200)
            .with_body(r#"{"success":true,"data":{"dealValueTotal":0.6,"pendingAmount":0}}"#)
            .create_async()
            .await;

        let fill = adapter(&server.url()).check_sold("NULS", "5a1b").await;
        assert!(fill.filled);
        assert_eq!(fill.proceeds, 0.6);
    }

    #[tokio::test]
    async fn test_check_bought_pending_amount_left() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/v1/order/detail")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"success":true,"data":{"dealValueTotal":0.2,"pendingAmount":4}}"#)
            .create_async()
            .await;

        assert!(!adapter(&server.url()).check_bought("NULS", "5a1b").await);
    }

    #[tokio::test]
    async fn test_check_transferred_ignores_pending_deposits() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/v1/account/ETH/wallet/records")
            .match_query(Matcher::UrlEncoded("type".to_string(), "DEPOSIT".to_string()))
            .with_status(200)
            .with_body(
                r#"{"success":true,"data":{"datas":[
                    {"amount":0.59,"status":"PENDING"},
                    {"amount":0.3,"status":"SUCCESS"}
                ]}}"#,
            )
            .create_async()
            .await;

        let kucoin = adapter(&server.url());
        assert!(!kucoin.check_transferred(0.59).await);
        assert!(kucoin.check_transferred(0.3).await);
    }

    #[tokio::test]
    async fn test_validate_credentials_unauth_code() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/v1/account/ETH/balance")
            .with_status(200)
            .with_body(r#"{"success":false,"code":"UNAUTH","msg":"Invalid API Key"}"#)
            .create_async()
            .await;

        let result = adapter(&server.url()).validate_credentials().await;
        assert!(matches!(result, Err(ExchangeError::AuthenticationFailed(_))));
    }
}
