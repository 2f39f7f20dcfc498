// src/connectors/kucoin.rs
use crate::config::Credentials;
use crate::connectors::messages::{
    AccountEntry, KucoinOrder, KucoinResponse, Level1Ticker, MarketOrderRequest, PlacedOrder,
};
use crate::connectors::traits::ExchangeClient;
use crate::error::{BotError, Result};
use crate::types::{AccountType, OrderDetails, Side, Ticker};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use sha2::Sha256;
use tracing::{debug, info};

type HmacSha256 = Hmac<Sha256>;

const API_KEY_VERSION: &str = "2";

pub struct KucoinClient {
    credentials: Credentials,
    http_client: Client,
    base_rest_url: String,
}

impl KucoinClient {
    pub fn new(credentials: Credentials, base_rest_url: impl Into<String>) -> Self {
        Self {
            credentials,
            http_client: Client::new(),
            base_rest_url: base_rest_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn sign(&self, payload: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.credentials.secret_key.as_bytes())
            .map_err(|e| BotError::Authentication(format!("invalid secret key: {}", e)))?;
        mac.update(payload.as_bytes());
        Ok(BASE64.encode(mac.finalize().into_bytes()))
    }

    /// Builds the `KC-API-*` headers. The prehash string is
    /// `timestamp + METHOD + endpoint(with query) + body`.
    fn auth_headers(
        &self,
        method: &Method,
        endpoint: &str,
        body: &str,
    ) -> Result<Vec<(&'static str, String)>> {
        let timestamp = Utc::now().timestamp_millis().to_string();
        let prehash = format!("{}{}{}{}", timestamp, method.as_str(), endpoint, body);
        Ok(vec![
            ("KC-API-KEY", self.credentials.api_key.clone()),
            ("KC-API-SIGN", self.sign(&prehash)?),
            ("KC-API-TIMESTAMP", timestamp),
            ("KC-API-PASSPHRASE", self.sign(&self.credentials.passphrase)?),
            ("KC-API-KEY-VERSION", API_KEY_VERSION.to_string()),
        ])
    }

    async fn send_request<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<String>,
        signed: bool,
    ) -> Result<T> {
        let url = format!("{}{}", self.base_rest_url, endpoint);
        let body = body.unwrap_or_default();

        let mut request = self.http_client.request(method.clone(), &url);
        if signed {
            for (name, value) in self.auth_headers(&method, endpoint, &body)? {
                request = request.header(name, value);
            }
        }
        if !body.is_empty() {
            request = request
                .header("Content-Type", "application/json")
                .body(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        debug!("{} {} -> {}", method, endpoint, status);

        let envelope: KucoinResponse<T> = match serde_json::from_str(&text) {
            Ok(envelope) => envelope,
            Err(e) => {
                if status == StatusCode::UNAUTHORIZED {
                    return Err(BotError::Authentication(text));
                }
                return Err(BotError::api(
                    status.as_u16().to_string(),
                    format!("unreadable response ({}): {}", e, text),
                ));
            }
        };

        if !envelope.is_success() {
            let message = envelope.msg.unwrap_or_default();
            if status == StatusCode::UNAUTHORIZED || is_auth_code(&envelope.code) {
                return Err(BotError::Authentication(format!(
                    "{} ({})",
                    message, envelope.code
                )));
            }
            return Err(BotError::Api {
                code: envelope.code,
                message,
            });
        }

        envelope
            .data
            .ok_or_else(|| BotError::api("200000", format!("{} returned no data", endpoint)))
    }

    async fn place_market_order(
        &self,
        client_oid: &str,
        pair: &str,
        side: Side,
        funds: Option<Decimal>,
        size: Option<Decimal>,
    ) -> Result<String> {
        let request = MarketOrderRequest {
            client_oid,
            side: side.as_str(),
            symbol: pair,
            order_type: "market",
            funds: funds.map(|f| f.normalize().to_string()),
            size: size.map(|s| s.normalize().to_string()),
        };
        let body = serde_json::to_string(&request)
            .map_err(|e| BotError::api("serialize", e.to_string()))?;

        info!(
            "Sending market {} on {} (funds: {:?}, size: {:?})",
            side, pair, request.funds, request.size
        );

        let placed: PlacedOrder = self
            .send_request(Method::POST, "/api/v1/orders", Some(body), true)
            .await
            .map_err(|e| match e {
                BotError::Api { code, message } => BotError::OrderSubmission {
                    symbol: pair.to_string(),
                    reason: format!("{} ({})", message, code),
                },
                other => other,
            })?;

        Ok(placed.order_id)
    }
}

/// KuCoin reports key, passphrase, signature and timestamp problems as 400001-400007.
fn is_auth_code(code: &str) -> bool {
    matches!(
        code,
        "400001" | "400002" | "400003" | "400004" | "400005" | "400006" | "400007"
    )
}

#[async_trait]
impl ExchangeClient for KucoinClient {
    async fn validate_credentials(&self) -> Result<()> {
        self.send_request::<serde_json::Value>(Method::GET, "/api/v1/sub/user", None, true)
            .await?;
        Ok(())
    }

    async fn get_ticker(&self, pair: &str) -> Result<Ticker> {
        let query = serde_urlencoded::to_string(vec![("symbol", pair)])
            .map_err(|e| BotError::api("serialize", e.to_string()))?;
        let endpoint = format!("/api/v1/market/orderbook/level1?{}", query);

        let level1: Level1Ticker = self
            .send_request(Method::GET, &endpoint, None, false)
            .await?;

        let price = level1
            .price
            .ok_or_else(|| BotError::api("no-price", format!("no last price for {}", pair)))?;

        Ok(Ticker {
            symbol: pair.to_string(),
            price,
            timestamp: level1
                .time
                .unwrap_or_else(|| Utc::now().timestamp_millis() as u64),
        })
    }

    async fn get_balance(&self, currency: &str, account_type: AccountType) -> Result<Decimal> {
        let query = serde_urlencoded::to_string(vec![
            ("currency", currency),
            ("type", account_type.as_str()),
        ])
        .map_err(|e| BotError::api("serialize", e.to_string()))?;
        let endpoint = format!("/api/v1/accounts?{}", query);

        let accounts: Vec<AccountEntry> = self
            .send_request(Method::GET, &endpoint, None, true)
            .await?;

        // An account that was never funded is not listed at all.
        Ok(accounts
            .iter()
            .find(|a| a.currency.eq_ignore_ascii_case(currency))
            .map(|a| a.available)
            .unwrap_or(Decimal::ZERO))
    }

    async fn place_market_buy(
        &self,
        client_oid: &str,
        pair: &str,
        funds: Decimal,
    ) -> Result<String> {
        self.place_market_order(client_oid, pair, Side::Buy, Some(funds), None)
            .await
    }

    async fn place_market_sell(
        &self,
        client_oid: &str,
        pair: &str,
        size: Decimal,
    ) -> Result<String> {
        self.place_market_order(client_oid, pair, Side::Sell, None, Some(size))
            .await
    }

    async fn get_order(&self, order_id: &str) -> Result<OrderDetails> {
        let endpoint = format!("/api/v1/orders/{}", order_id);
        let order: KucoinOrder = self
            .send_request(Method::GET, &endpoint, None, true)
            .await?;
        Ok(order.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use rust_decimal_macros::dec;

    fn client(url: String) -> KucoinClient {
        KucoinClient::new(
            Credentials {
                api_key: "key".into(),
                secret_key: "secret".into(),
                passphrase: "pass".into(),
            },
            url,
        )
    }

    #[test]
    fn signature_is_base64_hmac_sha256() {
        let c = client("http://localhost".into());
        // HMAC-SHA256("secret", "pass"), base64
        let mut mac = HmacSha256::new_from_slice(b"secret").unwrap();
        mac.update(b"pass");
        let expected = BASE64.encode(mac.finalize().into_bytes());
        assert_eq!(c.sign("pass").unwrap(), expected);
    }

    #[tokio::test]
    async fn reads_available_balance_for_trade_account() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/accounts")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("currency".into(), "USDT".into()),
                Matcher::UrlEncoded("type".into(), "trade".into()),
            ]))
            .match_header("KC-API-KEY", "key")
            .match_header("KC-API-KEY-VERSION", "2")
            .with_body(
                r#"{"code":"200000","data":[{"id":"1","currency":"USDT","type":"trade","balance":"1000.7","available":"1000.7","holds":"0"}]}"#,
            )
            .create_async()
            .await;

        let balance = client(server.url())
            .get_balance("USDT", AccountType::Trade)
            .await
            .unwrap();

        assert_eq!(balance, dec!(1000.7));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn missing_main_account_reads_as_zero() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/accounts")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("currency".into(), "PEPE".into()),
                Matcher::UrlEncoded("type".into(), "main".into()),
            ]))
            .with_body(r#"{"code":"200000","data":[]}"#)
            .create_async()
            .await;

        let balance = client(server.url())
            .get_balance("PEPE", AccountType::Main)
            .await
            .unwrap();
        assert_eq!(balance, Decimal::ZERO);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn fetches_level1_price() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/market/orderbook/level1")
            .match_query(Matcher::UrlEncoded("symbol".into(), "BTC-USDT".into()))
            .with_body(
                r#"{"code":"200000","data":{"sequence":"1","price":"106.5","size":"1","bestBid":"106.4","bestBidSize":"1","bestAsk":"106.6","bestAskSize":"1","time":1700000000000}}"#,
            )
            .create_async()
            .await;

        let ticker = client(server.url()).get_ticker("BTC-USDT").await.unwrap();
        assert_eq!(ticker.price, dec!(106.5));
        assert_eq!(ticker.timestamp, 1700000000000);
    }

    #[tokio::test]
    async fn rejected_order_is_a_submission_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/v1/orders")
            .match_body(Matcher::PartialJsonString(
                r#"{"side":"buy","type":"market","funds":"500"}"#.into(),
            ))
            .with_body(r#"{"code":"200004","msg":"Balance insufficient!"}"#)
            .create_async()
            .await;

        let err = client(server.url())
            .place_market_buy("oid", "BTC-USDT", dec!(500))
            .await
            .unwrap_err();

        match err {
            BotError::OrderSubmission { symbol, reason } => {
                assert_eq!(symbol, "BTC-USDT");
                assert!(reason.contains("Balance insufficient!"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn accepted_sell_returns_order_id() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/v1/orders")
            .match_body(Matcher::PartialJsonString(
                r#"{"clientOid":"oid-2","side":"sell","size":"3"}"#.into(),
            ))
            .with_body(r#"{"code":"200000","data":{"orderId":"sell-1"}}"#)
            .create_async()
            .await;

        let id = client(server.url())
            .place_market_sell("oid-2", "BTC-USDT", dec!(3))
            .await
            .unwrap();
        assert_eq!(id, "sell-1");
    }

    #[tokio::test]
    async fn bad_passphrase_is_an_authentication_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/sub/user")
            .with_status(401)
            .with_body(r#"{"code":"400004","msg":"Invalid KC-API-PASSPHRASE"}"#)
            .create_async()
            .await;

        let err = client(server.url())
            .validate_credentials()
            .await
            .unwrap_err();
        assert!(matches!(err, BotError::Authentication(_)));
    }

    #[tokio::test]
    async fn server_error_stays_transient() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/orders/abc")
            .with_status(503)
            .with_body("upstream unavailable")
            .create_async()
            .await;

        let err = client(server.url()).get_order("abc").await.unwrap_err();
        assert!(err.is_transient());
    }
}
