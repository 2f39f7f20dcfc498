// src/connectors/messages.rs
use crate::types::OrderDetails;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const SUCCESS_CODE: &str = "200000";

/// Envelope wrapping every KuCoin REST response: `{ "code": "200000", "data": ... }`.
/// On failure `msg` carries the provider message and `data` is absent.
#[derive(Debug, Deserialize)]
pub struct KucoinResponse<T> {
    pub code: String,
    pub msg: Option<String>,
    pub data: Option<T>,
}

impl<T> KucoinResponse<T> {
    pub fn is_success(&self) -> bool {
        self.code == SUCCESS_CODE
    }
}

/// `GET /api/v1/market/orderbook/level1`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Level1Ticker {
    pub price: Option<Decimal>,
    pub best_bid: Option<Decimal>,
    pub best_ask: Option<Decimal>,
    pub time: Option<u64>,
}

/// Entry of `GET /api/v1/accounts`.
#[derive(Debug, Deserialize)]
pub struct AccountEntry {
    pub currency: String,
    #[serde(rename = "type")]
    pub account_type: String,
    pub balance: Decimal,
    pub available: Decimal,
    pub holds: Decimal,
}

/// Body of `POST /api/v1/orders` for market orders. Buys carry `funds`, sells `size`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketOrderRequest<'a> {
    pub client_oid: &'a str,
    pub side: &'a str,
    pub symbol: &'a str,
    #[serde(rename = "type")]
    pub order_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub funds: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedOrder {
    pub order_id: String,
}

/// `GET /api/v1/orders/{orderId}`; only the fields the bot uses.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KucoinOrder {
    pub id: String,
    pub symbol: String,
    pub side: String,
    #[serde(default)]
    pub size: Option<Decimal>,
    #[serde(default)]
    pub funds: Option<Decimal>,
    #[serde(default)]
    pub deal_funds: Option<Decimal>,
    #[serde(default)]
    pub deal_size: Option<Decimal>,
    #[serde(default)]
    pub fee: Option<Decimal>,
    #[serde(default)]
    pub fee_currency: Option<String>,
    #[serde(default)]
    pub created_at: Option<i64>,
}

impl From<KucoinOrder> for OrderDetails {
    fn from(o: KucoinOrder) -> Self {
        OrderDetails {
            id: o.id,
            symbol: o.symbol,
            side: o.side,
            size: o.size,
            funds: o.funds,
            deal_funds: o.deal_funds.unwrap_or_default(),
            deal_size: o.deal_size.unwrap_or_default(),
            fee: o.fee.unwrap_or_default(),
            fee_currency: o.fee_currency,
            created_at: o.created_at,
        }
    }
}
