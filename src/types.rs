// src/types.rs
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountType {
    Main,
    Trade,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Main => "main",
            AccountType::Trade => "trade",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticker {
    pub symbol: String,
    pub price: Decimal,
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceSnapshot {
    pub currency: String,
    pub available: Decimal,
    pub captured_at: DateTime<Utc>,
}

impl BalanceSnapshot {
    pub fn new(currency: impl Into<String>, available: Decimal) -> Self {
        Self {
            currency: currency.into(),
            available,
            captured_at: Utc::now(),
        }
    }
}

/// Order as reported by `GET /orders/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderDetails {
    pub id: String,
    pub symbol: String,
    pub side: String,
    pub size: Option<Decimal>,
    pub funds: Option<Decimal>,
    pub deal_funds: Decimal,
    pub deal_size: Decimal,
    pub fee: Decimal,
    pub fee_currency: Option<String>,
    pub created_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Order {
    pub side: Side,
    pub symbol: String,
    pub client_oid: String,
    /// Set once the exchange acknowledges the order.
    pub id: Option<String>,
    /// Base size for sells, quote funds for buys.
    pub size: Option<Decimal>,
    pub funds: Option<Decimal>,
    pub deal_funds: Decimal,
    pub deal_size: Decimal,
    pub fee: Decimal,
    pub fee_currency: Option<String>,
    pub created_at: Option<i64>,
}

impl Order {
    pub fn submitted(side: Side, symbol: &str, client_oid: String, id: String) -> Self {
        Self {
            side,
            symbol: symbol.to_string(),
            client_oid,
            id: Some(id),
            size: None,
            funds: None,
            deal_funds: Decimal::ZERO,
            deal_size: Decimal::ZERO,
            fee: Decimal::ZERO,
            fee_currency: None,
            created_at: None,
        }
    }

    pub fn is_filled(&self) -> bool {
        !self.deal_funds.is_zero() && !self.deal_size.is_zero()
    }

    pub fn apply_details(&mut self, details: &OrderDetails) {
        self.deal_funds = details.deal_funds;
        self.deal_size = details.deal_size;
        self.fee = details.fee;
        self.fee_currency = details.fee_currency.clone();
        self.created_at = details.created_at;
        if details.size.is_some() {
            self.size = details.size;
        }
        if details.funds.is_some() {
            self.funds = details.funds;
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "{} {} id={} dealFunds={} dealSize={}",
            self.side,
            self.symbol,
            self.id.as_deref().unwrap_or("<none>"),
            self.deal_funds,
            self.deal_size
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResultKind {
    Gain,
    Loss,
    Flat,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeResult {
    pub kind: ResultKind,
    /// (after - before) / before * 100
    pub percentage: Decimal,
}

impl fmt::Display for TradeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ResultKind::Gain => write!(f, "A {:.2}% gain", self.percentage),
            ResultKind::Loss => write!(f, "A {:.2}% loss", self.percentage),
            ResultKind::Flat => write!(f, "No change ({:.2}%)", self.percentage),
        }
    }
}

/// Which timeline won the sale.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SellTrigger {
    Target { price: Decimal, target: Decimal },
    Fallback,
}
