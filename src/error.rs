// src/error.rs
use crate::types::Order;
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BotError>;

#[derive(Debug, Error)]
pub enum BotError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Exchange or transport failure. Safe to retry for read-only calls.
    #[error("Exchange API error {code}: {message}")]
    Api { code: String, message: String },

    #[error("Order rejected for {symbol}: {reason}")]
    OrderSubmission { symbol: String, reason: String },

    #[error("Fill data for order {order_id} not populated after {attempts} attempts")]
    FillResolutionTimeout { order_id: String, attempts: u32 },

    #[error("Division by zero while computing {0}")]
    DivisionByZero(&'static str),

    #[error("Invalid trade size {amount} for {currency}")]
    InvalidTradeSize { currency: String, amount: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("No sell was submitted: {0}")]
    NoSale(String),

    #[error("Session did not finish within {0} ms")]
    SessionTimeout(u64),
}

impl BotError {
    pub fn api(code: impl Into<String>, message: impl Into<String>) -> Self {
        BotError::Api {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Transient errors are the ones a read-only poll may retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, BotError::Api { .. })
    }
}

impl From<reqwest::Error> for BotError {
    fn from(e: reqwest::Error) -> Self {
        let code = e
            .status()
            .map(|s| s.as_u16().to_string())
            .unwrap_or_else(|| "transport".to_string());
        BotError::api(code, e.to_string())
    }
}

impl From<config::ConfigError> for BotError {
    fn from(e: config::ConfigError) -> Self {
        BotError::Config(e.to_string())
    }
}

/// The other timeline already holds the sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimConflict;

impl fmt::Display for ClaimConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sale already claimed by another timeline")
    }
}

impl std::error::Error for ClaimConflict {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStage {
    Authenticate,
    Baseline,
    Buy,
    ResolveBuy,
    MarginPoll,
    ResolveSell,
    Settle,
}

impl fmt::Display for SessionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionStage::Authenticate => "authentication",
            SessionStage::Baseline => "baseline snapshot",
            SessionStage::Buy => "buy submission",
            SessionStage::ResolveBuy => "buy fill resolution",
            SessionStage::MarginPoll => "margin polling",
            SessionStage::ResolveSell => "sell fill resolution",
            SessionStage::Settle => "settlement",
        };
        f.write_str(s)
    }
}

/// A failed run, with whatever order state was known at the time so the
/// operator can reconcile by hand.
#[derive(Debug, Error)]
#[error("session failed during {stage}: {source}{}", describe_orders(.buy_order, .sell_order))]
pub struct SessionError {
    pub stage: SessionStage,
    pub buy_order: Option<Order>,
    pub sell_order: Option<Order>,
    #[source]
    pub source: BotError,
}

fn describe_orders(buy: &Option<Order>, sell: &Option<Order>) -> String {
    let mut out = String::new();
    if let Some(o) = buy {
        out.push_str(&format!(" [buy {}]", o.summary()));
    }
    if let Some(o) = sell {
        out.push_str(&format!(" [sell {}]", o.summary()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_api_errors_are_transient() {
        assert!(BotError::api("500", "boom").is_transient());
        assert!(!BotError::Authentication("bad key".into()).is_transient());
        assert!(!BotError::OrderSubmission {
            symbol: "BTC-USDT".into(),
            reason: "no funds".into()
        }
        .is_transient());
    }

    #[test]
    fn session_error_without_orders_names_the_stage() {
        let err = SessionError {
            stage: SessionStage::Buy,
            buy_order: None,
            sell_order: None,
            source: BotError::api("400100", "bad params"),
        };
        assert_eq!(
            err.to_string(),
            "session failed during buy submission: Exchange API error 400100: bad params"
        );
    }
}
