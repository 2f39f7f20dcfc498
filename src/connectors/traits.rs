use crate::error::Result;
use crate::types::{AccountType, OrderDetails, Ticker};
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Stateless facade over the exchange endpoints one session needs.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Fails with `BotError::Authentication` if the keys are rejected.
    async fn validate_credentials(&self) -> Result<()>;

    async fn get_ticker(&self, pair: &str) -> Result<Ticker>;

    /// Available (not on hold) amount of `currency`.
    async fn get_balance(&self, currency: &str, account_type: AccountType) -> Result<Decimal>;

    /// Returns the exchange order id.
    async fn place_market_buy(&self, client_oid: &str, pair: &str, funds: Decimal)
        -> Result<String>;

    /// Returns the exchange order id.
    async fn place_market_sell(&self, client_oid: &str, pair: &str, size: Decimal)
        -> Result<String>;

    async fn get_order(&self, order_id: &str) -> Result<OrderDetails>;
}
