// src/core/executor.rs
use crate::config::FillRetryConfig;
use crate::connectors::traits::ExchangeClient;
use crate::error::{BotError, Result};
use crate::types::{Order, Side};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Submits market orders and waits for their fill aggregates.
pub struct OrderExecutor {
    client: Arc<dyn ExchangeClient>,
    fill_retry: FillRetryConfig,
}

impl OrderExecutor {
    pub fn new(client: Arc<dyn ExchangeClient>, fill_retry: FillRetryConfig) -> Self {
        Self { client, fill_retry }
    }

    /// Spends `funds` of the quote currency. Not retried.
    pub async fn submit_market_buy(&self, pair: &str, funds: Decimal) -> Result<Order> {
        let client_oid = Uuid::new_v4().to_string();
        let id = self
            .client
            .place_market_buy(&client_oid, pair, funds)
            .await
            .map_err(|e| into_submission_error(pair, e))?;

        info!("Buy order {} accepted for {} {}", id, funds, pair);
        let mut order = Order::submitted(Side::Buy, pair, client_oid, id);
        order.funds = Some(funds);
        Ok(order)
    }

    /// Sells `size` of the base coin. Not retried.
    pub async fn submit_market_sell(&self, pair: &str, size: Decimal) -> Result<Order> {
        let client_oid = Uuid::new_v4().to_string();
        let id = self
            .client
            .place_market_sell(&client_oid, pair, size)
            .await
            .map_err(|e| into_submission_error(pair, e))?;

        info!("Sell order {} accepted for {} {}", id, size, pair);
        let mut order = Order::submitted(Side::Sell, pair, client_oid, id);
        order.size = Some(size);
        Ok(order)
    }

    /// Re-fetches the order until both `deal_funds` and `deal_size` are nonzero.
    ///
    /// The exchange acknowledges market orders before their aggregates are
    /// computed, so the first reads usually come back empty. Each fetch counts
    /// as one attempt, including fetches that fail with a transient error.
    pub async fn resolve_fill(&self, order: &Order) -> Result<Order> {
        let order_id = order
            .id
            .clone()
            .ok_or_else(|| BotError::api("no-id", "order was never acknowledged"))?;
        let max_attempts = self.fill_retry.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            match self.client.get_order(&order_id).await {
                Ok(details) => {
                    let mut resolved = order.clone();
                    resolved.apply_details(&details);
                    if resolved.is_filled() {
                        info!(
                            "Order {} filled: dealFunds={} dealSize={} fee={}",
                            order_id, resolved.deal_funds, resolved.deal_size, resolved.fee
                        );
                        return Ok(resolved);
                    }
                    debug!(
                        "Order {} fill data not ready yet (attempt {}/{})",
                        order_id, attempt, max_attempts
                    );
                }
                Err(e) if e.is_transient() => {
                    warn!(
                        "Fetching order {} failed (attempt {}/{}): {}",
                        order_id, attempt, max_attempts, e
                    );
                }
                Err(e) => return Err(e),
            }

            if attempt < max_attempts {
                tokio::time::sleep(self.fill_retry.delay_after(attempt)).await;
            }
        }

        Err(BotError::FillResolutionTimeout {
            order_id,
            attempts: max_attempts,
        })
    }

    /// Effective purchase price: `deal_funds / deal_size`.
    pub fn breakeven_price(order: &Order) -> Result<Decimal> {
        if order.deal_size.is_zero() {
            return Err(BotError::DivisionByZero("breakeven price"));
        }
        Ok(order.deal_funds / order.deal_size)
    }
}

fn into_submission_error(pair: &str, e: BotError) -> BotError {
    match e {
        BotError::Api { code, message } => BotError::OrderSubmission {
            symbol: pair.to_string(),
            reason: format!("{} ({})", message, code),
        },
        other => other,
    }
}
