// src/core/balance.rs
use crate::connectors::traits::ExchangeClient;
use crate::error::{BotError, Result};
use crate::types::{AccountType, BalanceSnapshot, ResultKind, TradeResult};
use crate::utils::precision::whole_units_of;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Balance reads, trade sizing and the final gain/loss verdict.
pub struct BalanceTracker {
    client: Arc<dyn ExchangeClient>,
    baseline: Option<BalanceSnapshot>,
}

impl BalanceTracker {
    pub fn new(client: Arc<dyn ExchangeClient>) -> Self {
        Self {
            client,
            baseline: None,
        }
    }

    pub async fn snapshot_balance(&self, currency: &str) -> Result<BalanceSnapshot> {
        let available = self.client.get_balance(currency, AccountType::Trade).await?;
        info!("Your {} balance is {}", currency, available);
        Ok(BalanceSnapshot::new(currency, available))
    }

    /// Retries transient read failures up to `max_attempts` reads, `spacing` apart.
    /// The last error is returned once the attempts run out.
    pub async fn snapshot_with_retry(
        &self,
        currency: &str,
        max_attempts: u32,
        spacing: Duration,
    ) -> Result<BalanceSnapshot> {
        let max_attempts = max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.snapshot_balance(currency).await {
                Ok(snapshot) => return Ok(snapshot),
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    warn!(
                        "{} balance read failed (attempt {}/{}): {}",
                        currency, attempt, max_attempts, e
                    );
                    tokio::time::sleep(spacing).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// First write wins; later calls leave the baseline untouched.
    pub fn capture_baseline(&mut self, snapshot: BalanceSnapshot) -> &BalanceSnapshot {
        self.baseline.get_or_insert(snapshot)
    }

    pub fn baseline(&self) -> Option<&BalanceSnapshot> {
        self.baseline.as_ref()
    }

    /// `floor(available * fraction)`. Non-positive results are rejected so that
    /// an empty wallet never turns into a zero-sized order.
    pub fn compute_trade_amount(snapshot: &BalanceSnapshot, fraction: Decimal) -> Result<Decimal> {
        let amount = whole_units_of(snapshot.available, fraction);
        if amount <= Decimal::ZERO {
            return Err(BotError::InvalidTradeSize {
                currency: snapshot.currency.clone(),
                amount: amount.to_string(),
            });
        }
        Ok(amount)
    }

    pub fn classify_result(before: &BalanceSnapshot, after: &BalanceSnapshot) -> Result<TradeResult> {
        if before.available.is_zero() {
            return Err(BotError::DivisionByZero("result percentage"));
        }
        let difference = after.available - before.available;
        let percentage = difference / before.available * Decimal::ONE_HUNDRED;
        let kind = if difference > Decimal::ZERO {
            ResultKind::Gain
        } else if difference < Decimal::ZERO {
            ResultKind::Loss
        } else {
            ResultKind::Flat
        };
        Ok(TradeResult { kind, percentage })
    }
}
