// src/core/session.rs
use crate::config::{AppConfig, FillRetryConfig, ReadRetryConfig, TradeConfig};
use crate::connectors::traits::ExchangeClient;
use crate::core::balance::BalanceTracker;
use crate::core::claim::SaleClaim;
use crate::core::executor::OrderExecutor;
use crate::core::poller::MarginPoller;
use crate::error::{BotError, Result, SessionError, SessionStage};
use crate::storage::OrderRecorder;
use crate::types::{BalanceSnapshot, Order, SellTrigger, TradeResult};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// State of one buy-then-sell run. Only `sale_claim` is shared between the
/// poller's timelines; everything else is written by the controller.
#[derive(Debug)]
pub struct TradeSession {
    pub config: TradeConfig,
    pub coin: String,
    pub pair: String,
    pub stage: SessionStage,
    pub buy_order: Option<Order>,
    pub sell_order: Option<Order>,
    pub balance_before: Option<BalanceSnapshot>,
    pub balance_after: Option<BalanceSnapshot>,
    pub sale_claim: SaleClaim,
    pub started_at: DateTime<Utc>,
}

impl TradeSession {
    pub fn new(config: TradeConfig, coin: &str) -> Self {
        let coin = coin.trim().to_uppercase();
        let pair = config.coin_pair(&coin);
        Self {
            config,
            coin,
            pair,
            stage: SessionStage::Authenticate,
            buy_order: None,
            sell_order: None,
            balance_before: None,
            balance_after: None,
            sale_claim: SaleClaim::new(),
            started_at: Utc::now(),
        }
    }

    pub fn quote_currency(&self) -> String {
        self.config.pairing.to_uppercase()
    }
}

#[derive(Debug, Clone)]
pub struct SessionReport {
    pub pair: String,
    pub buy_order: Order,
    pub sell_order: Order,
    pub trigger: SellTrigger,
    pub balance_before: BalanceSnapshot,
    pub balance_after: BalanceSnapshot,
    pub result: TradeResult,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed: Duration,
}

pub struct SessionController {
    client: Arc<dyn ExchangeClient>,
    recorder: Arc<dyn OrderRecorder>,
    bot_label: String,
    fill_retry: FillRetryConfig,
    read_retry: ReadRetryConfig,
    session_timeout: Option<Duration>,
}

impl SessionController {
    pub fn new(
        client: Arc<dyn ExchangeClient>,
        recorder: Arc<dyn OrderRecorder>,
        bot_label: impl Into<String>,
    ) -> Self {
        Self {
            client,
            recorder,
            bot_label: bot_label.into(),
            fill_retry: FillRetryConfig::default(),
            read_retry: ReadRetryConfig::default(),
            session_timeout: None,
        }
    }

    pub fn from_config(
        config: &AppConfig,
        client: Arc<dyn ExchangeClient>,
        recorder: Arc<dyn OrderRecorder>,
    ) -> Self {
        Self::new(client, recorder, config.bot_label.clone())
            .with_fill_retry(config.fill_retry.clone())
            .with_read_retry(config.read_retry.clone())
            .with_session_timeout(config.session_timeout())
    }

    pub fn with_fill_retry(mut self, fill_retry: FillRetryConfig) -> Self {
        self.fill_retry = fill_retry;
        self
    }

    pub fn with_read_retry(mut self, read_retry: ReadRetryConfig) -> Self {
        self.read_retry = read_retry;
        self
    }

    pub fn with_session_timeout(mut self, limit: Option<Duration>) -> Self {
        self.session_timeout = limit;
        self
    }

    /// Runs one full session for `coin` against the quote currency of `config`.
    pub async fn run(
        &self,
        config: TradeConfig,
        coin: &str,
    ) -> std::result::Result<SessionReport, SessionError> {
        let mut session = TradeSession::new(config, coin);
        info!("Starting session on {}", session.pair);

        let outcome = match self.session_timeout {
            Some(limit) => match tokio::time::timeout(limit, self.drive(&mut session)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(BotError::SessionTimeout(limit.as_millis() as u64)),
            },
            None => self.drive(&mut session).await,
        };

        outcome.map_err(|source| {
            let err = SessionError {
                stage: session.stage,
                buy_order: session.buy_order.clone(),
                sell_order: session.sell_order.clone(),
                source,
            };
            error!("{}", err);
            err
        })
    }

    async fn drive(&self, session: &mut TradeSession) -> Result<SessionReport> {
        session.stage = SessionStage::Authenticate;
        self.client.validate_credentials().await?;

        session.stage = SessionStage::Baseline;
        let quote = session.quote_currency();
        let mut tracker = BalanceTracker::new(self.client.clone());
        let read_attempts = self.read_retry.max_attempts;
        let read_spacing = session.config.refresh_interval();
        let snapshot = tracker
            .snapshot_with_retry(&quote, read_attempts, read_spacing)
            .await?;
        let before = tracker.capture_baseline(snapshot).clone();
        session.balance_before = Some(before.clone());
        let funds =
            BalanceTracker::compute_trade_amount(&before, session.config.buy_qty_from_wallet)?;

        session.stage = SessionStage::Buy;
        let executor = OrderExecutor::new(self.client.clone(), self.fill_retry.clone());
        let buy = executor.submit_market_buy(&session.pair, funds).await?;
        session.buy_order = Some(buy.clone());

        session.stage = SessionStage::ResolveBuy;
        let buy = executor.resolve_fill(&buy).await?;
        session.buy_order = Some(buy.clone());

        session.stage = SessionStage::MarginPoll;
        let base = match tracker
            .snapshot_with_retry(&session.coin, read_attempts, read_spacing)
            .await
        {
            Ok(snapshot) => snapshot,
            Err(e) if e.is_transient() => {
                warn!(
                    "{} balance unavailable ({}), using bought size {}",
                    session.coin, e, buy.deal_size
                );
                BalanceSnapshot::new(session.coin.clone(), buy.deal_size)
            }
            Err(e) => return Err(e),
        };
        let sale = {
            let poller = MarginPoller::new(
                self.client.clone(),
                &tracker,
                &executor,
                &session.config,
                self.read_retry.clone(),
            );
            poller.run(session, &buy, &base).await?
        };
        session.sell_order = Some(sale.order.clone());

        session.stage = SessionStage::ResolveSell;
        let sell = executor.resolve_fill(&sale.order).await?;
        session.sell_order = Some(sell.clone());

        // Both orders are filled; record them before anything else can fail.
        self.record(&buy).await;
        self.record(&sell).await;

        session.stage = SessionStage::Settle;
        let after = tracker
            .snapshot_with_retry(&quote, read_attempts, read_spacing)
            .await?;
        session.balance_after = Some(after.clone());
        let result = BalanceTracker::classify_result(&before, &after)?;

        let finished_at = Utc::now();
        let elapsed = (finished_at - session.started_at)
            .to_std()
            .unwrap_or_default();
        info!(
            "{} on {} ({} -> {} {}) in {:.1}s",
            result,
            session.pair,
            before.available,
            after.available,
            quote,
            elapsed.as_secs_f64()
        );

        Ok(SessionReport {
            pair: session.pair.clone(),
            buy_order: buy,
            sell_order: sell,
            trigger: sale.trigger,
            balance_before: before,
            balance_after: after,
            result,
            started_at: session.started_at,
            finished_at,
            elapsed,
        })
    }

    async fn record(&self, order: &Order) {
        let Some(order_id) = order.id.as_deref() else {
            return;
        };
        if let Err(e) = self
            .recorder
            .record_order(&self.bot_label, order, order_id)
            .await
        {
            error!("Failed to record {} order {}: {}", order.side, order_id, e);
        }
    }
}
