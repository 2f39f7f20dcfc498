// src/core/poller.rs
use crate::config::{ReadRetryConfig, TradeConfig};
use crate::connectors::traits::ExchangeClient;
use crate::core::balance::BalanceTracker;
use crate::core::executor::OrderExecutor;
use crate::core::session::TradeSession;
use crate::error::{BotError, ClaimConflict, Result};
use crate::types::{BalanceSnapshot, Order, SellTrigger};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    AwaitingTrigger,
    Sold,
    Aborted,
}

#[derive(Debug, Clone)]
pub struct SaleOutcome {
    pub order: Order,
    pub trigger: SellTrigger,
}

/// How a single timeline finished.
enum TimelineExit {
    Sold(SaleOutcome),
    Conflict(ClaimConflict),
    /// Target polling gave up without claiming; the fallback still runs.
    Withdrawn(BotError),
    /// The claim holder could not complete the sale.
    Failed(BotError),
}

/// Races the profit target against the fallback timer and sells exactly once.
pub struct MarginPoller<'a> {
    client: Arc<dyn ExchangeClient>,
    tracker: &'a BalanceTracker,
    executor: &'a OrderExecutor,
    config: &'a TradeConfig,
    read_retry: ReadRetryConfig,
    state: watch::Sender<PollerState>,
}

impl<'a> MarginPoller<'a> {
    pub fn new(
        client: Arc<dyn ExchangeClient>,
        tracker: &'a BalanceTracker,
        executor: &'a OrderExecutor,
        config: &'a TradeConfig,
        read_retry: ReadRetryConfig,
    ) -> Self {
        let (state, _) = watch::channel(PollerState::AwaitingTrigger);
        Self {
            client,
            tracker,
            executor,
            config,
            read_retry,
            state,
        }
    }

    pub fn state(&self) -> PollerState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<PollerState> {
        self.state.subscribe()
    }

    pub fn target_price(&self, buy_order: &Order) -> Result<Decimal> {
        let breakeven = OrderExecutor::breakeven_price(buy_order)?;
        Ok(breakeven * (Decimal::ONE + self.config.profit_margin))
    }

    /// Runs both timelines until one of them claims the sale and submits it.
    ///
    /// `base_snapshot` is the base-coin balance read after the buy; it sizes the
    /// sell if a fresh read keeps failing.
    pub async fn run(
        &self,
        session: &TradeSession,
        buy_order: &Order,
        base_snapshot: &BalanceSnapshot,
    ) -> Result<SaleOutcome> {
        let breakeven = OrderExecutor::breakeven_price(buy_order)?;
        let target = self.target_price(buy_order)?;
        self.state.send_replace(PollerState::AwaitingTrigger);

        info!(
            "Watching {}: breakeven {} target {} (margin {}), fallback in {} ms",
            session.pair,
            breakeven,
            target,
            self.config.profit_margin,
            self.config.sell_fallback_timeout_ms
        );

        let fallback = self.fallback_timeline(session, base_snapshot);
        let polling = self.target_timeline(session, base_snapshot, target);
        tokio::pin!(fallback);
        tokio::pin!(polling);
        let mut fallback_open = true;
        let mut polling_open = true;

        // Dropping the losing future is what cancels it.
        let result = loop {
            let exit = tokio::select! {
                exit = &mut fallback, if fallback_open => {
                    fallback_open = false;
                    exit
                }
                exit = &mut polling, if polling_open => {
                    polling_open = false;
                    exit
                }
                else => break Err(BotError::NoSale("both timelines ended without claiming".into())),
            };

            match exit {
                TimelineExit::Sold(outcome) => break Ok(outcome),
                TimelineExit::Failed(e) => break Err(e),
                TimelineExit::Conflict(conflict) => debug!("Timeline stopped: {}", conflict),
                TimelineExit::Withdrawn(e) => {
                    error!("Target polling stopped, waiting for fallback: {}", e)
                }
            }
        };

        match &result {
            Ok(outcome) => {
                self.state.send_replace(PollerState::Sold);
                info!(
                    "Sell {} submitted via {:?}",
                    outcome.order.id.as_deref().unwrap_or_default(),
                    outcome.trigger
                );
            }
            Err(e) => {
                self.state.send_replace(PollerState::Aborted);
                error!("Margin polling aborted: {}", e);
            }
        }
        result
    }

    async fn fallback_timeline(
        &self,
        session: &TradeSession,
        base_snapshot: &BalanceSnapshot,
    ) -> TimelineExit {
        tokio::time::sleep(self.config.sell_fallback_timeout()).await;

        if let Err(conflict) = session.sale_claim.try_claim() {
            return TimelineExit::Conflict(conflict);
        }
        warn!(
            "Profit margin not reached after {} ms, selling at market",
            self.config.sell_fallback_timeout_ms
        );
        self.sell(session, base_snapshot, SellTrigger::Fallback).await
    }

    async fn target_timeline(
        &self,
        session: &TradeSession,
        base_snapshot: &BalanceSnapshot,
        target: Decimal,
    ) -> TimelineExit {
        let mut ticker = tokio::time::interval(self.config.refresh_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if session.sale_claim.is_claimed() {
                return TimelineExit::Conflict(ClaimConflict);
            }

            let price = match self.client.get_ticker(&session.pair).await {
                Ok(t) => t.price,
                Err(e) if e.is_transient() => {
                    warn!("Ticker for {} unavailable: {}", session.pair, e);
                    continue;
                }
                Err(e) => return TimelineExit::Withdrawn(e),
            };
            debug!("{} price {} / target {}", session.pair, price, target);

            if price < target {
                continue;
            }
            if let Err(conflict) = session.sale_claim.try_claim() {
                return TimelineExit::Conflict(conflict);
            }
            info!("Target {} reached at {}", target, price);
            return self
                .sell(session, base_snapshot, SellTrigger::Target { price, target })
                .await;
        }
    }

    /// Only ever called by the timeline holding the claim.
    async fn sell(
        &self,
        session: &TradeSession,
        base_snapshot: &BalanceSnapshot,
        trigger: SellTrigger,
    ) -> TimelineExit {
        let size = match self.sell_size(base_snapshot).await {
            Ok(size) => size,
            Err(e) => return TimelineExit::Failed(e),
        };
        match self.executor.submit_market_sell(&session.pair, size).await {
            Ok(order) => TimelineExit::Sold(SaleOutcome { order, trigger }),
            Err(e) => TimelineExit::Failed(e),
        }
    }

    async fn sell_size(&self, base_snapshot: &BalanceSnapshot) -> Result<Decimal> {
        let coin = &base_snapshot.currency;
        let snapshot = match self
            .tracker
            .snapshot_with_retry(
                coin,
                self.read_retry.max_attempts,
                self.config.refresh_interval(),
            )
            .await
        {
            Ok(snapshot) => snapshot,
            Err(e) if e.is_transient() => {
                warn!(
                    "Sizing sell from post-buy {} balance {} ({})",
                    coin, base_snapshot.available, e
                );
                base_snapshot.clone()
            }
            Err(e) => return Err(e),
        };
        BalanceTracker::compute_trade_amount(&snapshot, self.config.sell_qty_from_wallet)
    }
}
