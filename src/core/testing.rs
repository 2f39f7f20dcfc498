// src/core/testing.rs
//! Scripted in-memory exchange for unit tests.
use crate::connectors::traits::ExchangeClient;
use crate::error::{BotError, Result};
use crate::types::{AccountType, OrderDetails, Ticker};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum TickerStep {
    Price(Decimal),
    Fail,
}

#[derive(Default)]
pub struct FakeExchange {
    tickers: Mutex<VecDeque<TickerStep>>,
    last_price: Mutex<Option<Decimal>>,
    balances: Mutex<HashMap<String, Decimal>>,
    balance_failures: AtomicU32,
    failures_after_sell: AtomicU32,
    fills: Mutex<HashMap<String, VecDeque<(Decimal, Decimal)>>>,
    settle_on_sell: Mutex<Option<(String, Decimal)>>,
    reject_buy: AtomicBool,
    reject_sell: AtomicBool,
    auth_fails: AtomicBool,
    sell_latency: Mutex<Option<Duration>>,
    /// Submission attempts, rejected ones included.
    pub buy_submissions: AtomicUsize,
    pub sell_submissions: AtomicUsize,
    pub ticker_calls: AtomicUsize,
    pub order_fetches: AtomicUsize,
    pub sold_sizes: Mutex<Vec<Decimal>>,
}

impl FakeExchange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_prices(&self, prices: &[Decimal]) {
        let mut q = self.tickers.lock().unwrap();
        q.extend(prices.iter().copied().map(TickerStep::Price));
    }

    pub fn script_tickers(&self, steps: Vec<TickerStep>) {
        self.tickers.lock().unwrap().extend(steps);
    }

    pub fn set_balance(&self, currency: &str, amount: Decimal) {
        self.balances
            .lock()
            .unwrap()
            .insert(currency.to_string(), amount);
    }

    pub fn fail_balance_reads(&self, count: u32) {
        self.balance_failures.store(count, Ordering::SeqCst);
    }

    /// Balance reads that fail once a sell has been placed.
    pub fn fail_balance_reads_after_sell(&self, count: u32) {
        self.failures_after_sell.store(count, Ordering::SeqCst);
    }

    /// Successive `(deal_funds, deal_size)` returned for `order_id`; the last one repeats.
    pub fn script_fill(&self, order_id: &str, steps: &[(Decimal, Decimal)]) {
        self.fills
            .lock()
            .unwrap()
            .insert(order_id.to_string(), steps.iter().copied().collect());
    }

    /// Quote balance to report once a sell lands.
    pub fn settle_on_sell(&self, currency: &str, amount: Decimal) {
        *self.settle_on_sell.lock().unwrap() = Some((currency.to_string(), amount));
    }

    pub fn reject_buys(&self) {
        self.reject_buy.store(true, Ordering::SeqCst);
    }

    pub fn reject_sells(&self) {
        self.reject_sell.store(true, Ordering::SeqCst);
    }

    pub fn reject_credentials(&self) {
        self.auth_fails.store(true, Ordering::SeqCst);
    }

    pub fn set_sell_latency(&self, latency: Duration) {
        *self.sell_latency.lock().unwrap() = Some(latency);
    }

    pub fn sells(&self) -> usize {
        self.sell_submissions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExchangeClient for FakeExchange {
    async fn validate_credentials(&self) -> Result<()> {
        if self.auth_fails.load(Ordering::SeqCst) {
            return Err(BotError::Authentication("Invalid KC-API-KEY (400003)".into()));
        }
        Ok(())
    }

    async fn get_ticker(&self, pair: &str) -> Result<Ticker> {
        self.ticker_calls.fetch_add(1, Ordering::SeqCst);
        let step = self.tickers.lock().unwrap().pop_front();
        let price = match step {
            Some(TickerStep::Price(p)) => {
                *self.last_price.lock().unwrap() = Some(p);
                p
            }
            Some(TickerStep::Fail) => return Err(BotError::api("503", "ticker unavailable")),
            None => self
                .last_price
                .lock()
                .unwrap()
                .ok_or_else(|| BotError::api("no-price", "no ticker scripted"))?,
        };
        Ok(Ticker {
            symbol: pair.to_string(),
            price,
            timestamp: 0,
        })
    }

    async fn get_balance(&self, currency: &str, _account_type: AccountType) -> Result<Decimal> {
        let remaining = self.balance_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.balance_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(BotError::api("500", "balance unavailable"));
        }
        Ok(self
            .balances
            .lock()
            .unwrap()
            .get(currency)
            .copied()
            .unwrap_or_default())
    }

    async fn place_market_buy(&self, _oid: &str, pair: &str, _funds: Decimal) -> Result<String> {
        let n = self.buy_submissions.fetch_add(1, Ordering::SeqCst) + 1;
        if self.reject_buy.load(Ordering::SeqCst) {
            return Err(BotError::OrderSubmission {
                symbol: pair.to_string(),
                reason: "Balance insufficient!".into(),
            });
        }
        Ok(format!("buy-{}", n))
    }

    async fn place_market_sell(&self, _oid: &str, pair: &str, size: Decimal) -> Result<String> {
        let latency = *self.sell_latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        let n = self.sell_submissions.fetch_add(1, Ordering::SeqCst) + 1;
        if self.reject_sell.load(Ordering::SeqCst) {
            return Err(BotError::OrderSubmission {
                symbol: pair.to_string(),
                reason: "market closed".into(),
            });
        }
        self.sold_sizes.lock().unwrap().push(size);
        let settle = self.settle_on_sell.lock().unwrap().clone();
        if let Some((currency, amount)) = settle {
            self.set_balance(&currency, amount);
        }
        let failures = self.failures_after_sell.swap(0, Ordering::SeqCst);
        if failures > 0 {
            self.balance_failures.store(failures, Ordering::SeqCst);
        }
        Ok(format!("sell-{}", n))
    }

    async fn get_order(&self, order_id: &str) -> Result<OrderDetails> {
        self.order_fetches.fetch_add(1, Ordering::SeqCst);
        let mut fills = self.fills.lock().unwrap();
        let (deal_funds, deal_size) = match fills.get_mut(order_id) {
            Some(steps) if steps.len() > 1 => steps.pop_front().unwrap_or_default(),
            Some(steps) => steps.front().copied().unwrap_or_default(),
            None => (Decimal::ZERO, Decimal::ZERO),
        };
        Ok(OrderDetails {
            id: order_id.to_string(),
            deal_funds,
            deal_size,
            ..Default::default()
        })
    }
}
