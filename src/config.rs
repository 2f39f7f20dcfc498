// src/config.rs

use crate::error::{BotError, Result};
use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct TradeConfig {
    /// Quote currency, e.g. "USDT".
    pub pairing: String,
    pub profit_margin: Decimal,
    #[serde(alias = "refresh_interval")]
    pub refresh_interval_ms: u64,
    #[serde(alias = "sell_fallback_timeout")]
    pub sell_fallback_timeout_ms: u64,
    pub buy_qty_from_wallet: Decimal,
    pub sell_qty_from_wallet: Decimal,
}

impl TradeConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn sell_fallback_timeout(&self) -> Duration {
        Duration::from_millis(self.sell_fallback_timeout_ms)
    }

    pub fn coin_pair(&self, coin: &str) -> String {
        format!("{}-{}", coin.trim().to_uppercase(), self.pairing.to_uppercase())
    }

    pub fn validate(&self) -> Result<()> {
        if self.pairing.trim().is_empty() {
            return Err(BotError::Config("pairing must not be empty".into()));
        }
        if self.profit_margin.is_sign_negative() {
            return Err(BotError::Config(format!(
                "profit_margin must be >= 0, got {}",
                self.profit_margin
            )));
        }
        if self.refresh_interval_ms == 0 {
            return Err(BotError::Config("refresh_interval must be > 0".into()));
        }
        if self.sell_fallback_timeout_ms == 0 {
            return Err(BotError::Config("sell_fallback_timeout must be > 0".into()));
        }
        for (name, fraction) in [
            ("buy_qty_from_wallet", self.buy_qty_from_wallet),
            ("sell_qty_from_wallet", self.sell_qty_from_wallet),
        ] {
            if fraction <= Decimal::ZERO || fraction > Decimal::ONE {
                return Err(BotError::Config(format!(
                    "{} must be in (0, 1], got {}",
                    name, fraction
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Credentials {
    pub api_key: String,
    pub secret_key: String,
    pub passphrase: String,
}

/// Bounded exponential backoff used while waiting for fill data.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct FillRetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for FillRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            initial_delay_ms: 200,
            max_delay_ms: 3000,
        }
    }
}

impl FillRetryConfig {
    /// Delay before the attempt following `attempt` (1-based), doubling up to the cap.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        let ms = self.initial_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Duration::from_millis(ms)
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ReadRetryConfig {
    pub max_attempts: u32,
}

impl Default for ReadRetryConfig {
    fn default() -> Self {
        Self { max_attempts: 5 }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_bot_label")]
    pub bot_label: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    pub coin: String,
    pub active_config: String,
    pub trade_configs: HashMap<String, TradeConfig>,
    pub credentials: Credentials,
    #[serde(default)]
    pub fill_retry: FillRetryConfig,
    #[serde(default)]
    pub read_retry: ReadRetryConfig,
    #[serde(default = "default_order_log_path")]
    pub order_log_path: String,
    #[serde(default)]
    pub session_timeout_ms: Option<u64>,
}

/// `APP_COIN`, `APP_CREDENTIALS__API_KEY`, ...
fn environment() -> Environment {
    Environment::with_prefix("APP")
        .prefix_separator("_")
        .separator("__")
}

fn default_bot_label() -> String {
    "kucoin".to_string()
}

fn default_base_url() -> String {
    "https://api.kucoin.com".to_string()
}

fn default_order_log_path() -> String {
    "orders/kucoin.jsonl".to_string()
}

impl AppConfig {
    pub fn new() -> std::result::Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name("Settings").required(false))
            .add_source(environment());

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Returns the trade config named by `active_config`, validated.
    pub fn selected_trade_config(&self) -> Result<TradeConfig> {
        let selected = self.trade_configs.get(&self.active_config).ok_or_else(|| {
            let mut known: Vec<&str> = self.trade_configs.keys().map(String::as_str).collect();
            known.sort_unstable();
            BotError::Config(format!(
                "trade config '{}' not found (available: {})",
                self.active_config,
                known.join(", ")
            ))
        })?;
        selected.validate()?;
        Ok(selected.clone())
    }

    pub fn session_timeout(&self) -> Option<Duration> {
        self.session_timeout_ms.map(Duration::from_millis)
    }
}
