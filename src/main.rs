// src/main.rs
use anyhow::{anyhow, Context};
use clap::Parser;
use dotenvy::dotenv;
use kucoin_pump::config::AppConfig;
use kucoin_pump::connectors::{ExchangeClient, KucoinClient};
use kucoin_pump::core::{SessionController, SessionReport};
use kucoin_pump::SessionError;
use kucoin_pump::storage::{JsonlOrderRecorder, OrderRecorder};
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Buys a coin on KuCoin and sells it at a profit margin or after a timeout.
#[derive(Parser)]
#[command(name = "kucoin-pump", version)]
struct Cli {
    /// Coin to buy; overrides `coin` from Settings / APP_COIN
    coin: Option<String>,

    /// Trade config to use; overrides `active_config`
    #[arg(short, long)]
    trade_config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    dotenv().ok();

    let file_appender = tracing_appender::rolling::daily("logs", "kucoin-pump.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("kucoin_pump=info")))
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .init();

    // 1. Load Configuration
    let mut config = AppConfig::new().context("failed to load Settings / APP_* configuration")?;
    if let Some(coin) = cli.coin {
        config.coin = coin;
    }
    if let Some(name) = cli.trade_config {
        config.active_config = name;
    }
    let trade_config = config.selected_trade_config()?;
    let pair = trade_config.coin_pair(&config.coin);

    println!("========================================");
    println!("       KUCOIN PUMP BOT - v0.1.0");
    println!("========================================");
    println!("Pair:     {}", pair);
    println!("Config:   {}", config.active_config);
    println!("Margin:   {}", trade_config.profit_margin);
    println!("Fallback: {} ms", trade_config.sell_fallback_timeout_ms);
    println!("========================================");

    // 2. Initialize Components
    let client: Arc<dyn ExchangeClient> = Arc::new(KucoinClient::new(
        config.credentials.clone(),
        config.base_url.clone(),
    ));
    let recorder: Arc<dyn OrderRecorder> =
        Arc::new(JsonlOrderRecorder::new(&config.order_log_path));
    let controller = SessionController::from_config(&config, client, recorder);

    // 3. Run one session
    let report = run_or_interrupt(
        controller.run(trade_config, &config.coin),
        tokio::signal::ctrl_c(),
        &pair,
    )
    .await?;
    info!(
        "Session finished: {} ({:?}), orders logged to {}",
        report.result, report.trigger, config.order_log_path
    );
    Ok(())
}

/// Runs the session unless `interrupt` resolves first. Either way a failure
/// comes back as an error so the process exits non-zero.
async fn run_or_interrupt<S, I>(session: S, interrupt: I, pair: &str) -> anyhow::Result<SessionReport>
where
    S: Future<Output = Result<SessionReport, SessionError>>,
    I: Future,
{
    tokio::select! {
        outcome = session => outcome.map_err(|e| {
            error!("Fatal session error: {}", e);
            anyhow::Error::from(e)
        }),
        _ = interrupt => {
            warn!("Interrupted; check open orders and balances on {} by hand", pair);
            Err(anyhow!("session on {} interrupted", pair))
        }
    }
}
