use std::sync::Arc;

use anyhow::Context;
use tokio::sync::{broadcast, RwLock};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use api::{AppState, Session};
use common::{BotEvent, Config, ExchangeClient, MarketData, TradingMode};
use engine::{BtcTurkClient, Engine, OrderExecutor};
use ledger::CsvLedger;
use paper::PaperClient;
use strategy::TradingParams;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env()?;
    info!(mode = %cfg.trading_mode, base_url = %cfg.base_url, "TurkBot starting");

    let preset = cfg
        .trading_config_path
        .as_ref()
        .map(TradingParams::load)
        .transpose()
        .context("loading trading preset")?;

    // ── Ledger ────────────────────────────────────────────────────────────────
    let ledger = CsvLedger::new(&cfg.history_path);
    info!(path = %ledger.path().display(), "Trade history ledger ready");

    // ── Exchange client (injected based on TRADING_MODE) ──────────────────────
    let btcturk = Arc::new(BtcTurkClient::new(&cfg.base_url, cfg.credentials.clone())?);
    let market: Arc<dyn MarketData> = btcturk.clone();
    let exchange_client: Arc<dyn ExchangeClient> = match cfg.trading_mode {
        TradingMode::Live => {
            info!("Live trading mode, using BtcTurkClient");
            btcturk
        }
        TradingMode::Paper => {
            info!("Paper trading mode, using PaperClient");
            Arc::new(PaperClient::new())
        }
    };

    // ── Engine ────────────────────────────────────────────────────────────────
    let (event_tx, mut event_rx) = broadcast::channel::<BotEvent>(256);
    let executor = OrderExecutor::new(exchange_client, ledger.clone(), event_tx.clone());
    let (engine, engine_handle) =
        Engine::new(market.clone(), executor, event_tx, cfg.poll_interval);

    // ── Notification log ──────────────────────────────────────────────────────
    tokio::spawn(async move {
        loop {
            match event_rx.recv().await {
                Ok(event) if event.is_error() => warn!("{event}"),
                Ok(event) => info!("{event}"),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(dropped = n, "Notification log lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // ── Operator API ──────────────────────────────────────────────────────────
    let session = match preset {
        Some(params) => {
            info!(pairs = ?params.pairs, "Trading preset loaded; start with POST /api/bot/start");
            Session::from_preset(params)
        }
        None => Session::default(),
    };
    let api_state = AppState {
        engine: engine_handle,
        market,
        ledger,
        trading_mode: cfg.trading_mode,
        dashboard_token: cfg.dashboard_token.clone(),
        session: Arc::new(RwLock::new(session)),
    };

    // ── Spawn all tasks ───────────────────────────────────────────────────────
    let port = cfg.dashboard_port;
    tokio::spawn(engine.run());
    tokio::spawn(async move {
        if let Err(e) = api::serve(api_state, port).await {
            error!(error = %e, "Operator API stopped");
        }
    });

    info!("All subsystems started. Waiting for shutdown signal.");
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting.");
    Ok(())
}
