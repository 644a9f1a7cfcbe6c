use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use common::Config;
use engine::{Engine, EngineSettings, ExchangeRegistry, MockFeed, Session};
use paper::{LedgerConfig, PaperLedger, RandomPnl};
use strategy::{DashboardFileConfig, PairAnalyzer};

#[tokio::main]
async fn main() {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env();
    let file = DashboardFileConfig::load_or_default(&cfg.dashboard_config_path)
        .unwrap_or_else(|e| panic!("Invalid dashboard config: {e}"));
    info!(
        port = cfg.dashboard_port,
        refresh_secs = cfg.refresh_interval.as_secs(),
        auto_trade_secs = cfg.auto_trade_interval.as_secs(),
        "Volume dashboard starting"
    );

    // ── Session ───────────────────────────────────────────────────────────────
    let registry = ExchangeRegistry::from_config(file.exchanges);
    for exchange in registry.all() {
        info!(
            exchange = %exchange.name,
            enabled = exchange.enabled,
            market = %exchange.market_type,
            pairs = exchange.pairs.len(),
            "Exchange registered"
        );
    }

    let ledger = PaperLedger::new(
        LedgerConfig {
            initial_balance: cfg.initial_balance,
            trade_notional: cfg.trade_notional,
        },
        Box::new(RandomPnl::new(cfg.pnl_range)),
    );
    let session = Session::new(registry, ledger);

    // ── Engine ────────────────────────────────────────────────────────────────
    let settings = EngineSettings {
        refresh_interval: cfg.refresh_interval,
        auto_trade_interval: cfg.auto_trade_interval,
        candle_history: cfg.candle_history,
    };
    let analyzer = PairAnalyzer::from_config(&file.analysis);
    let (engine, handle) = Engine::new(settings, Arc::new(MockFeed::new()), analyzer, session);

    // ── Dashboard API ─────────────────────────────────────────────────────────
    let api_state = api::AppState {
        engine: handle,
        dashboard_token: cfg.dashboard_token.clone(),
    };

    // ── Spawn all tasks ───────────────────────────────────────────────────────
    let port = cfg.dashboard_port;
    tokio::spawn(engine.run());
    tokio::spawn(async move {
        if let Err(e) = api::serve(api_state, port).await {
            error!(error = %e, "Dashboard API stopped");
        }
    });

    info!("All subsystems started. Waiting for shutdown signal.");
    tokio::signal::ctrl_c().await.unwrap();
    info!("Shutdown signal received. Exiting.");
}
