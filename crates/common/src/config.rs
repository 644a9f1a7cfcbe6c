use std::time::Duration;

use tracing::warn;

/// Upper bound on `CANDLE_HISTORY`; larger series only slow every refresh.
pub const MAX_CANDLE_HISTORY: usize = 10_000;

/// All configuration loaded from environment variables at startup.
/// Missing required variables cause an immediate panic with a clear message.
#[derive(Debug, Clone)]
pub struct Config {
    // Dashboard
    pub dashboard_token: String,
    pub dashboard_port: u16,

    // Timers
    pub refresh_interval: Duration,
    pub auto_trade_interval: Duration,

    // Paper account
    pub initial_balance: f64,
    pub trade_notional: f64,
    /// Half-width of the simulated SELL P&L range.
    pub pnl_range: f64,

    // Feed
    /// Candles generated per pair, not counting the seed candle.
    pub candle_history: usize,

    // Analysis thresholds and exchange list (TOML)
    pub dashboard_config_path: String,
}

impl Config {
    /// Load all configuration from environment variables.
    /// Loads `.env` if present. Panics on any missing required variable.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // ignore error if .env not present
        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup.
    pub fn from_source<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let dashboard_token = lookup("DASHBOARD_TOKEN").unwrap_or_else(|| {
            panic!("Required environment variable 'DASHBOARD_TOKEN' is not set. Check your .env file.")
        });

        let cfg = Config {
            dashboard_token,
            dashboard_port: parsed(&lookup, "DASHBOARD_PORT", 8080),
            refresh_interval: Duration::from_secs(parsed(&lookup, "REFRESH_INTERVAL_SECS", 30)),
            auto_trade_interval: Duration::from_secs(parsed(
                &lookup,
                "AUTO_TRADE_INTERVAL_SECS",
                60,
            )),
            initial_balance: parsed(&lookup, "INITIAL_BALANCE", 1000.0),
            trade_notional: parsed(&lookup, "TRADE_NOTIONAL", 100.0),
            pnl_range: parsed(&lookup, "PNL_RANGE", 10.0),
            candle_history: parsed(&lookup, "CANDLE_HISTORY", 50),
            dashboard_config_path: lookup("DASHBOARD_CONFIG_PATH")
                .unwrap_or_else(|| "config/dashboard.toml".to_string()),
        };
        cfg.validate();
        cfg
    }

    /// Panic on values that would break the engine or the ledger at runtime.
    fn validate(&self) {
        if self.refresh_interval.is_zero() {
            panic!("REFRESH_INTERVAL_SECS must be at least 1, got 0");
        }
        if self.auto_trade_interval.is_zero() {
            panic!("AUTO_TRADE_INTERVAL_SECS must be at least 1, got 0");
        }
        if !(self.trade_notional.is_finite() && self.trade_notional > 0.0) {
            panic!("TRADE_NOTIONAL must be a positive number, got {}", self.trade_notional);
        }
        if !(self.initial_balance.is_finite() && self.initial_balance >= 0.0) {
            panic!("INITIAL_BALANCE must be a non-negative number, got {}", self.initial_balance);
        }
        if !self.pnl_range.is_finite() {
            panic!("PNL_RANGE must be a finite number, got {}", self.pnl_range);
        }
        if self.candle_history > MAX_CANDLE_HISTORY {
            panic!(
                "CANDLE_HISTORY must be at most {MAX_CANDLE_HISTORY}, got {}",
                self.candle_history
            );
        }
    }
}

/// Parse an optional variable, falling back to `default` when unset or malformed.
fn parsed<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + std::fmt::Debug,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, default = ?default, "Unparseable config value, using default");
            default
        }),
        None => default,
    }
}
