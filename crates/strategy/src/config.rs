use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use common::{Error, Exchange, Result};

use crate::indicators::VolumeRatio;
use crate::signal::SignalClassifier;

/// Top-level dashboard config file (TOML).
///
/// Example `config/dashboard.toml`:
/// ```toml
/// [analysis]
/// volume_ratio_threshold = 3.0
/// volume_lookback = 30
/// volatility_period = 10
///
/// [[exchange]]
/// name = "Binance"
/// enabled = true
/// market_type = "future"
/// pairs = ["BTC/USDT", "ETH/USDT"]
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DashboardFileConfig {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    /// Empty means "use the built-in exchange list".
    #[serde(rename = "exchange", default)]
    pub exchanges: Vec<Exchange>,
}

/// Indicator and signal thresholds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub volume_ratio_threshold: f64,
    /// Candles averaged before the latest one for the volume ratio.
    pub volume_lookback: usize,
    pub volatility_period: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            volume_ratio_threshold: SignalClassifier::DEFAULT_THRESHOLD,
            volume_lookback: VolumeRatio::DEFAULT_LOOKBACK,
            volatility_period: 10,
        }
    }
}

impl DashboardFileConfig {
    /// Parse a config file from TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
            .map_err(|e| Error::Config(format!("failed to parse '{}': {e}", path.display())))
    }

    /// Load from a TOML file, falling back to built-in defaults when the file
    /// does not exist. Any other error is returned.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(path = %path.display(), "Dashboard config not found, using defaults");
            return Ok(Self::default());
        }
        let cfg = Self::load(path)?;
        info!(
            path = %path.display(),
            exchanges = cfg.exchanges.len(),
            threshold = cfg.analysis.volume_ratio_threshold,
            "Loaded dashboard config"
        );
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        let a = &self.analysis;
        if a.volume_lookback == 0 {
            return Err(Error::Config("analysis.volume_lookback must be >= 1".into()));
        }
        if a.volatility_period < 2 {
            return Err(Error::Config("analysis.volatility_period must be >= 2".into()));
        }
        if !(a.volume_ratio_threshold.is_finite() && a.volume_ratio_threshold > 0.0) {
            return Err(Error::Config(
                "analysis.volume_ratio_threshold must be a positive number".into(),
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for ex in &self.exchanges {
            if !seen.insert(ex.name.as_str()) {
                return Err(Error::Config(format!("duplicate exchange '{}'", ex.name)));
            }
        }
        Ok(())
    }
}
