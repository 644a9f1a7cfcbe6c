use std::cmp::Ordering;
use std::str::FromStr;

use serde::Serialize;
use tracing::debug;

use common::{Candle, Error, MarketType, TradeSignal, TradingPair};

use crate::config::AnalysisConfig;
use crate::indicators::{attach_moving_averages, classify_alignment, PriceVolatility, VolumeRatio};
use crate::signal::SignalClassifier;

/// Turns a raw candle series into a `TradingPair` snapshot.
#[derive(Debug, Clone, Default)]
pub struct PairAnalyzer {
    pub volume_ratio: VolumeRatio,
    pub volatility: PriceVolatility,
    pub classifier: SignalClassifier,
}

impl PairAnalyzer {
    pub fn from_config(cfg: &AnalysisConfig) -> Self {
        Self {
            volume_ratio: VolumeRatio::new(cfg.volume_lookback),
            volatility: PriceVolatility::new(cfg.volatility_period),
            classifier: SignalClassifier::new(cfg.volume_ratio_threshold),
        }
    }

    /// Attach moving averages and derive every per-pair statistic.
    /// Returns `None` for an empty series.
    pub fn analyze(
        &self,
        exchange: &str,
        symbol: &str,
        market_type: MarketType,
        mut candles: Vec<Candle>,
    ) -> Option<TradingPair> {
        attach_moving_averages(&mut candles);

        let latest = candles.last()?;
        let change_24h = match candles.len() {
            n if n >= 2 && candles[n - 2].close != 0.0 => {
                let previous = candles[n - 2].close;
                (latest.close - previous) / previous * 100.0
            }
            _ => 0.0,
        };

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let volume_ratio = self.volume_ratio.compute(&candles);
        let composite_score = composite_score(volume_ratio, change_24h, latest.volume);
        let ma_alignment = classify_alignment(&candles);
        let signal = self.classifier.classify(volume_ratio, ma_alignment);

        debug!(
            exchange,
            symbol,
            volume_ratio,
            alignment = %ma_alignment,
            signal = %signal,
            "Pair analyzed"
        );

        Some(TradingPair {
            symbol: symbol.to_string(),
            exchange: exchange.to_string(),
            market_type,
            price: latest.close,
            change_24h,
            volume_24h: latest.volume,
            volume_ratio,
            volatility: self.volatility.compute(&closes),
            composite_score,
            signal,
            ma_alignment,
            candles,
        })
    }

    /// Pairs eligible for automatic execution: a spike with a BUY or SELL signal.
    pub fn is_actionable(&self, pair: &TradingPair) -> bool {
        pair.signal != TradeSignal::Hold && self.classifier.is_spike(pair.volume_ratio)
    }
}

/// Order pairs by volume ratio, highest first.
pub fn sort_by_volume_ratio(pairs: &mut [TradingPair]) {
    pairs.sort_by(|a, b| b.volume_ratio.total_cmp(&a.volume_ratio));
}

const VOLUME_WEIGHT: f64 = 0.4;
const MOMENTUM_WEIGHT: f64 = 0.3;
const LIQUIDITY_WEIGHT: f64 = 0.3;

/// Opportunity score in `0..=100`, rounded to two decimals.
///
/// Each component is capped at 100 before weighting: volume ratio ×10,
/// absolute percent change ×2, and 20 points per million of latest volume.
pub fn composite_score(volume_ratio: f64, change_pct: f64, volume: f64) -> f64 {
    let volume_score = (volume_ratio * 10.0).clamp(0.0, 100.0);
    let momentum_score = (change_pct.abs() * 2.0).min(100.0);
    let liquidity_score = (volume / 1_000_000.0 * 20.0).clamp(0.0, 100.0);

    let score = volume_score * VOLUME_WEIGHT
        + momentum_score * MOMENTUM_WEIGHT
        + liquidity_score * LIQUIDITY_WEIGHT;
    if score.is_finite() {
        (score * 100.0).round() / 100.0
    } else {
        0.0
    }
}

/// Ordering for the opportunities list. Every key sorts highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// Volume ratio, ties broken by composite score then volume.
    #[default]
    VolumeRatio,
    Volume,
    /// Absolute 24h change.
    Change,
    Price,
    CompositeScore,
}

impl SortKey {
    fn compare(self, a: &TradingPair, b: &TradingPair) -> Ordering {
        match self {
            SortKey::VolumeRatio => b
                .volume_ratio
                .total_cmp(&a.volume_ratio)
                .then_with(|| b.composite_score.total_cmp(&a.composite_score))
                .then_with(|| b.volume_24h.total_cmp(&a.volume_24h)),
            SortKey::Volume => b.volume_24h.total_cmp(&a.volume_24h),
            SortKey::Change => b.change_24h.abs().total_cmp(&a.change_24h.abs()),
            SortKey::Price => b.price.total_cmp(&a.price),
            SortKey::CompositeScore => b.composite_score.total_cmp(&a.composite_score),
        }
    }
}

impl FromStr for SortKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "volume_ratio" => Ok(SortKey::VolumeRatio),
            "volume" | "current_volume" => Ok(SortKey::Volume),
            "change" | "price_change_24h" => Ok(SortKey::Change),
            "price" | "current_price" => Ok(SortKey::Price),
            "composite_score" | "score" => Ok(SortKey::CompositeScore),
            other => Err(Error::Other(format!(
                "sort must be volume_ratio, volume, change, price or composite_score, got: '{other}'"
            ))),
        }
    }
}

/// Non-HOLD pairs ordered by `sort`, at most `n`.
pub fn top_opportunities(pairs: &[TradingPair], n: usize, sort: SortKey) -> Vec<&TradingPair> {
    let mut out: Vec<&TradingPair> = pairs
        .iter()
        .filter(|p| p.signal != TradeSignal::Hold)
        .collect();
    out.sort_by(|a, b| sort.compare(a, b));
    out.truncate(n);
    out
}

/// Compact volume label: `1.2M`, `3.4K`, `999`.
pub fn format_volume(volume: f64) -> String {
    if volume >= 1_000_000.0 {
        format!("{:.1}M", volume / 1_000_000.0)
    } else if volume >= 1_000.0 {
        format!("{:.1}K", volume / 1_000.0)
    } else {
        format!("{volume:.0}")
    }
}
