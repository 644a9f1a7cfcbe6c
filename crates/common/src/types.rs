use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;

/// One OHLCV candle produced by a `CandleFeed`.
///
/// `ma5`, `ma10` and `ma20` are attached after the candle is produced.
/// A value of `0.0` means the average is not yet available (not enough history).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    #[serde(default)]
    pub ma5: f64,
    #[serde(default)]
    pub ma10: f64,
    #[serde(default)]
    pub ma20: f64,
}

impl Candle {
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
            ma5: 0.0,
            ma10: 0.0,
            ma20: 0.0,
        }
    }
}

/// Whether an exchange lists spot or futures markets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MarketType {
    Spot,
    #[default]
    Future,
}

impl std::fmt::Display for MarketType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarketType::Spot => write!(f, "spot"),
            MarketType::Future => write!(f, "future"),
        }
    }
}

impl FromStr for MarketType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "spot" => Ok(MarketType::Spot),
            "future" | "futures" => Ok(MarketType::Future),
            other => Err(Error::Config(format!(
                "market type must be 'spot' or 'future', got: '{other}'"
            ))),
        }
    }
}

/// Trend classification from the ordering of MA5, MA10 and MA20.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum MaAlignment {
    Bullish,
    Bearish,
    #[default]
    Neutral,
}

impl std::fmt::Display for MaAlignment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MaAlignment::Bullish => write!(f, "BULLISH"),
            MaAlignment::Bearish => write!(f, "BEARISH"),
            MaAlignment::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// Discrete trading signal shown for each pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSignal {
    Buy,
    Sell,
    #[default]
    Hold,
}

impl TradeSignal {
    /// The trade side this signal asks for. `Hold` has none.
    pub fn side(&self) -> Option<TradeSide> {
        match self {
            TradeSignal::Buy => Some(TradeSide::Buy),
            TradeSignal::Sell => Some(TradeSide::Sell),
            TradeSignal::Hold => None,
        }
    }
}

impl std::fmt::Display for TradeSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeSignal::Buy => write!(f, "BUY"),
            TradeSignal::Sell => write!(f, "SELL"),
            TradeSignal::Hold => write!(f, "HOLD"),
        }
    }
}

/// Side of an executed paper trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl std::fmt::Display for TradeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeSide::Buy => write!(f, "BUY"),
            TradeSide::Sell => write!(f, "SELL"),
        }
    }
}

impl FromStr for TradeSide {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "BUY" => Ok(TradeSide::Buy),
            "SELL" => Ok(TradeSide::Sell),
            other => Err(Error::Other(format!(
                "trade action must be 'BUY' or 'SELL', got: '{other}'"
            ))),
        }
    }
}

/// Display-time predicate over already-computed pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalFilter {
    #[default]
    All,
    Buy,
    Sell,
    Hold,
}

impl SignalFilter {
    pub fn matches(&self, signal: TradeSignal) -> bool {
        match self {
            SignalFilter::All => true,
            SignalFilter::Buy => signal == TradeSignal::Buy,
            SignalFilter::Sell => signal == TradeSignal::Sell,
            SignalFilter::Hold => signal == TradeSignal::Hold,
        }
    }
}

impl FromStr for SignalFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ALL" => Ok(SignalFilter::All),
            "BUY" => Ok(SignalFilter::Buy),
            "SELL" => Ok(SignalFilter::Sell),
            "HOLD" => Ok(SignalFilter::Hold),
            other => Err(Error::Other(format!(
                "signal filter must be ALL, BUY, SELL or HOLD, got: '{other}'"
            ))),
        }
    }
}

/// Per-pair analysis result, recomputed wholesale on every refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingPair {
    pub symbol: String,
    pub exchange: String,
    pub market_type: MarketType,
    /// Latest close.
    pub price: f64,
    /// Percent change between the last two closes.
    pub change_24h: f64,
    /// Volume of the latest candle.
    pub volume_24h: f64,
    pub volume_ratio: f64,
    /// Standard deviation of recent close-to-close changes.
    pub volatility: f64,
    /// Weighted 0..=100 blend of volume ratio, momentum and liquidity.
    #[serde(default)]
    pub composite_score: f64,
    pub signal: TradeSignal,
    pub ma_alignment: MaAlignment,
    pub candles: Vec<Candle>,
}

/// Stable identity of a pair across snapshot refreshes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey {
    pub exchange: String,
    pub symbol: String,
}

impl PairKey {
    pub fn new(exchange: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            exchange: exchange.into(),
            symbol: symbol.into(),
        }
    }
}

impl std::fmt::Display for PairKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.exchange, self.symbol)
    }
}

impl TradingPair {
    pub fn key(&self) -> PairKey {
        PairKey::new(&self.exchange, &self.symbol)
    }
}

/// An executed paper trade. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: String,
    pub symbol: String,
    #[serde(rename = "type")]
    pub side: TradeSide,
    pub price: f64,
    /// Notional in quote currency.
    pub amount: f64,
    pub timestamp: DateTime<Utc>,
    /// Realized P&L. Always `0.0` for buys.
    pub pnl: f64,
}

impl Trade {
    pub fn new(
        symbol: impl Into<String>,
        side: TradeSide,
        price: f64,
        amount: f64,
        pnl: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            symbol: symbol.into(),
            side,
            price,
            amount,
            timestamp,
            pnl,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BalancePoint {
    pub timestamp: DateTime<Utc>,
    pub balance: f64,
}

/// Read model of the paper-trading account.
///
/// `balance_history` always holds exactly one more entry than `trades`: it is
/// seeded with the initial balance and both grow together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Portfolio {
    pub balance: f64,
    pub total_pnl: f64,
    /// Percent return against the initial balance.
    pub total_return: f64,
    /// Percent of trades with positive P&L.
    pub win_rate: f64,
    pub trades: Vec<Trade>,
    pub balance_history: Vec<BalancePoint>,
}

impl Portfolio {
    pub fn new(initial_balance: f64) -> Self {
        Self {
            balance: initial_balance,
            total_pnl: 0.0,
            total_return: 0.0,
            win_rate: 0.0,
            trades: Vec::new(),
            balance_history: vec![BalancePoint {
                timestamp: Utc::now(),
                balance: initial_balance,
            }],
        }
    }
}

/// An exchange whose symbols the feed generates while `enabled` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    pub name: String,
    pub enabled: bool,
    #[serde(default)]
    pub market_type: MarketType,
    pub pairs: Vec<String>,
}

/// Events broadcast by the engine to dashboard subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DashboardEvent {
    PairsRefreshed {
        pair_count: usize,
        signal_count: usize,
        timestamp: DateTime<Utc>,
    },
    TradeExecuted {
        trade: Trade,
        balance: f64,
    },
    ExchangeToggled {
        name: String,
        enabled: bool,
    },
    AutoTradingChanged {
        enabled: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_filter_all_matches_everything() {
        for signal in [TradeSignal::Buy, TradeSignal::Sell, TradeSignal::Hold] {
            assert!(SignalFilter::All.matches(signal));
        }
    }

    #[test]
    fn signal_filter_matches_only_its_signal() {
        assert!(SignalFilter::Buy.matches(TradeSignal::Buy));
        assert!(!SignalFilter::Buy.matches(TradeSignal::Sell));
        assert!(!SignalFilter::Sell.matches(TradeSignal::Hold));
        assert!(SignalFilter::Hold.matches(TradeSignal::Hold));
    }

    #[test]
    fn signal_filter_parses_case_insensitively() {
        assert_eq!("buy".parse::<SignalFilter>().unwrap(), SignalFilter::Buy);
        assert_eq!("ALL".parse::<SignalFilter>().unwrap(), SignalFilter::All);
        assert!("LONG".parse::<SignalFilter>().is_err());
    }

    #[test]
    fn trade_serializes_side_as_type() {
        let trade = Trade::new("BTC/USDT", TradeSide::Sell, 100.0, 100.0, 2.5, Utc::now());
        let json = serde_json::to_value(&trade).unwrap();
        assert_eq!(json["type"], "SELL");
        assert_eq!(json["symbol"], "BTC/USDT");
    }

    #[test]
    fn new_portfolio_is_seeded_with_one_balance_point() {
        let portfolio = Portfolio::new(1000.0);
        assert_eq!(portfolio.balance_history.len(), 1);
        assert_eq!(portfolio.balance_history[0].balance, 1000.0);
        assert!(portfolio.trades.is_empty());
    }

    #[test]
    fn hold_signal_has_no_side() {
        assert_eq!(TradeSignal::Buy.side(), Some(TradeSide::Buy));
        assert_eq!(TradeSignal::Sell.side(), Some(TradeSide::Sell));
        assert_eq!(TradeSignal::Hold.side(), None);
    }
}
