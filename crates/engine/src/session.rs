use common::{MarketType, PairKey, Portfolio, SignalFilter, TradingPair};
use paper::PaperLedger;
use strategy::PairAnalyzer;

use crate::registry::ExchangeRegistry;

/// All mutable dashboard state, owned by the engine task.
///
/// Readers get a consistent view through `EngineHandle`; only the engine
/// mutates it.
pub struct Session {
    pub(crate) registry: ExchangeRegistry,
    pub(crate) ledger: PaperLedger,
    pub(crate) pairs: Vec<TradingPair>,
    pub(crate) auto_trading: bool,
    pub(crate) signal_filter: SignalFilter,
    /// `None` shows every market type.
    pub(crate) market_type: Option<MarketType>,
}

impl Session {
    pub fn new(registry: ExchangeRegistry, ledger: PaperLedger) -> Self {
        Self {
            registry,
            ledger,
            pairs: Vec::new(),
            auto_trading: false,
            signal_filter: SignalFilter::All,
            market_type: None,
        }
    }

    pub fn registry(&self) -> &ExchangeRegistry {
        &self.registry
    }

    pub fn portfolio(&self) -> &Portfolio {
        self.ledger.portfolio()
    }

    /// The full current snapshot, ordered by volume ratio.
    pub fn pairs(&self) -> &[TradingPair] {
        &self.pairs
    }

    pub fn pair(&self, key: &PairKey) -> Option<&TradingPair> {
        self.pairs
            .iter()
            .find(|p| p.exchange == key.exchange && p.symbol == key.symbol)
    }

    pub fn auto_trading(&self) -> bool {
        self.auto_trading
    }

    pub fn signal_filter(&self) -> SignalFilter {
        self.signal_filter
    }

    pub fn market_type(&self) -> Option<MarketType> {
        self.market_type
    }

    /// Snapshot pairs passing the current market-type selection and signal filter.
    pub fn visible_pairs(&self) -> impl Iterator<Item = &TradingPair> {
        self.filtered_pairs(self.signal_filter, self.market_type)
    }

    /// Snapshot pairs passing an explicit filter. Nothing is recomputed.
    pub fn filtered_pairs(
        &self,
        signal: SignalFilter,
        market: Option<MarketType>,
    ) -> impl Iterator<Item = &TradingPair> {
        self.pairs.iter().filter(move |p| {
            signal.matches(p.signal) && market.map_or(true, |m| p.market_type == m)
        })
    }

    /// Pairs the auto-trader may pick from.
    pub fn auto_trade_candidates<'a>(
        &'a self,
        analyzer: &'a PairAnalyzer,
    ) -> impl Iterator<Item = &'a TradingPair> {
        self.pairs.iter().filter(move |p| analyzer.is_actionable(p))
    }

    pub(crate) fn replace_pairs(&mut self, pairs: Vec<TradingPair>) -> Vec<TradingPair> {
        std::mem::replace(&mut self.pairs, pairs)
    }
}
