use std::collections::HashMap;

use tracing::warn;

use common::{CandleFeed, PairKey, Result, TradeSignal, TradingPair};
use strategy::{sort_by_volume_ratio, PairAnalyzer};

use crate::registry::ExchangeRegistry;

/// Generate and analyze a fresh snapshot for every enabled exchange's symbols.
///
/// Each series holds `history + 1` candles. Pairs are ordered by volume ratio,
/// highest first. A feed error aborts the whole snapshot.
pub async fn build_snapshot(
    feed: &dyn CandleFeed,
    registry: &ExchangeRegistry,
    analyzer: &PairAnalyzer,
    history: usize,
) -> Result<Vec<TradingPair>> {
    let mut pairs = Vec::new();

    for exchange in registry.enabled() {
        for symbol in &exchange.pairs {
            let candles = feed.candles(&exchange.name, symbol, history + 1).await?;
            match analyzer.analyze(&exchange.name, symbol, exchange.market_type, candles) {
                Some(pair) => pairs.push(pair),
                None => warn!(exchange = %exchange.name, %symbol, "Feed returned no candles"),
            }
        }
    }

    sort_by_volume_ratio(&mut pairs);
    Ok(pairs)
}

/// Change in a pair's signal between two snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalChange {
    pub key: PairKey,
    pub from: TradeSignal,
    pub to: TradeSignal,
}

/// Identity-keyed comparison of two snapshots.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotDiff {
    pub added: Vec<PairKey>,
    pub removed: Vec<PairKey>,
    pub signal_changes: Vec<SignalChange>,
}

impl SnapshotDiff {
    pub fn between(previous: &[TradingPair], next: &[TradingPair]) -> Self {
        let prev: HashMap<PairKey, TradeSignal> =
            previous.iter().map(|p| (p.key(), p.signal)).collect();
        let next_map: HashMap<PairKey, TradeSignal> =
            next.iter().map(|p| (p.key(), p.signal)).collect();

        let mut diff = SnapshotDiff::default();
        for pair in next {
            let key = pair.key();
            match prev.get(&key) {
                None => diff.added.push(key),
                Some(&from) if from != pair.signal => diff.signal_changes.push(SignalChange {
                    key,
                    from,
                    to: pair.signal,
                }),
                Some(_) => {}
            }
        }
        for pair in previous {
            if !next_map.contains_key(&pair.key()) {
                diff.removed.push(pair.key());
            }
        }

        diff.added.sort();
        diff.removed.sort();
        diff.signal_changes.sort_by(|a, b| a.key.cmp(&b.key));
        diff
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.signal_changes.is_empty()
    }
}
