use async_trait::async_trait;

use crate::{Candle, Result};

/// Source of OHLCV candles for one exchange/symbol pair.
///
/// `MockFeed` in `crates/engine` implements this with a random walk. A real
/// market-data client can replace it without touching indicator, signal or
/// ledger code.
#[async_trait]
pub trait CandleFeed: Send + Sync {
    /// Return `len` chronologically ordered candles, oldest first.
    async fn candles(&self, exchange: &str, symbol: &str, len: usize) -> Result<Vec<Candle>>;
}
