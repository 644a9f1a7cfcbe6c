use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::trace;

use common::{Candle, CandleFeed, Result};

/// Random-walk candle generator standing in for a market-data connection.
///
/// One candle per day ending now. Roughly one candle in ten carries a
/// 3–8× volume spike so the signal pipeline has something to find.
pub struct MockFeed {
    rng: Mutex<StdRng>,
}

impl MockFeed {
    const SPIKE_PROBABILITY: f64 = 0.1;

    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn generate(&self, len: usize) -> Vec<Candle> {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let now = Utc::now();
        let mut price: f64 = rng.gen_range(1_000.0..51_000.0);

        (0..len)
            .rev()
            .map(|days_ago| {
                let volatility = 0.02 + rng.gen::<f64>() * 0.03;
                let change = (rng.gen::<f64>() - 0.5) * volatility;
                price *= 1.0 + change;

                let open = price;
                let high = open * (1.0 + rng.gen::<f64>() * 0.02);
                let low = open * (1.0 - rng.gen::<f64>() * 0.02);
                let close = low + rng.gen::<f64>() * (high - low);

                let mut volume = rng.gen::<f64>() * 1_000_000.0 + 100_000.0;
                if rng.gen_bool(Self::SPIKE_PROBABILITY) {
                    volume *= 3.0 + rng.gen::<f64>() * 5.0;
                }

                price = close;
                Candle::new(
                    now - Duration::days(days_ago as i64),
                    open,
                    high,
                    low,
                    close,
                    volume,
                )
            })
            .collect()
    }
}

impl Default for MockFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CandleFeed for MockFeed {
    async fn candles(&self, exchange: &str, symbol: &str, len: usize) -> Result<Vec<Candle>> {
        trace!(exchange, symbol, len, "Generating mock candles");
        Ok(self.generate(len))
    }
}
