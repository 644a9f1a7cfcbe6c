use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use common::TradingPair;

/// Assigns realized P&L to a SELL.
///
/// The ledger's bookkeeping only consumes the returned number, so a model based
/// on real entry/exit prices can replace `RandomPnl` without touching it.
pub trait PnlModel: Send + Sync {
    fn sell_pnl(&self, pair: &TradingPair, notional: f64) -> f64;
}

/// Uniform P&L in `[-range, range)`, unrelated to the pair's price.
pub struct RandomPnl {
    range: f64,
    rng: Mutex<StdRng>,
}

impl RandomPnl {
    /// Panics if `range` is not finite.
    pub fn new(range: f64) -> Self {
        assert!(range.is_finite(), "pnl range must be finite, got {range}");
        Self {
            range: range.abs(),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic sequence for replays and tests.
    pub fn seeded(range: f64, seed: u64) -> Self {
        assert!(range.is_finite(), "pnl range must be finite, got {range}");
        Self {
            range: range.abs(),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl PnlModel for RandomPnl {
    fn sell_pnl(&self, _pair: &TradingPair, _notional: f64) -> f64 {
        if self.range == 0.0 {
            return 0.0;
        }
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        rng.gen_range(-self.range..self.range)
    }
}

/// Constant P&L on every SELL.
#[derive(Debug, Clone, Copy)]
pub struct FixedPnl(pub f64);

impl PnlModel for FixedPnl {
    fn sell_pnl(&self, _pair: &TradingPair, _notional: f64) -> f64 {
        self.0
    }
}
