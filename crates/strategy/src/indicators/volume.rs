use common::Candle;

/// Latest-candle volume relative to the trailing average volume.
///
/// The trailing window covers the `lookback` candles immediately before the
/// latest one. Returns the neutral value `1.0` when there are fewer than
/// `lookback + 1` candles or when the trailing average is zero.
#[derive(Debug, Clone)]
pub struct VolumeRatio {
    pub lookback: usize,
}

impl Default for VolumeRatio {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LOOKBACK)
    }
}

impl VolumeRatio {
    pub const DEFAULT_LOOKBACK: usize = 30;
    pub const NEUTRAL: f64 = 1.0;

    pub fn new(lookback: usize) -> Self {
        assert!(lookback >= 1, "Volume ratio lookback must be >= 1");
        Self { lookback }
    }

    /// Compute the ratio from a chronologically ordered candle series.
    pub fn compute(&self, candles: &[Candle]) -> f64 {
        if candles.len() < self.lookback + 1 {
            return Self::NEUTRAL;
        }

        let latest = candles.len() - 1;
        let trailing = &candles[latest - self.lookback..latest];
        let avg = trailing.iter().map(|c| c.volume).sum::<f64>() / self.lookback as f64;

        if avg > 0.0 {
            candles[latest].volume / avg
        } else {
            Self::NEUTRAL
        }
    }
}
