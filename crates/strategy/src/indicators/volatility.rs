/// Sample standard deviation of the last `period` close-to-close fractional
/// changes. Returns `0.0` until `period + 1` closes are available.
#[derive(Debug, Clone)]
pub struct PriceVolatility {
    pub period: usize,
}

impl Default for PriceVolatility {
    fn default() -> Self {
        Self::new(10)
    }
}

impl PriceVolatility {
    pub fn new(period: usize) -> Self {
        assert!(period >= 2, "Volatility period must be >= 2");
        Self { period }
    }

    pub fn compute(&self, closes: &[f64]) -> f64 {
        if closes.len() < self.period + 1 {
            return 0.0;
        }

        let window = &closes[closes.len() - self.period - 1..];
        let changes: Vec<f64> = window
            .windows(2)
            .filter(|w| w[0] != 0.0)
            .map(|w| (w[1] - w[0]) / w[0])
            .collect();
        if changes.len() < 2 {
            return 0.0;
        }

        let n = changes.len() as f64;
        let mean = changes.iter().sum::<f64>() / n;
        let variance = changes.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / (n - 1.0);
        variance.sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_when_insufficient_history() {
        assert_eq!(PriceVolatility::new(10).compute(&[1.0; 10]), 0.0);
    }

    #[test]
    fn flat_prices_have_zero_volatility() {
        assert_eq!(PriceVolatility::new(3).compute(&[5.0; 8]), 0.0);
    }

    #[test]
    fn constant_growth_has_zero_volatility() {
        let closes: Vec<f64> = (0..6).map(|i| 100.0 * 1.01f64.powi(i)).collect();
        assert!(PriceVolatility::new(4).compute(&closes) < 1e-12);
    }

    #[test]
    fn up_then_down_known_value() {
        // changes: +10%, -10% → mean 0, sample variance 0.02
        let closes = [100.0, 110.0, 99.0];
        let v = PriceVolatility::new(2).compute(&closes);
        assert!((v - 0.02f64.sqrt()).abs() < 1e-12, "got {v}");
    }
}
