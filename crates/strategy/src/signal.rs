use common::{MaAlignment, TradeSignal};

/// Combines a volume spike with MA alignment into BUY / SELL / HOLD.
#[derive(Debug, Clone)]
pub struct SignalClassifier {
    /// Volume ratio at or above which a candle counts as a spike.
    pub volume_ratio_threshold: f64,
}

impl Default for SignalClassifier {
    fn default() -> Self {
        Self::new(Self::DEFAULT_THRESHOLD)
    }
}

impl SignalClassifier {
    pub const DEFAULT_THRESHOLD: f64 = 3.0;

    pub fn new(volume_ratio_threshold: f64) -> Self {
        Self {
            volume_ratio_threshold,
        }
    }

    pub fn is_spike(&self, volume_ratio: f64) -> bool {
        volume_ratio >= self.volume_ratio_threshold
    }

    pub fn classify(&self, volume_ratio: f64, alignment: MaAlignment) -> TradeSignal {
        if !self.is_spike(volume_ratio) {
            return TradeSignal::Hold;
        }
        match alignment {
            MaAlignment::Bullish => TradeSignal::Buy,
            MaAlignment::Bearish => TradeSignal::Sell,
            MaAlignment::Neutral => TradeSignal::Hold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn below_threshold_holds() {
        let c = SignalClassifier::default();
        assert_eq!(c.classify(2.9, MaAlignment::Bullish), TradeSignal::Hold);
        assert_eq!(c.classify(2.9, MaAlignment::Bearish), TradeSignal::Hold);
    }

    #[test]
    fn threshold_is_inclusive() {
        let c = SignalClassifier::default();
        assert_eq!(c.classify(3.0, MaAlignment::Bullish), TradeSignal::Buy);
        assert_eq!(c.classify(3.0, MaAlignment::Bearish), TradeSignal::Sell);
    }

    #[test]
    fn spike_without_alignment_holds() {
        let c = SignalClassifier::default();
        assert_eq!(c.classify(5.0, MaAlignment::Neutral), TradeSignal::Hold);
    }

    #[test]
    fn custom_threshold() {
        let c = SignalClassifier::new(5.0);
        assert_eq!(c.classify(4.0, MaAlignment::Bullish), TradeSignal::Hold);
        assert_eq!(c.classify(5.5, MaAlignment::Bullish), TradeSignal::Buy);
    }
}
