use common::{Candle, MaAlignment};

/// Classify trend alignment from MA5, MA10 and MA20.
///
/// Any average that is `0.0` (not yet available) or NaN yields `Neutral`.
pub fn alignment_from_averages(ma5: f64, ma10: f64, ma20: f64) -> MaAlignment {
    let available = |v: f64| v != 0.0 && !v.is_nan();
    if !(available(ma5) && available(ma10) && available(ma20)) {
        return MaAlignment::Neutral;
    }

    if ma5 > ma10 && ma10 > ma20 {
        MaAlignment::Bullish
    } else if ma5 < ma10 && ma10 < ma20 {
        MaAlignment::Bearish
    } else {
        MaAlignment::Neutral
    }
}

/// Alignment of the latest candle in the series. Empty series are `Neutral`.
pub fn classify_alignment(candles: &[Candle]) -> MaAlignment {
    candles
        .last()
        .map(|c| alignment_from_averages(c.ma5, c.ma10, c.ma20))
        .unwrap_or(MaAlignment::Neutral)
}
