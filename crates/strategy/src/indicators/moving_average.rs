use common::Candle;

/// Lookback periods attached to every candle as `ma5`, `ma10` and `ma20`.
pub const MA_PERIODS: [usize; 3] = [5, 10, 20];

/// Simple moving average, aligned index-for-index with `values`.
///
/// Indices without a full window (`i < period - 1`) hold `0.0`, which callers
/// must read as "not yet available". A zero period yields all zeros.
pub fn moving_average(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 {
        return vec![0.0; values.len()];
    }

    (0..values.len())
        .map(|i| {
            if i + 1 < period {
                0.0
            } else {
                let window = &values[i + 1 - period..=i];
                window.iter().sum::<f64>() / period as f64
            }
        })
        .collect()
}

/// Compute MA5/MA10/MA20 over closing prices and write them onto each candle.
pub fn attach_moving_averages(candles: &mut [Candle]) {
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let [fast, mid, slow] = MA_PERIODS.map(|p| moving_average(&closes, p));

    for (i, candle) in candles.iter_mut().enumerate() {
        candle.ma5 = fast[i];
        candle.ma10 = mid[i];
        candle.ma20 = slow[i];
    }
}
