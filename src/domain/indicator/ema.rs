//! Exponential Moving Average.
//!
//! k = 2/(n+1), seeded with the SMA of the first n closes, then
//! EMA[i] = C[i]*k + EMA[i-1]*(1-k).
//! Warmup: first (n-1) values are NaN.

pub fn calculate_ema(close: &[f64], period: usize) -> Vec<f64> {
    let mut values = vec![f64::NAN; close.len()];
    if period == 0 || close.len() < period {
        return values;
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut ema = close[..period].iter().sum::<f64>() / period as f64;
    values[period - 1] = ema;

    for i in period..close.len() {
        ema = close[i] * k + ema * (1.0 - k);
        values[i] = ema;
    }
    values
}
