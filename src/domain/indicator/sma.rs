//! Simple Moving Average.
//!
//! SMA(n)[i] = mean(C[i-n+1..=i]), kept as a running window sum.
//! Warmup: first (n-1) values are NaN.

pub fn calculate_sma(close: &[f64], period: usize) -> Vec<f64> {
    let mut values = vec![f64::NAN; close.len()];
    if period == 0 {
        return values;
    }

    let mut window_sum = 0.0;
    for (i, price) in close.iter().enumerate() {
        window_sum += price;
        if i >= period {
            window_sum -= close[i - period];
        }
        if i + 1 >= period {
            values[i] = window_sum / period as f64;
        }
    }
    values
}
