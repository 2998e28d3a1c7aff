//! RSI (Relative Strength Index) with Wilder's smoothing.
//!
//! - First average: simple mean of the first n gains/losses
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//!
//! RSI = 100 - (100 / (1 + avg_gain / avg_loss)), or 100 when avg_loss == 0.
//! Warmup: first n values are NaN (n price changes are needed).

pub fn calculate_rsi(close: &[f64], period: usize) -> Vec<f64> {
    let mut values = vec![f64::NAN; close.len()];
    if period == 0 || close.len() <= period {
        return values;
    }

    let changes: Vec<f64> = close.windows(2).map(|w| w[1] - w[0]).collect();
    let gain = |c: f64| if c > 0.0 { c } else { 0.0 };
    let loss = |c: f64| if c < 0.0 { -c } else { 0.0 };

    let mut avg_gain = changes[..period].iter().map(|c| gain(*c)).sum::<f64>() / period as f64;
    let mut avg_loss = changes[..period].iter().map(|c| loss(*c)).sum::<f64>() / period as f64;
    values[period] = rsi_value(avg_gain, avg_loss);

    for (offset, change) in changes.iter().enumerate().skip(period) {
        avg_gain = (avg_gain * (period - 1) as f64 + gain(*change)) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + loss(*change)) / period as f64;
        values[offset + 1] = rsi_value(avg_gain, avg_loss);
    }
    values
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
    }
}
