//! ROC (Rate of Change).
//!
//! ROC(n)[i] = ((C[i] - C[i-n]) / C[i-n]) * 100, and 0 when C[i-n] == 0.
//! Warmup: first n values are NaN.

pub fn calculate_roc(close: &[f64], period: usize) -> Vec<f64> {
    close
        .iter()
        .enumerate()
        .map(|(i, curr)| {
            if period == 0 || i < period {
                return f64::NAN;
            }
            let prev = close[i - period];
            if prev == 0.0 {
                0.0
            } else {
                ((curr - prev) / prev) * 100.0
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn roc_warmup() {
        let values = calculate_roc(&[100.0, 105.0, 110.0, 115.0, 120.0], 3);
        assert!(values[..3].iter().all(|v| v.is_nan()));
        assert!(values[3].is_finite());
    }

    #[test]
    fn roc_basic_calculation() {
        let values = calculate_roc(&[100.0, 105.0, 110.0, 115.0], 2);
        assert_relative_eq!(values[2], 10.0);
        assert_relative_eq!(values[3], (115.0 - 105.0) / 105.0 * 100.0);
    }

    #[test]
    fn roc_zero_division() {
        let values = calculate_roc(&[0.0, 100.0, 110.0], 2);
        assert_eq!(values[2], 0.0);
    }

    #[test]
    fn roc_negative_change() {
        let values = calculate_roc(&[100.0, 90.0, 80.0], 2);
        assert_relative_eq!(values[2], -20.0);
    }
}
