//! Rolling population standard deviation.
//!
//! STDDEV(n)[i] = sqrt(sum((x[i-j] - SMA(n)[i])^2 for j in 0..n) / n)
//! Warmup: first (n-1) values are NaN; windows containing NaN are NaN.

use crate::domain::indicator::nan_series;

pub fn rolling_stddev(data: &[f64], period: usize) -> Vec<f64> {
    let mut result = nan_series(data.len());
    if period == 0 || data.len() < period {
        return result;
    }

    for i in (period - 1)..data.len() {
        let window = &data[i + 1 - period..=i];
        let mean = window.iter().sum::<f64>() / period as f64;
        let variance = window
            .iter()
            .map(|x| {
                let diff = x - mean;
                diff * diff
            })
            .sum::<f64>()
            / period as f64;
        result[i] = variance.sqrt();
    }

    result
}
