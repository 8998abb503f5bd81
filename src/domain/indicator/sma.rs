//! Simple Moving Average.
//!
//! SMA(n)[i] = mean(x[i-n+1..=i]). The first (n-1) values after the input's
//! leading NaN run are NaN; a window touching an interior NaN is NaN.

use crate::domain::indicator::{first_valid_index, nan_series};

pub fn calculate_sma(data: &[f64], period: usize) -> Vec<f64> {
    let mut result = nan_series(data.len());
    let start = first_valid_index(data);
    if period == 0 || data.len() - start < period {
        return result;
    }

    for i in (start + period - 1)..data.len() {
        let window = &data[i + 1 - period..=i];
        result[i] = window.iter().sum::<f64>() / period as f64;
    }

    result
}
