//! Exponential and smoothed (Wilder) moving averages.
//!
//! Both seed with the SMA of the first n values, placed at index n-1:
//! - EMA: k = 2/(n+1), EMA[i] = x[i]*k + EMA[i-1]*(1-k)
//! - SMMA: SMMA[i] = (SMMA[i-1]*(n-1) + x[i]) / n
//!
//! Warmup: first (n-1) values are NaN. A NaN in the seed window or in any
//! later input carries through every value after it.

use crate::domain::indicator::nan_series;

pub fn calculate_ema(data: &[f64], period: usize) -> Vec<f64> {
    let k = 2.0 / (period as f64 + 1.0);
    seeded_recurrence(data, period, |prev, x| x * k + prev * (1.0 - k))
}

pub fn calculate_smma(data: &[f64], period: usize) -> Vec<f64> {
    let n = period as f64;
    seeded_recurrence(data, period, |prev, x| (prev * (n - 1.0) + x) / n)
}

fn seeded_recurrence(data: &[f64], period: usize, step: impl Fn(f64, f64) -> f64) -> Vec<f64> {
    let mut result = nan_series(data.len());
    if period == 0 || data.len() < period {
        return result;
    }

    let mut value = data[..period].iter().sum::<f64>() / period as f64;
    result[period - 1] = value;

    for (out, &x) in result[period..].iter_mut().zip(&data[period..]) {
        value = step(value, x);
        *out = value;
    }

    result
}
