//! Stochastic Oscillator.
//!
//! raw %K = 100 × (close - lowest low) / (highest high - lowest low) over the
//! trailing k window; NaN when the range is zero.
//! %K = SMA(raw %K, smooth_k), or raw %K when smooth_k <= 1.
//! %D = SMA(%K, d).
//!
//! Default parameters: k=14, d=3, smooth_k=3

use crate::domain::indicator::{calculate_sma, nan_series};

pub const DEFAULT_K_PERIOD: usize = 14;
pub const DEFAULT_D_PERIOD: usize = 3;
pub const DEFAULT_SMOOTH_K: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct StochasticLines {
    pub k: Vec<f64>,
    pub d: Vec<f64>,
}

pub fn calculate_stochastic(
    high: &[f64],
    low: &[f64],
    close: &[f64],
    k_period: usize,
    d_period: usize,
    smooth_k: usize,
) -> StochasticLines {
    let len = close.len().min(high.len()).min(low.len());
    let mut raw_k = nan_series(close.len());

    if k_period > 0 && len >= k_period {
        for i in (k_period - 1)..len {
            let start = i + 1 - k_period;
            let highest = window_extreme(&high[start..=i], f64::max);
            let lowest = window_extreme(&low[start..=i], f64::min);
            if let (Some(hh), Some(ll)) = (highest, lowest) {
                let range = hh - ll;
                if range != 0.0 {
                    raw_k[i] = 100.0 * (close[i] - ll) / range;
                }
            }
        }
    }

    let k = if smooth_k > 1 {
        calculate_sma(&raw_k, smooth_k)
    } else {
        raw_k
    };
    let d = calculate_sma(&k, d_period);

    StochasticLines { k, d }
}

/// Fold a window with `pick`; `None` if any value is NaN.
fn window_extreme(window: &[f64], pick: fn(f64, f64) -> f64) -> Option<f64> {
    if window.iter().any(|v| v.is_nan()) {
        return None;
    }
    window.iter().copied().reduce(pick)
}
