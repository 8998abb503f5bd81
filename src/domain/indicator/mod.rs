//! Technical indicator math over plain `f64` slices.
//!
//! Every function is pure and returns a series the same length as its input.
//! `f64::NAN` marks a value that is unavailable (warm-up, shifted-in prefix,
//! zero range). SMA windows touching a NaN are NaN; EMA and SMMA carry a
//! NaN forward through every later value.

pub mod alligator;
pub mod bollinger;
pub mod crossover;
pub mod ema;
pub mod macd;
pub mod obv;
pub mod rsi;
pub mod slope;
pub mod sma;
pub mod stddev;
pub mod stochastic;

pub use alligator::{calculate_alligator, AlligatorLines, AlligatorParams};
pub use bollinger::{calculate_bollinger, shift_series, BollingerBands};
pub use crossover::{crosses_above, crosses_below};
pub use ema::{calculate_ema, calculate_smma};
pub use macd::{calculate_macd, MacdLines};
pub use obv::calculate_obv;
pub use rsi::calculate_rsi;
pub use slope::{slope, slope_series};
pub use sma::calculate_sma;
pub use stddev::rolling_stddev;
pub use stochastic::{calculate_stochastic, StochasticLines};

pub(crate) fn nan_series(len: usize) -> Vec<f64> {
    vec![f64::NAN; len]
}

/// Index of the first non-NaN value, or `data.len()` if there is none.
pub(crate) fn first_valid_index(data: &[f64]) -> usize {
    data.iter().position(|v| !v.is_nan()).unwrap_or(data.len())
}

/// Latest non-NaN value of a series.
pub fn last_valid(data: &[f64]) -> Option<f64> {
    data.iter().rev().copied().find(|v| !v.is_nan())
}
