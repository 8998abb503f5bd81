//! Bollinger Bands indicator.
//!
//! Bollinger Bands consist of:
//! - Middle: Simple Moving Average (SMA) over n periods
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//!
//! Where StdDev is population standard deviation (divides by N, not N-1).
//!
//! Default parameters: period=20, multiplier=2.0

use crate::domain::indicator::{calculate_sma, nan_series, rolling_stddev};

pub const DEFAULT_PERIOD: usize = 20;
pub const DEFAULT_MULTIPLIER: f64 = 2.0;

#[derive(Debug, Clone, PartialEq)]
pub struct BollingerBands {
    pub upper: Vec<f64>,
    pub middle: Vec<f64>,
    pub lower: Vec<f64>,
}

impl BollingerBands {
    /// Shift all three bands by `offset` bars (positive = forward in time).
    pub fn shifted(self, offset: i64) -> Self {
        if offset == 0 {
            return self;
        }
        Self {
            upper: shift_series(&self.upper, offset),
            middle: shift_series(&self.middle, offset),
            lower: shift_series(&self.lower, offset),
        }
    }
}

pub fn calculate_bollinger(data: &[f64], period: usize, multiplier: f64) -> BollingerBands {
    let middle = calculate_sma(data, period);
    let stddev = rolling_stddev(data, period);

    let upper = middle
        .iter()
        .zip(&stddev)
        .map(|(m, s)| m + multiplier * s)
        .collect();
    let lower = middle
        .iter()
        .zip(&stddev)
        .map(|(m, s)| m - multiplier * s)
        .collect();

    BollingerBands {
        upper,
        middle,
        lower,
    }
}

/// Move values `offset` positions later (or earlier when negative); vacated
/// slots are NaN. Nothing wraps around.
pub fn shift_series(data: &[f64], offset: i64) -> Vec<f64> {
    let len = data.len();
    let mut result = nan_series(len);
    let distance = offset.unsigned_abs() as usize;
    if distance >= len {
        return result;
    }

    if offset >= 0 {
        result[distance..].copy_from_slice(&data[..len - distance]);
    } else {
        result[..len - distance].copy_from_slice(&data[distance..]);
    }
    result
}
