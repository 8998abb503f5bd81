//! Slope (average change per period) of a series.
//!
//! The point form skips NaNs and answers 0.0 when there is not enough data;
//! the series form works positionally and leaves NaN where it cannot look
//! back far enough. Callers rely on each behaviour as-is.

use crate::domain::indicator::nan_series;

/// (latest valid - valid value `periods` entries earlier) / periods.
///
/// Returns 0.0 on insufficient data.
pub fn slope(data: &[f64], periods: usize) -> f64 {
    if periods == 0 || data.len() <= periods {
        return 0.0;
    }

    let valid: Vec<f64> = data.iter().copied().filter(|v| !v.is_nan()).collect();
    if valid.len() <= periods {
        return 0.0;
    }

    let current = valid[valid.len() - 1];
    let previous = valid[valid.len() - 1 - periods];
    (current - previous) / periods as f64
}

/// Slope at every index: (x[i] - x[i-periods]) / periods. The first
/// `periods` values are NaN.
pub fn slope_series(data: &[f64], periods: usize) -> Vec<f64> {
    let mut result = nan_series(data.len());
    if periods == 0 || data.len() <= periods {
        return result;
    }

    for i in periods..data.len() {
        result[i] = (data[i] - data[i - periods]) / periods as f64;
    }
    result
}
