//! Crossover detection on the latest bar.
//!
//! Each series contributes its last two valid (non-NaN) values, so gaps in
//! one series do not hide a cross. Fewer than two valid values in either
//! series means no cross.

/// A went from <= B to > B.
pub fn crosses_above(a: &[f64], b: &[f64]) -> bool {
    match (last_two_valid(a), last_two_valid(b)) {
        (Some((a_prev, a_curr)), Some((b_prev, b_curr))) => a_prev <= b_prev && a_curr > b_curr,
        _ => false,
    }
}

/// A went from >= B to < B.
pub fn crosses_below(a: &[f64], b: &[f64]) -> bool {
    match (last_two_valid(a), last_two_valid(b)) {
        (Some((a_prev, a_curr)), Some((b_prev, b_curr))) => a_prev >= b_prev && a_curr < b_curr,
        _ => false,
    }
}

/// (previous, current) valid values.
fn last_two_valid(data: &[f64]) -> Option<(f64, f64)> {
    let mut valid = data.iter().rev().copied().filter(|v| !v.is_nan());
    let current = valid.next()?;
    let previous = valid.next()?;
    Some((previous, current))
}
