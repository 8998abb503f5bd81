//! OBV (On-Balance Volume) indicator.

/// Calculate OBV (On-Balance Volume).
///
/// OBV[i] = sum over j <= i of sign(close[j] - close[j-1]) * volume[j],
/// where bar 0 is compared against itself and so contributes nothing.
///
/// No warmup period; every value is defined.
pub fn calculate_obv(close: &[f64], volume: &[f64]) -> Vec<f64> {
    let mut values = Vec::with_capacity(close.len());
    let mut obv = 0.0;
    let mut prev_close = close.first().copied().unwrap_or_default();

    for (&c, &v) in close.iter().zip(volume) {
        if c > prev_close {
            obv += v;
        } else if c < prev_close {
            obv -= v;
        }
        prev_close = c;
        values.push(obv);
    }

    values
}
