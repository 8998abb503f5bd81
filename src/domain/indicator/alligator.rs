//! Williams Alligator.
//!
//! Three SMMAs of the median price (high + low) / 2, each moved forward by its
//! own shift so the value at bar t is SMMA[t - shift]. The shifted-in prefix
//! is NaN.

use crate::domain::indicator::{calculate_smma, shift_series};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlligatorParams {
    pub jaw_period: usize,
    pub teeth_period: usize,
    pub lips_period: usize,
    pub jaw_shift: usize,
    pub teeth_shift: usize,
    pub lips_shift: usize,
}

impl Default for AlligatorParams {
    fn default() -> Self {
        Self {
            jaw_period: 13,
            teeth_period: 8,
            lips_period: 5,
            jaw_shift: 8,
            teeth_shift: 5,
            lips_shift: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlligatorLines {
    pub jaw: Vec<f64>,
    pub teeth: Vec<f64>,
    pub lips: Vec<f64>,
}

pub fn calculate_alligator(high: &[f64], low: &[f64], params: &AlligatorParams) -> AlligatorLines {
    let median: Vec<f64> = high.iter().zip(low).map(|(h, l)| (h + l) / 2.0).collect();

    let line = |period: usize, shift: usize| {
        shift_series(
            &calculate_smma(&median, period),
            i64::try_from(shift).unwrap_or(i64::MAX),
        )
    };

    AlligatorLines {
        jaw: line(params.jaw_period, params.jaw_shift),
        teeth: line(params.teeth_period, params.teeth_shift),
        lips: line(params.lips_period, params.lips_shift),
    }
}
