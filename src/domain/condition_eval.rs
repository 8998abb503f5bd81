//! Point-in-time condition evaluation.
//!
//! # Evaluation Semantics
//!
//! - `CROSSES_ABOVE`/`CROSSES_BELOW`: last two valid values of each side;
//!   `false` without `indicator_b`
//! - `GREATER_THAN`/`LESS_THAN`/`EQUALS`: latest valid value of A against the
//!   latest valid value of B, else the threshold
//! - `SLOPE_ABOVE`/`SLOPE_BELOW`: point slope over `lookback_periods`
//! - `WITHIN_RANGE`: time of day of `now`, wrapping past midnight when
//!   start > end
//!
//! Missing data resolves to `false`. Only indicator construction errors
//! (missing length, missing VIX table, untimed bars) surface as `Err`.

use crate::domain::error::RuleTraderError;
use crate::domain::indicator::{crosses_above, crosses_below, last_valid, slope};
use crate::domain::ohlcv::{BarTable, MarketData};
use crate::domain::rule::{Condition, ConditionKind, Indicator};
use crate::domain::series::create_indicator_series;
use chrono::{NaiveDateTime, NaiveTime};

pub(crate) const EQUALS_TOLERANCE: f64 = 1e-6;

pub fn evaluate(
    condition: &Condition,
    bars: &BarTable,
    vix_bars: Option<&BarTable>,
    now: Option<NaiveDateTime>,
    market_data: Option<&MarketData>,
) -> Result<bool, RuleTraderError> {
    let series = |indicator: &Indicator| {
        create_indicator_series(indicator, bars, vix_bars, market_data)
    };

    match condition.kind {
        ConditionKind::CrossesAbove | ConditionKind::CrossesBelow => {
            let Some(indicator_b) = &condition.indicator_b else {
                return Ok(false);
            };
            let a = series(&condition.indicator_a)?;
            let b = series(indicator_b)?;
            Ok(match condition.kind {
                ConditionKind::CrossesAbove => crosses_above(&a, &b),
                _ => crosses_below(&a, &b),
            })
        }
        ConditionKind::GreaterThan | ConditionKind::LessThan | ConditionKind::Equals => {
            let Some(latest_a) = last_valid(&series(&condition.indicator_a)?) else {
                return Ok(false);
            };
            let rhs = match &condition.indicator_b {
                Some(indicator_b) => last_valid(&series(indicator_b)?),
                None => condition.threshold,
            };
            let Some(rhs) = rhs else {
                return Ok(false);
            };
            Ok(compare(condition.kind, latest_a, rhs))
        }
        ConditionKind::SlopeAbove | ConditionKind::SlopeBelow => {
            let Some(threshold) = condition.threshold else {
                return Ok(false);
            };
            let value = slope(&series(&condition.indicator_a)?, condition.lookback_periods);
            Ok(match condition.kind {
                ConditionKind::SlopeAbove => value > threshold,
                _ => value < threshold,
            })
        }
        ConditionKind::WithinRange => {
            let now = now.unwrap_or_else(|| chrono::Local::now().naive_local());
            Ok(within_range(condition, now.time()))
        }
    }
}

/// Elementwise comparison shared with the history evaluator. NaN on either
/// side is never true.
pub(crate) fn compare(kind: ConditionKind, a: f64, b: f64) -> bool {
    match kind {
        ConditionKind::GreaterThan => a > b,
        ConditionKind::LessThan => a < b,
        ConditionKind::Equals => (a - b).abs() < EQUALS_TOLERANCE,
        _ => false,
    }
}

/// `false` when either bound is absent or malformed.
pub(crate) fn within_range(condition: &Condition, time: NaiveTime) -> bool {
    let bounds = condition
        .range_start
        .as_deref()
        .and_then(parse_hhmm)
        .zip(condition.range_end.as_deref().and_then(parse_hhmm));

    match bounds {
        Some((start, end)) if start <= end => start <= time && time <= end,
        Some((start, end)) => time >= start || time <= end,
        None => false,
    }
}

/// "HH:MM"; anything after the minutes field is ignored.
pub(crate) fn parse_hhmm(s: &str) -> Option<NaiveTime> {
    let mut parts = s.split(':');
    let hour: u32 = parts.next()?.trim().parse().ok()?;
    let minute: u32 = parts.next()?.trim().parse().ok()?;
    NaiveTime::from_hms_opt(hour, minute, 0)
}
