//! Per-bar condition history, for charting when a rule held.
//!
//! Every result is aligned to the input bars. Crossovers compare each bar
//! with the one before it (index 0 is always `false`); comparisons and
//! slopes work elementwise with NaN never true.

use crate::domain::condition_eval::{compare, within_range};
use crate::domain::error::RuleTraderError;
use crate::domain::indicator::slope_series;
use crate::domain::ohlcv::BarTable;
use crate::domain::rule::{Condition, ConditionKind, Indicator, Rule};
use crate::domain::series::create_indicator_series;
use chrono::NaiveDateTime;
use serde::Serialize;

/// When a rule last held over a bar table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LastTrueInfo {
    pub last_true_index: Option<usize>,
    pub last_true_timestamp: Option<NaiveDateTime>,
    /// 0 means the final bar.
    pub bars_ago: Option<usize>,
    pub total_true_count: usize,
}

pub fn evaluate_condition_history(
    condition: &Condition,
    bars: &BarTable,
    vix_bars: Option<&BarTable>,
) -> Result<Vec<bool>, RuleTraderError> {
    let len = bars.len();
    let series = |indicator: &Indicator| create_indicator_series(indicator, bars, vix_bars, None);

    let history = match condition.kind {
        ConditionKind::CrossesAbove | ConditionKind::CrossesBelow => {
            let Some(indicator_b) = &condition.indicator_b else {
                return Ok(vec![false; len]);
            };
            let a = series(&condition.indicator_a)?;
            let b = series(indicator_b)?;
            let above = condition.kind == ConditionKind::CrossesAbove;

            let mut result = vec![false; len];
            for i in 1..len {
                let window = [a[i - 1], b[i - 1], a[i], b[i]];
                if window.iter().any(|v| v.is_nan()) {
                    continue;
                }
                result[i] = if above {
                    a[i - 1] <= b[i - 1] && a[i] > b[i]
                } else {
                    a[i - 1] >= b[i - 1] && a[i] < b[i]
                };
            }
            result
        }
        ConditionKind::GreaterThan | ConditionKind::LessThan | ConditionKind::Equals => {
            let a = series(&condition.indicator_a)?;
            match (&condition.indicator_b, condition.threshold) {
                (Some(indicator_b), _) => {
                    let b = series(indicator_b)?;
                    a.iter()
                        .zip(&b)
                        .map(|(&x, &y)| compare(condition.kind, x, y))
                        .collect()
                }
                (None, Some(threshold)) => a
                    .iter()
                    .map(|&x| compare(condition.kind, x, threshold))
                    .collect(),
                (None, None) => vec![false; len],
            }
        }
        ConditionKind::SlopeAbove | ConditionKind::SlopeBelow => {
            let Some(threshold) = condition.threshold else {
                return Ok(vec![false; len]);
            };
            let slopes = slope_series(&series(&condition.indicator_a)?, condition.lookback_periods);
            slopes
                .iter()
                .map(|&s| match condition.kind {
                    ConditionKind::SlopeAbove => s > threshold,
                    _ => s < threshold,
                })
                .collect()
        }
        ConditionKind::WithinRange => match bars.timestamps() {
            Some(timestamps) => timestamps
                .iter()
                .map(|ts| within_range(condition, ts.time()))
                .collect(),
            None => vec![false; len],
        },
    };

    Ok(history)
}

/// Empty for absent or empty bars.
pub fn evaluate_rule_history(
    rule: &Rule,
    bars: Option<&BarTable>,
    vix_bars: Option<&BarTable>,
) -> Result<Vec<bool>, RuleTraderError> {
    match bars {
        Some(bars) if !bars.is_empty() => {
            evaluate_condition_history(&rule.condition, bars, vix_bars)
        }
        _ => Ok(Vec::new()),
    }
}

pub fn last_true_info(
    rule: &Rule,
    bars: Option<&BarTable>,
    vix_bars: Option<&BarTable>,
) -> Result<LastTrueInfo, RuleTraderError> {
    let history = evaluate_rule_history(rule, bars, vix_bars)?;
    let last_true_index = history.iter().rposition(|&held| held);

    Ok(LastTrueInfo {
        last_true_index,
        last_true_timestamp: last_true_index
            .and_then(|i| bars.and_then(|b| b.timestamp_at(i))),
        bars_ago: last_true_index.map(|i| history.len() - 1 - i),
        total_true_count: history.iter().filter(|&&held| held).count(),
    })
}
