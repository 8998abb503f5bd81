//! Strategy and engine configuration validation.
//!
//! Strategy checks collect every problem instead of stopping at the first,
//! so a strategy author sees the whole list at once. Warnings flag setups
//! that run but probably do not do what was meant.

use crate::domain::condition_eval::parse_hhmm;
use crate::domain::error::RuleTraderError;
use crate::domain::ohlcv::Timeframe;
use crate::domain::rule::{Action, Condition, ConditionKind, Indicator, Rule, RuleScope};
use crate::domain::strategy::Strategy;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDateTime;
use std::collections::HashSet;
use std::fmt;

pub const MAX_LENGTH: usize = 500;
pub const MAX_LOOKBACK: usize = 100;
pub const NOW_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub severity: Severity,
    /// Name of the offending rule, if the issue is rule-specific.
    pub rule: Option<String>,
    pub message: String,
}

impl ValidationIssue {
    fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            rule: None,
            message: message.into(),
        }
    }

    fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            rule: None,
            message: message.into(),
        }
    }

    fn in_rule(mut self, rule: &Rule) -> Self {
        self.rule = Some(rule.name.clone());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.severity == Severity::Warning {
            f.write_str("warning: ")?;
        }
        if let Some(rule) = &self.rule {
            write!(f, "[Rule: {rule}] ")?;
        }
        f.write_str(&self.message)
    }
}

pub fn validate_strategy(strategy: &Strategy) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if strategy.name.trim().is_empty() {
        issues.push(ValidationIssue::error("Strategy name is required"));
    }
    if strategy.id.trim().is_empty() {
        issues.push(ValidationIssue::error("Strategy ID is required"));
    }
    if strategy.rules.is_empty() {
        issues.push(ValidationIssue::error("Strategy must have at least one rule"));
        return issues;
    }

    let mut seen = HashSet::new();
    let mut duplicates: Vec<&str> = Vec::new();
    for rule in &strategy.rules {
        if !seen.insert(rule.id.as_str()) && !duplicates.contains(&rule.id.as_str()) {
            duplicates.push(&rule.id);
        }
    }
    if !duplicates.is_empty() {
        issues.push(ValidationIssue::error(format!(
            "Duplicate rule IDs found: {}",
            duplicates.join(", ")
        )));
    }

    for rule in &strategy.rules {
        issues.extend(validate_rule(rule));
    }
    issues.extend(check_consistency(strategy));
    issues.extend(validate_tickers(&strategy.tickers));
    issues
}

/// Errors only; warnings do not make a strategy invalid.
pub fn is_valid(strategy: &Strategy) -> bool {
    !validate_strategy(strategy).iter().any(ValidationIssue::is_error)
}

pub fn validate_strategy_or_err(strategy: &Strategy) -> Result<(), RuleTraderError> {
    let reasons: Vec<String> = validate_strategy(strategy)
        .into_iter()
        .filter(ValidationIssue::is_error)
        .map(|issue| issue.to_string())
        .collect();
    if reasons.is_empty() {
        Ok(())
    } else {
        Err(RuleTraderError::StrategyInvalid { reasons })
    }
}

fn validate_rule(rule: &Rule) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    if rule.name.trim().is_empty() {
        issues.push(ValidationIssue::error("Rule name is required"));
    }
    if rule.id.trim().is_empty() {
        issues.push(ValidationIssue::error("Rule ID is required"));
    }
    if rule.priority > 100 {
        issues.push(ValidationIssue::error("Priority must be between 0 and 100"));
    }
    if rule.scope == RuleScope::Global && rule.action != Action::Filter {
        issues.push(ValidationIssue::error(
            "Global rules should use FILTER action, not BUY/SELL",
        ));
    }
    issues.extend(validate_condition(&rule.condition));
    issues.into_iter().map(|issue| issue.in_rule(rule)).collect()
}

fn validate_condition(condition: &Condition) -> Vec<ValidationIssue> {
    let mut issues: Vec<ValidationIssue> = condition.indicators().flat_map(validate_indicator).collect();
    let kind = condition.kind;

    if kind.is_crossover() && condition.indicator_b.is_none() {
        issues.push(ValidationIssue::error("Crossover conditions require indicator_b"));
    }
    if kind.is_comparison() && condition.indicator_b.is_none() && condition.threshold.is_none() {
        issues.push(ValidationIssue::error(
            "Comparison conditions require either indicator_b or threshold",
        ));
    }
    if kind.is_slope() && condition.threshold.is_none() {
        issues.push(ValidationIssue::error("Slope conditions require a threshold"));
    }
    if kind == ConditionKind::WithinRange {
        match (&condition.range_start, &condition.range_end) {
            (Some(start), Some(end)) => {
                for (name, value) in [("range_start", start), ("range_end", end)] {
                    if parse_hhmm(value).is_none() {
                        issues.push(ValidationIssue::error(format!(
                            "Invalid {name} format: {value} (expected HH:MM)"
                        )));
                    }
                }
            }
            _ => issues.push(ValidationIssue::error(
                "Range conditions require range_start and range_end",
            )),
        }
    }
    if !(1..=MAX_LOOKBACK).contains(&condition.lookback_periods) {
        issues.push(ValidationIssue::error(format!(
            "Lookback periods must be between 1 and {MAX_LOOKBACK}"
        )));
    }
    issues
}

fn validate_indicator(indicator: &Indicator) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    match indicator.length {
        None if indicator.kind.requires_length() => issues.push(ValidationIssue::error(format!(
            "{} requires a length >= 1",
            indicator.kind
        ))),
        Some(0) => issues.push(ValidationIssue::error("Length must be >= 1")),
        Some(length) if length > MAX_LENGTH => issues.push(ValidationIssue::error(format!(
            "Length must be <= {MAX_LENGTH}"
        ))),
        _ => {}
    }
    issues
}

fn check_consistency(strategy: &Strategy) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if !strategy.filter_rules().is_empty() && strategy.signal_rules().is_empty() {
        issues.push(ValidationIssue::error(
            "Strategy has filter rules but no BUY/SELL rules",
        ));
    }
    if !strategy.rules.iter().any(|r| r.action == Action::Buy) {
        issues.push(ValidationIssue::warning("Strategy has no BUY rules"));
    }

    for rule in &strategy.rules {
        let condition = &rule.condition;
        if let (true, Some(b)) = (condition.kind.is_crossover(), &condition.indicator_b) {
            let (tf_a, tf_b) = (condition.indicator_a.timeframe, b.timeframe);
            if tf_a != tf_b {
                issues.push(
                    ValidationIssue::warning(format!(
                        "Crossover indicators have different timeframes ({tf_a} vs {tf_b})"
                    ))
                    .in_rule(rule),
                );
            }
        }
    }
    issues
}

fn validate_tickers(tickers: &[String]) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let mut seen = HashSet::new();

    for ticker in tickers {
        if ticker.trim().is_empty() {
            issues.push(ValidationIssue::error("Empty ticker symbol found"));
        } else if !is_ticker_symbol(ticker) {
            issues.push(ValidationIssue::error(format!("Invalid ticker format: {ticker}")));
        }
        if !seen.insert(ticker.to_uppercase()) {
            issues.push(ValidationIssue::error(format!("Duplicate ticker: {ticker}")));
        }
    }
    issues
}

/// 1-20 chars of letters, digits, '.' or '-'.
fn is_ticker_symbol(ticker: &str) -> bool {
    (1..=20).contains(&ticker.len())
        && ticker
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
}

/// Checks the `[data]` and `[engine]` sections.
pub fn validate_engine_config(config: &dyn ConfigPort) -> Result<(), RuleTraderError> {
    validate_data_dir(config)?;
    validate_timeframe(config)?;
    validate_now(config)?;
    Ok(())
}

fn validate_data_dir(config: &dyn ConfigPort) -> Result<(), RuleTraderError> {
    match config.get_string("data", "dir") {
        Some(s) if !s.trim().is_empty() => Ok(()),
        _ => Err(RuleTraderError::ConfigMissing {
            section: "data".to_string(),
            key: "dir".to_string(),
        }),
    }
}

fn validate_timeframe(config: &dyn ConfigPort) -> Result<(), RuleTraderError> {
    match config.get_string("engine", "timeframe") {
        None => Ok(()),
        Some(s) => s
            .parse::<Timeframe>()
            .map(|_| ())
            .map_err(|reason| RuleTraderError::ConfigInvalid {
                section: "engine".to_string(),
                key: "timeframe".to_string(),
                reason,
            }),
    }
}

fn validate_now(config: &dyn ConfigPort) -> Result<(), RuleTraderError> {
    match config.get_string("engine", "now") {
        None => Ok(()),
        Some(s) => NaiveDateTime::parse_from_str(s.trim(), NOW_FORMAT)
            .map(|_| ())
            .map_err(|_| RuleTraderError::ConfigInvalid {
                section: "engine".to_string(),
                key: "now".to_string(),
                reason: "invalid now format, expected YYYY-MM-DDTHH:MM:SS".to_string(),
            }),
    }
}
