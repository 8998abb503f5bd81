//! Rule model: indicators, conditions and rules.
//!
//! Every enumerated field is a closed enum fixed when the model is built
//! (or deserialised), so evaluation never inspects raw tag strings.
//! - `Indicator`: what to compute, over which bars
//! - `Condition`: a typed predicate over one or two indicators
//! - `Rule`: a condition plus scope and action

use crate::domain::ohlcv::{PriceSource, Timeframe};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorKind {
    Ema,
    Sma,
    Price,
    Vix,
    Time,
    Volume,
    Rsi,
    Macd,
    Bollinger,
    Stochastic,
    Obv,
    Alligator,
    DividendYield,
    PeRatio,
    RelativePerformance,
}

impl IndicatorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndicatorKind::Ema => "ema",
            IndicatorKind::Sma => "sma",
            IndicatorKind::Price => "price",
            IndicatorKind::Vix => "vix",
            IndicatorKind::Time => "time",
            IndicatorKind::Volume => "volume",
            IndicatorKind::Rsi => "rsi",
            IndicatorKind::Macd => "macd",
            IndicatorKind::Bollinger => "bollinger",
            IndicatorKind::Stochastic => "stochastic",
            IndicatorKind::Obv => "obv",
            IndicatorKind::Alligator => "alligator",
            IndicatorKind::DividendYield => "dividend_yield",
            IndicatorKind::PeRatio => "pe_ratio",
            IndicatorKind::RelativePerformance => "relative_performance",
        }
    }

    /// Windowed kinds that cannot be built without a length.
    pub fn requires_length(&self) -> bool {
        matches!(
            self,
            IndicatorKind::Ema | IndicatorKind::Sma | IndicatorKind::Rsi
        )
    }
}

impl fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_uppercase())
    }
}

/// Extra indicator knob: numbers, or strings that may hold numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Number(f64),
    Text(String),
}

impl ParamValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Number(v) => Some(*v),
            ParamValue::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Number(v) => write!(f, "{v}"),
            ParamValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Number(v)
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Text(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Indicator {
    #[serde(rename = "type")]
    pub kind: IndicatorKind,
    #[serde(default)]
    pub length: Option<usize>,
    #[serde(default)]
    pub timeframe: Timeframe,
    #[serde(default)]
    pub source: PriceSource,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub params: BTreeMap<String, ParamValue>,
    #[serde(default)]
    pub component: Option<String>,
}

impl Indicator {
    pub fn new(kind: IndicatorKind) -> Self {
        Self {
            kind,
            length: None,
            timeframe: Timeframe::default(),
            source: PriceSource::default(),
            symbol: None,
            params: BTreeMap::new(),
            component: None,
        }
    }

    pub fn ema(length: usize) -> Self {
        Self::new(IndicatorKind::Ema).with_length(length)
    }

    pub fn sma(length: usize) -> Self {
        Self::new(IndicatorKind::Sma).with_length(length)
    }

    pub fn price(source: PriceSource) -> Self {
        Self::new(IndicatorKind::Price).with_source(source)
    }

    pub fn with_length(mut self, length: usize) -> Self {
        self.length = Some(length);
        self
    }

    pub fn with_timeframe(mut self, timeframe: Timeframe) -> Self {
        self.timeframe = timeframe;
        self
    }

    pub fn with_source(mut self, source: PriceSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    pub fn param_f64(&self, name: &str, default: f64) -> f64 {
        self.params
            .get(name)
            .and_then(ParamValue::as_f64)
            .unwrap_or(default)
    }

    /// Integer knob; fractional values truncate toward zero.
    pub fn param_i64(&self, name: &str, default: i64) -> i64 {
        self.params
            .get(name)
            .and_then(ParamValue::as_f64)
            .map(|v| v as i64)
            .unwrap_or(default)
    }

    /// Non-negative integer knob; negatives clamp to zero.
    pub fn param_usize(&self, name: &str, default: usize) -> usize {
        self.param_i64(name, default as i64).max(0) as usize
    }

    pub fn display(&self) -> String {
        let mut base = match self.kind {
            IndicatorKind::Price => format!("Price({})", self.source),
            IndicatorKind::Vix => format!("VIX({})", self.timeframe),
            IndicatorKind::Time => "Market Hours".to_string(),
            _ => {
                let args = match (self.kind, self.length) {
                    (_, Some(length)) => Some(length.to_string()),
                    (IndicatorKind::Macd, None) if !self.params.is_empty() => Some(format!(
                        "{},{},{}",
                        self.param_usize("fast_period", 12),
                        self.param_usize("slow_period", 26),
                        self.param_usize("signal_period", 9)
                    )),
                    (IndicatorKind::Stochastic, None) if !self.params.is_empty() => {
                        Some(format!(
                            "{},{},{}",
                            self.param_usize("k_period", 14),
                            self.param_usize("d_period", 3),
                            self.param_usize("smooth_k", 3)
                        ))
                    }
                    (IndicatorKind::Bollinger, None) if !self.params.is_empty() => {
                        Some(self.param_usize("period", 20).to_string())
                    }
                    _ => None,
                };
                match args {
                    Some(args) => format!("{}({}, {})", self.kind, args, self.timeframe),
                    None => format!("{}({})", self.kind, self.timeframe),
                }
            }
        };
        if let Some(component) = &self.component {
            base.push_str(&format!("[{component}]"));
        }
        base
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionKind {
    CrossesAbove,
    CrossesBelow,
    GreaterThan,
    LessThan,
    SlopeAbove,
    SlopeBelow,
    WithinRange,
    Equals,
}

impl ConditionKind {
    pub fn is_crossover(&self) -> bool {
        matches!(self, ConditionKind::CrossesAbove | ConditionKind::CrossesBelow)
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            ConditionKind::GreaterThan | ConditionKind::LessThan | ConditionKind::Equals
        )
    }

    pub fn is_slope(&self) -> bool {
        matches!(self, ConditionKind::SlopeAbove | ConditionKind::SlopeBelow)
    }
}

fn default_lookback() -> usize {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "type")]
    pub kind: ConditionKind,
    pub indicator_a: Indicator,
    #[serde(default)]
    pub indicator_b: Option<Indicator>,
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default = "default_lookback")]
    pub lookback_periods: usize,
    #[serde(default)]
    pub range_start: Option<String>,
    #[serde(default)]
    pub range_end: Option<String>,
}

impl Condition {
    pub fn new(kind: ConditionKind, indicator_a: Indicator) -> Self {
        Self {
            kind,
            indicator_a,
            indicator_b: None,
            threshold: None,
            lookback_periods: default_lookback(),
            range_start: None,
            range_end: None,
        }
    }

    pub fn against(mut self, indicator_b: Indicator) -> Self {
        self.indicator_b = Some(indicator_b);
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn with_lookback(mut self, periods: usize) -> Self {
        self.lookback_periods = periods;
        self
    }

    /// WITHIN_RANGE over "HH:MM" bounds; the range indicator is TIME.
    pub fn time_range(start: &str, end: &str) -> Self {
        let mut condition = Self::new(
            ConditionKind::WithinRange,
            Indicator::new(IndicatorKind::Time),
        );
        condition.range_start = Some(start.to_string());
        condition.range_end = Some(end.to_string());
        condition
    }

    pub fn indicators(&self) -> impl Iterator<Item = &Indicator> {
        std::iter::once(&self.indicator_a).chain(self.indicator_b.as_ref())
    }

    pub fn display(&self) -> String {
        let a = self.indicator_a.display();
        let b = self
            .indicator_b
            .as_ref()
            .map(Indicator::display)
            .unwrap_or_else(|| "?".to_string());
        let rhs = match (&self.indicator_b, self.threshold) {
            (Some(ind), _) => ind.display(),
            (None, Some(t)) => t.to_string(),
            (None, None) => "?".to_string(),
        };
        let threshold = self
            .threshold
            .map(|t| t.to_string())
            .unwrap_or_else(|| "?".to_string());
        let bound = |b: &Option<String>| b.clone().unwrap_or_else(|| "?".to_string());

        match self.kind {
            ConditionKind::CrossesAbove => format!("{a} crosses above {b}"),
            ConditionKind::CrossesBelow => format!("{a} crosses below {b}"),
            ConditionKind::GreaterThan => format!("{a} > {rhs}"),
            ConditionKind::LessThan => format!("{a} < {rhs}"),
            ConditionKind::Equals => format!("{a} == {rhs}"),
            ConditionKind::SlopeAbove => format!(
                "Slope of {a} > {threshold} (last {} periods)",
                self.lookback_periods
            ),
            ConditionKind::SlopeBelow => format!(
                "Slope of {a} < {threshold} (last {} periods)",
                self.lookback_periods
            ),
            ConditionKind::WithinRange => format!(
                "Time within {} - {}",
                bound(&self.range_start),
                bound(&self.range_end)
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleScope {
    Global,
    PerTicker,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Buy,
    Sell,
    Filter,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::Buy => "BUY",
            Action::Sell => "SELL",
            Action::Filter => "FILTER",
        })
    }
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Key for cached results; must be unique within a strategy.
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub scope: RuleScope,
    pub condition: Condition,
    pub action: Action,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Higher runs first within its scope.
    #[serde(default)]
    pub priority: u8,
}

impl Rule {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        scope: RuleScope,
        action: Action,
        condition: Condition,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            scope,
            condition,
            action,
            enabled: true,
            priority: 0,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Timeframe of the primary indicator.
    pub fn timeframe(&self) -> Timeframe {
        self.condition.indicator_a.timeframe
    }

    pub fn uses_vix(&self) -> bool {
        self.condition
            .indicators()
            .any(|ind| ind.kind == IndicatorKind::Vix)
    }

    pub fn display(&self) -> String {
        let enabled = if self.enabled { "✓" } else { "✗" };
        let scope = match self.scope {
            RuleScope::Global => "Global",
            RuleScope::PerTicker => "Per-Ticker",
        };
        format!(
            "[{enabled}] {scope}: {} → {}",
            self.condition.display(),
            self.action
        )
    }
}
