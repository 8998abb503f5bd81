#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use ruletrader::domain::error::RuleTraderError;
pub use ruletrader::domain::ohlcv::{BarTable, MarketData, OhlcvBar, PriceSource, Timeframe};
use ruletrader::domain::rule::{
    Action, Condition, ConditionKind, Indicator, IndicatorKind, Rule, RuleScope,
};
use ruletrader::domain::strategy::Strategy;
use ruletrader::ports::data_port::DataPort;
use std::collections::HashMap;

pub struct MockDataPort {
    pub data: HashMap<(String, Timeframe), BarTable>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_table(mut self, table: BarTable) -> Self {
        self.data
            .insert((table.symbol.clone(), table.timeframe), table);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(&self, symbol: &str, timeframe: Timeframe) -> Result<BarTable, RuleTraderError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(RuleTraderError::Data {
                reason: reason.clone(),
            });
        }
        self.data
            .get(&(symbol.to_string(), timeframe))
            .cloned()
            .ok_or_else(|| RuleTraderError::NoData {
                symbol: symbol.to_string(),
                timeframe: timeframe.to_string(),
            })
    }

    fn list_symbols(&self) -> Result<Vec<String>, RuleTraderError> {
        let mut symbols: Vec<String> = self.data.keys().map(|(s, _)| s.clone()).collect();
        symbols.sort();
        symbols.dedup();
        Ok(symbols)
    }
}

pub fn ts(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, min, 0)
        .unwrap()
}

/// 5-minute bars from 09:30 on 2024-01-02 with the given closes.
pub fn make_table(symbol: &str, closes: &[f64]) -> BarTable {
    make_table_on(symbol, Timeframe::M5, closes)
}

pub fn make_table_on(symbol: &str, timeframe: Timeframe, closes: &[f64]) -> BarTable {
    let start = ts(2024, 1, 2, 9, 30);
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            OhlcvBar::new(close - 1.0, close + 1.0, close - 2.0, close, 1000.0)
                .at(start + Duration::minutes(5 * i as i64))
        })
        .collect();
    BarTable::new(symbol, timeframe, bars)
}

/// `count` bars rising by 1.0 from `start_price`.
pub fn generate_table(symbol: &str, count: usize, start_price: f64) -> BarTable {
    let closes: Vec<f64> = (0..count).map(|i| start_price + i as f64).collect();
    make_table(symbol, &closes)
}

pub fn market(tables: Vec<BarTable>) -> MarketData {
    tables
        .into_iter()
        .map(|t| (t.symbol.clone(), t))
        .collect()
}

pub fn close() -> Indicator {
    Indicator::price(PriceSource::Close)
}

pub fn vix_below(id: &str, max: f64) -> Rule {
    Rule::new(
        id,
        format!("VIX below {max}"),
        RuleScope::Global,
        Action::Filter,
        Condition::new(ConditionKind::LessThan, Indicator::new(IndicatorKind::Vix))
            .with_threshold(max),
    )
}

pub fn market_hours(id: &str) -> Rule {
    Rule::new(
        id,
        "Market hours",
        RuleScope::Global,
        Action::Filter,
        Condition::time_range("09:30", "16:00"),
    )
}

pub fn close_above(id: &str, action: Action, threshold: f64) -> Rule {
    Rule::new(
        id,
        format!("close above {threshold}"),
        RuleScope::PerTicker,
        action,
        Condition::new(ConditionKind::GreaterThan, close()).with_threshold(threshold),
    )
}

pub fn close_below(id: &str, action: Action, threshold: f64) -> Rule {
    Rule::new(
        id,
        format!("close below {threshold}"),
        RuleScope::PerTicker,
        action,
        Condition::new(ConditionKind::LessThan, close()).with_threshold(threshold),
    )
}

pub fn ema_cross(id: &str, fast: usize, slow: usize) -> Rule {
    Rule::new(
        id,
        format!("EMA {fast} crosses above EMA {slow}"),
        RuleScope::PerTicker,
        Action::Buy,
        Condition::new(ConditionKind::CrossesAbove, Indicator::ema(fast))
            .against(Indicator::ema(slow)),
    )
}

pub fn sample_strategy() -> Strategy {
    Strategy::new("sample", "Sample")
        .with_tickers(["AAPL", "MSFT"])
        .with_rule(market_hours("hours"))
        .with_rule(vix_below("vix", 30.0))
        .with_rule(close_above("buy", Action::Buy, 150.0))
        .with_rule(close_below("sell", Action::Sell, 100.0))
}

pub const SAMPLE_STRATEGY_JSON: &str = r#"{
  "id": "sample",
  "name": "Sample",
  "tickers": ["AAPL", "MSFT"],
  "rules": [
    {
      "id": "vix",
      "name": "VIX below 30",
      "scope": "global",
      "action": "filter",
      "condition": {
        "type": "less_than",
        "indicator_a": {"type": "vix"},
        "threshold": 30.0
      }
    },
    {
      "id": "buy",
      "name": "close above 150",
      "scope": "per_ticker",
      "action": "buy",
      "condition": {
        "type": "greater_than",
        "indicator_a": {"type": "price", "source": "close"},
        "threshold": 150.0
      }
    },
    {
      "id": "sell",
      "name": "close below 100",
      "scope": "per_ticker",
      "action": "sell",
      "condition": {
        "type": "less_than",
        "indicator_a": {"type": "price"},
        "threshold": 100.0
      }
    }
  ]
}"#;
