//! Rule engine: runs a strategy's rules against one market-data snapshot.
//!
//! # Evaluation Flow
//!
//! 1. GLOBAL rules run first, highest priority first. A false FILTER or any
//!    evaluation error blocks the whole cycle (fail-closed).
//! 2. PER_TICKER rules run for every strategy ticker with data. True BUY and
//!    SELL rules append their action; a false FILTER discards everything
//!    collected for that ticker. Errors skip only the failing rule
//!    (fail-soft).
//!
//! One engine instance owns its result cache; share it across threads only
//! behind external synchronisation.

use crate::domain::condition_eval;
use crate::domain::ohlcv::{BarTable, MarketData, Timeframe};
use crate::domain::rule::{Action, IndicatorKind, Rule};
use crate::domain::strategy::Strategy;
use chrono::NaiveDateTime;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, error, info, warn};

/// Market-data key under which VIX bars are looked up and subscribed.
pub const VIX_SYMBOL: &str = "VIX";

/// Ticker -> ordered actions for one cycle. Tickers with no actions are absent.
pub type Signals = BTreeMap<String, Vec<Action>>;

#[derive(Debug)]
pub struct RuleEngine {
    strategy: Strategy,
    global_rules: Vec<Rule>,
    ticker_rules: Vec<Rule>,
    results: HashMap<String, bool>,
    last_evaluation: Option<NaiveDateTime>,
}

impl RuleEngine {
    pub fn new(strategy: Strategy) -> Self {
        Self {
            global_rules: strategy.global_rules(),
            ticker_rules: strategy.ticker_rules(),
            strategy,
            results: HashMap::new(),
            last_evaluation: None,
        }
    }

    /// Swap in a new strategy and clear cached results. Call between cycles.
    pub fn reload(&mut self, strategy: Strategy) {
        info!(
            strategy = %strategy.name,
            rules = strategy.rules.len(),
            "Strategy reloaded"
        );
        *self = Self::new(strategy);
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    /// `true` only if every enabled GLOBAL rule evaluated without error and
    /// no FILTER among them came out false.
    pub fn evaluate_global_rules(
        &mut self,
        market_data: &MarketData,
        vix_bars: Option<&BarTable>,
        now: Option<NaiveDateTime>,
    ) -> bool {
        let now = now.unwrap_or_else(|| chrono::Local::now().naive_local());
        self.last_evaluation = Some(now);

        let empty = BarTable::new("", Timeframe::default(), Vec::new());
        for rule in &self.global_rules {
            let bars = bars_for_global_rule(rule, market_data, vix_bars, &empty);
            match condition_eval::evaluate(
                &rule.condition,
                bars,
                vix_bars,
                Some(now),
                Some(market_data),
            ) {
                Ok(result) => {
                    self.results.insert(rule.id.clone(), result);
                    if rule.action == Action::Filter && !result {
                        debug!(rule = %rule.name, "Global filter failed");
                        return false;
                    }
                    debug!(rule = %rule.name, result, "Global rule evaluated");
                }
                Err(e) => {
                    error!(rule = %rule.name, error = %e, "Error evaluating global rule");
                    self.results.insert(rule.id.clone(), false);
                    return false;
                }
            }
        }
        true
    }

    /// Ordered actions fired for `ticker`. A false FILTER empties the list.
    pub fn evaluate_ticker_rules(
        &mut self,
        ticker: &str,
        bars: &BarTable,
        vix_bars: Option<&BarTable>,
        now: Option<NaiveDateTime>,
        market_data: Option<&MarketData>,
    ) -> Vec<Action> {
        let now = now.unwrap_or_else(|| chrono::Local::now().naive_local());
        let mut actions = Vec::new();

        for rule in &self.ticker_rules {
            let result =
                match condition_eval::evaluate(&rule.condition, bars, vix_bars, Some(now), market_data)
                {
                    Ok(result) => result,
                    Err(e) => {
                        error!(
                            rule = %rule.name,
                            ticker,
                            error = %e,
                            "Error evaluating ticker rule"
                        );
                        self.results.insert(rule.id.clone(), false);
                        continue;
                    }
                };
            self.results.insert(rule.id.clone(), result);

            match (rule.action, result) {
                (Action::Buy | Action::Sell, true) => {
                    info!(rule = %rule.name, ticker, action = %rule.action, "Rule triggered");
                    actions.push(rule.action);
                }
                (Action::Filter, false) => {
                    debug!(rule = %rule.name, ticker, "Ticker filter failed");
                    return Vec::new();
                }
                _ => debug!(rule = %rule.name, ticker, result, "Ticker rule evaluated"),
            }
        }
        actions
    }

    /// Full cycle: global gate, then every strategy ticker present in
    /// `market_data`.
    pub fn evaluate_all(
        &mut self,
        market_data: &MarketData,
        vix_bars: Option<&BarTable>,
        now: Option<NaiveDateTime>,
    ) -> Signals {
        let now = now.unwrap_or_else(|| chrono::Local::now().naive_local());

        if !self.evaluate_global_rules(market_data, vix_bars, Some(now)) {
            debug!("Global rules failed, no signals generated");
            return Signals::new();
        }

        let tickers = self.strategy.tickers.clone();
        let mut signals = Signals::new();
        for ticker in &tickers {
            let Some(bars) = market_data.get(ticker) else {
                warn!(ticker = %ticker, "No data available for ticker");
                continue;
            };
            let actions =
                self.evaluate_ticker_rules(ticker, bars, vix_bars, Some(now), Some(market_data));
            if !actions.is_empty() {
                signals.insert(ticker.clone(), actions);
            }
        }
        signals
    }

    /// (symbol, timeframe) pairs the strategy needs fed.
    ///
    /// Every ticker at every PER_TICKER rule's timeframe, VIX at the
    /// timeframe of each rule that reads it, and every explicit symbol
    /// override at its indicator's timeframe.
    pub fn required_data_subscriptions(&self) -> BTreeSet<(String, Timeframe)> {
        let mut subscriptions = BTreeSet::new();

        for ticker in &self.strategy.tickers {
            for rule in &self.ticker_rules {
                subscriptions.insert((ticker.clone(), rule.timeframe()));
            }
        }

        for rule in &self.strategy.rules {
            if rule.uses_vix() {
                subscriptions.insert((VIX_SYMBOL.to_string(), rule.timeframe()));
            }
            for indicator in rule.condition.indicators() {
                if let Some(symbol) = &indicator.symbol {
                    subscriptions.insert((symbol.clone(), indicator.timeframe));
                }
            }
        }

        subscriptions
    }

    /// Last cycle's result for `rule_id`, if it ran.
    pub fn rule_result(&self, rule_id: &str) -> Option<bool> {
        self.results.get(rule_id).copied()
    }

    pub fn all_rule_results(&self) -> &HashMap<String, bool> {
        &self.results
    }

    pub fn last_evaluation(&self) -> Option<NaiveDateTime> {
        self.last_evaluation
    }
}

/// Primary table for a GLOBAL rule: the indicator's explicit symbol, then
/// the VIX table for VIX rules, then the first table in `market_data`.
fn bars_for_global_rule<'a>(
    rule: &Rule,
    market_data: &'a MarketData,
    vix_bars: Option<&'a BarTable>,
    empty: &'a BarTable,
) -> &'a BarTable {
    let indicator = &rule.condition.indicator_a;

    if let Some(bars) = indicator.symbol.as_ref().and_then(|s| market_data.get(s)) {
        return bars;
    }
    if indicator.kind == IndicatorKind::Vix {
        if let Some(bars) = market_data.get(VIX_SYMBOL).or(vix_bars) {
            return bars;
        }
    }
    market_data.values().next().unwrap_or(empty)
}
