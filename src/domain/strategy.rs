//! Strategy: ordered tickers plus ordered rules.

use crate::domain::rule::{Action, Rule, RuleScope};
use serde::{Deserialize, Serialize};

fn default_version() -> String {
    "1.0.0".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tickers: Vec<String>,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl Strategy {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: default_version(),
            description: None,
            tickers: Vec::new(),
            rules: Vec::new(),
        }
    }

    pub fn with_tickers<I, S>(mut self, tickers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tickers = tickers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Enabled GLOBAL rules, highest priority first; ties keep file order.
    pub fn global_rules(&self) -> Vec<Rule> {
        self.enabled_in_scope(RuleScope::Global)
    }

    /// Enabled PER_TICKER rules, highest priority first; ties keep file order.
    pub fn ticker_rules(&self) -> Vec<Rule> {
        self.enabled_in_scope(RuleScope::PerTicker)
    }

    pub fn filter_rules(&self) -> Vec<&Rule> {
        self.rules
            .iter()
            .filter(|r| r.enabled && r.action == Action::Filter)
            .collect()
    }

    pub fn signal_rules(&self) -> Vec<&Rule> {
        self.rules
            .iter()
            .filter(|r| r.enabled && matches!(r.action, Action::Buy | Action::Sell))
            .collect()
    }

    pub fn add_rule(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    /// Returns whether a rule with `rule_id` was removed.
    pub fn remove_rule(&mut self, rule_id: &str) -> bool {
        let before = self.rules.len();
        self.rules.retain(|r| r.id != rule_id);
        self.rules.len() < before
    }

    pub fn enable_rule(&mut self, rule_id: &str) -> bool {
        self.set_enabled(rule_id, true)
    }

    pub fn disable_rule(&mut self, rule_id: &str) -> bool {
        self.set_enabled(rule_id, false)
    }

    fn set_enabled(&mut self, rule_id: &str, enabled: bool) -> bool {
        match self.rules.iter_mut().find(|r| r.id == rule_id) {
            Some(rule) => {
                rule.enabled = enabled;
                true
            }
            None => false,
        }
    }

    fn enabled_in_scope(&self, scope: RuleScope) -> Vec<Rule> {
        let mut rules: Vec<Rule> = self
            .rules
            .iter()
            .filter(|r| r.enabled && r.scope == scope)
            .cloned()
            .collect();
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));
        rules
    }
}
