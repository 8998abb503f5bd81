//! JSON strategy file adapter.

use crate::domain::error::RuleTraderError;
use crate::domain::strategy::Strategy;
use crate::ports::strategy_port::StrategyPort;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonStrategyAdapter;

impl StrategyPort for JsonStrategyAdapter {
    fn load_strategy(&self, path: &Path) -> Result<Strategy, RuleTraderError> {
        let content = fs::read_to_string(path)?;
        parse(&content, &path.display().to_string())
    }

    fn save_strategy(&self, strategy: &Strategy, path: &Path) -> Result<(), RuleTraderError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, strategy_to_json(strategy, true)?)?;
        Ok(())
    }
}

impl JsonStrategyAdapter {
    /// (name, id, path) for every loadable `*.json` in `dir`, sorted by
    /// name. Unreadable or invalid files are skipped; a missing directory
    /// lists nothing.
    pub fn list_strategies(&self, dir: &Path) -> Result<Vec<(String, String, PathBuf)>, RuleTraderError> {
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut strategies = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Ok(strategy) = self.load_strategy(&path) {
                strategies.push((strategy.name, strategy.id, path));
            }
        }
        strategies.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(strategies)
    }
}

pub fn strategy_from_json(json: &str) -> Result<Strategy, RuleTraderError> {
    parse(json, "<string>")
}

pub fn strategy_to_json(strategy: &Strategy, pretty: bool) -> Result<String, RuleTraderError> {
    let result = if pretty {
        serde_json::to_string_pretty(strategy)
    } else {
        serde_json::to_string(strategy)
    };
    result.map_err(|e| RuleTraderError::StrategyParse {
        source_name: strategy.name.clone(),
        reason: e.to_string(),
    })
}

fn parse(json: &str, source_name: &str) -> Result<Strategy, RuleTraderError> {
    serde_json::from_str(json).map_err(|e| RuleTraderError::StrategyParse {
        source_name: source_name.to_string(),
        reason: e.to_string(),
    })
}
