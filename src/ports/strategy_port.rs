//! Strategy persistence port trait.

use crate::domain::error::RuleTraderError;
use crate::domain::strategy::Strategy;
use std::path::Path;

pub trait StrategyPort {
    fn load_strategy(&self, path: &Path) -> Result<Strategy, RuleTraderError>;
    fn save_strategy(&self, strategy: &Strategy, path: &Path) -> Result<(), RuleTraderError>;
}
