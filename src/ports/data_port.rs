//! Bar data access port trait.

use crate::domain::error::RuleTraderError;
use crate::domain::ohlcv::{BarTable, Timeframe};

pub trait DataPort {
    /// All stored bars for `symbol` on `timeframe`, oldest first.
    fn fetch_bars(&self, symbol: &str, timeframe: Timeframe) -> Result<BarTable, RuleTraderError>;

    /// Symbols with at least one stored table.
    fn list_symbols(&self) -> Result<Vec<String>, RuleTraderError>;
}
