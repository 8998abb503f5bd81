//! CSV file bar data adapter.
//!
//! One file per symbol and timeframe, `{SYMBOL}_{timeframe}.csv`, with a
//! `timestamp,open,high,low,close,volume` header.

use crate::domain::error::RuleTraderError;
use crate::domain::ohlcv::{BarTable, OhlcvBar, Timeframe};
use crate::ports::data_port::DataPort;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

pub struct CsvAdapter {
    base_path: PathBuf,
    max_bars: Option<usize>,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self {
            base_path,
            max_bars: None,
        }
    }

    /// Keep only the newest `max_bars` bars of each table.
    pub fn with_max_bars(mut self, max_bars: usize) -> Self {
        self.max_bars = Some(max_bars);
        self
    }

    fn csv_path(&self, symbol: &str, timeframe: Timeframe) -> PathBuf {
        self.base_path.join(format!("{}_{}.csv", symbol, timeframe))
    }
}

impl DataPort for CsvAdapter {
    fn fetch_bars(&self, symbol: &str, timeframe: Timeframe) -> Result<BarTable, RuleTraderError> {
        let path = self.csv_path(symbol, timeframe);
        let content = fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => RuleTraderError::NoData {
                symbol: symbol.to_string(),
                timeframe: timeframe.to_string(),
            },
            _ => RuleTraderError::Data {
                reason: format!("failed to read {}: {}", path.display(), e),
            },
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for (line, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| RuleTraderError::Data {
                reason: format!("CSV parse error: {}", e),
            })?;
            // header is line 1
            let row = line + 2;

            let raw_ts = record.get(0).unwrap_or("").trim();
            let timestamp = parse_timestamp(raw_ts).ok_or_else(|| RuleTraderError::Data {
                reason: format!("{}: row {}: invalid timestamp '{}'", path.display(), row, raw_ts),
            })?;

            let mut values = [0.0; 5];
            for (i, (value, name)) in values
                .iter_mut()
                .zip(["open", "high", "low", "close", "volume"])
                .enumerate()
            {
                let raw = record.get(i + 1).ok_or_else(|| RuleTraderError::Data {
                    reason: format!("{}: row {}: missing {} column", path.display(), row, name),
                })?;
                *value = raw.trim().parse().map_err(|e| RuleTraderError::Data {
                    reason: format!("{}: row {}: invalid {} value: {}", path.display(), row, name, e),
                })?;
            }
            let [open, high, low, close, volume] = values;

            bars.push(OhlcvBar {
                timestamp,
                open,
                high,
                low,
                close,
                volume,
            });
        }

        if bars.iter().all(|b| b.timestamp.is_some()) {
            bars.sort_by_key(|b| b.timestamp);
        }
        if let Some(max) = self.max_bars {
            let excess = bars.len().saturating_sub(max);
            bars.drain(..excess);
        }

        Ok(BarTable::new(symbol, timeframe, bars))
    }

    fn list_symbols(&self) -> Result<Vec<String>, RuleTraderError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| RuleTraderError::Data {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut symbols = BTreeSet::new();
        for entry in entries {
            let entry = entry.map_err(|e| RuleTraderError::Data {
                reason: format!("directory entry error: {}", e),
            })?;

            let name = entry.file_name();
            let Some(stem) = name.to_string_lossy().strip_suffix(".csv").map(str::to_string)
            else {
                continue;
            };
            if let Some((symbol, tf)) = stem.rsplit_once('_') {
                if tf.parse::<Timeframe>().is_ok() && !symbol.is_empty() {
                    symbols.insert(symbol.to_string());
                }
            }
        }

        Ok(symbols.into_iter().collect())
    }
}

/// `Some(None)` for an empty field, `None` if unparseable.
fn parse_timestamp(raw: &str) -> Option<Option<NaiveDateTime>> {
    if raw.is_empty() {
        return Some(None);
    }
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(Some)
}
