//! OHLCV bar tables, price sources and timeframes.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Symbol -> bar table snapshot for one evaluation cycle.
///
/// Ordered by symbol so "first available table" is deterministic.
pub type MarketData = BTreeMap<String, BarTable>;

#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub timestamp: Option<NaiveDateTime>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl OhlcvBar {
    pub fn new(open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp: None,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    pub fn at(mut self, timestamp: NaiveDateTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// (high + low) / 2
    pub fn median_price(&self) -> f64 {
        (self.high + self.low) / 2.0
    }

    /// (high + low + close) / 3
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    pub fn price(&self, source: PriceSource) -> f64 {
        match source {
            PriceSource::Close => self.close,
            PriceSource::Open => self.open,
            PriceSource::High => self.high,
            PriceSource::Low => self.low,
            PriceSource::Volume => self.volume,
            PriceSource::Hl2 => self.median_price(),
            PriceSource::Hlc3 => self.typical_price(),
            PriceSource::Ohlc4 => (self.open + self.high + self.low + self.close) / 4.0,
        }
    }
}

/// Ordered bars for one symbol on one timeframe. Read-only to the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct BarTable {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub bars: Vec<OhlcvBar>,
}

impl BarTable {
    pub fn new(symbol: impl Into<String>, timeframe: Timeframe, bars: Vec<OhlcvBar>) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
            bars,
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn source_series(&self, source: PriceSource) -> Vec<f64> {
        self.bars.iter().map(|b| b.price(source)).collect()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.source_series(PriceSource::Close)
    }

    pub fn highs(&self) -> Vec<f64> {
        self.source_series(PriceSource::High)
    }

    pub fn lows(&self) -> Vec<f64> {
        self.source_series(PriceSource::Low)
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.source_series(PriceSource::Volume)
    }

    /// Every bar's timestamp, or `None` if any bar is untimed.
    pub fn timestamps(&self) -> Option<Vec<NaiveDateTime>> {
        self.bars.iter().map(|b| b.timestamp).collect()
    }

    pub fn timestamp_at(&self, index: usize) -> Option<NaiveDateTime> {
        self.bars.get(index).and_then(|b| b.timestamp)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    #[default]
    Close,
    Open,
    High,
    Low,
    Volume,
    Hl2,
    Hlc3,
    Ohlc4,
}

impl fmt::Display for PriceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PriceSource::Close => "close",
            PriceSource::Open => "open",
            PriceSource::High => "high",
            PriceSource::Low => "low",
            PriceSource::Volume => "volume",
            PriceSource::Hl2 => "hl2",
            PriceSource::Hlc3 => "hlc3",
            PriceSource::Ohlc4 => "ohlc4",
        };
        f.write_str(s)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    M1,
    #[default]
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "30m")]
    M30,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "1d")]
    D1,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1m" => Ok(Timeframe::M1),
            "5m" => Ok(Timeframe::M5),
            "15m" => Ok(Timeframe::M15),
            "30m" => Ok(Timeframe::M30),
            "1h" => Ok(Timeframe::H1),
            "4h" => Ok(Timeframe::H4),
            "1d" => Ok(Timeframe::D1),
            other => Err(format!("unknown timeframe '{other}'")),
        }
    }
}
