//! Core domain types and logic. Nothing here performs I/O.

pub mod ohlcv;
pub mod indicator;
pub mod rule;
pub mod strategy;
pub mod series;
pub mod condition_eval;
pub mod rule_engine;
pub mod history;
pub mod config_validation;
pub mod error;
