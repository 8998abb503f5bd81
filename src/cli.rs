//! CLI definition and dispatch.
//!
//! Progress and errors go to stderr; results (signals, subscriptions,
//! history) go to stdout.

use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::warn;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_strategy_adapter::JsonStrategyAdapter;
use crate::domain::config_validation::{
    validate_engine_config, validate_strategy, validate_strategy_or_err, NOW_FORMAT,
};
use crate::domain::error::RuleTraderError;
use crate::domain::history::{last_true_info, LastTrueInfo};
use crate::domain::ohlcv::{BarTable, MarketData, Timeframe};
use crate::domain::rule::Rule;
use crate::domain::rule_engine::{RuleEngine, Signals, VIX_SYMBOL};
use crate::domain::strategy::Strategy;
use crate::logging::{init_logging, LogFormat};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::strategy_port::StrategyPort;

#[derive(Parser, Debug)]
#[command(name = "ruletrader", about = "Rule-based trading signal engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check a strategy file for problems
    Validate {
        #[arg(short, long)]
        strategy: PathBuf,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// List the (symbol, timeframe) feeds a strategy needs
    Subscriptions {
        #[arg(short, long)]
        strategy: PathBuf,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Evaluate one cycle and print BUY/SELL signals per ticker
    Signals {
        #[arg(short, long)]
        strategy: PathBuf,
        #[arg(short, long)]
        config: PathBuf,
        /// Evaluation clock, YYYY-MM-DDTHH:MM:SS (overrides [engine] now)
        #[arg(long)]
        now: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Show when each rule last held over a symbol's history
    History {
        #[arg(short, long)]
        strategy: PathBuf,
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: String,
        /// Only this rule id
        #[arg(long)]
        rule: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// List symbols with stored bar data
    ListSymbols {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List strategy files in a directory
    ListStrategies {
        #[arg(long)]
        dir: PathBuf,
    },
}

/// Settings read from the `[data]`, `[engine]` and `[logging]` sections.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub data_dir: PathBuf,
    pub vix_symbol: String,
    pub timeframe: Timeframe,
    pub now: Option<NaiveDateTime>,
    /// 0 keeps every bar.
    pub max_bars: usize,
    pub validate: bool,
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Validate { strategy, config } => run_validate(&strategy, config.as_deref()),
        Command::Subscriptions { strategy, config } => {
            run_subscriptions(&strategy, config.as_deref())
        }
        Command::Signals {
            strategy,
            config,
            now,
            json,
        } => run_signals(&strategy, &config, now.as_deref(), json),
        Command::History {
            strategy,
            config,
            symbol,
            rule,
            json,
        } => run_history(&strategy, &config, &symbol, rule.as_deref(), json),
        Command::ListSymbols { config } => run_list_symbols(&config),
        Command::ListStrategies { dir } => run_list_strategies(&dir),
    }
}

fn fail(err: RuleTraderError) -> ExitCode {
    eprintln!("error: {err}");
    (&err).into()
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(fail)
}

/// Logging from `[logging] level`/`format`, defaulting to info text.
pub fn init_logging_from(config: Option<&dyn ConfigPort>) {
    let level = config
        .and_then(|c| c.get_string("logging", "level"))
        .unwrap_or_else(|| "info".to_string());
    let format = config
        .and_then(|c| c.get_string("logging", "format"))
        .map(|f| LogFormat::from_name(&f))
        .unwrap_or_default();
    init_logging(&level, format);
}

fn load_strategy(path: &Path) -> Result<Strategy, ExitCode> {
    JsonStrategyAdapter.load_strategy(path).map_err(fail)
}

/// Optional config (for logging) plus the strategy.
fn load_with_optional_config(
    strategy_path: &Path,
    config_path: Option<&Path>,
) -> Result<Strategy, ExitCode> {
    let config = config_path.map(load_config).transpose()?;
    init_logging_from(config.as_ref().map(|c| c as &dyn ConfigPort));
    load_strategy(strategy_path)
}

pub fn build_engine_settings(config: &dyn ConfigPort) -> Result<EngineSettings, RuleTraderError> {
    validate_engine_config(config)?;

    let data_dir = config
        .get_string("data", "dir")
        .map(|d| PathBuf::from(d.trim()))
        .ok_or_else(|| RuleTraderError::ConfigMissing {
            section: "data".into(),
            key: "dir".into(),
        })?;
    let timeframe = match config.get_string("engine", "timeframe") {
        Some(tf) => tf.parse().map_err(|reason| RuleTraderError::ConfigInvalid {
            section: "engine".into(),
            key: "timeframe".into(),
            reason,
        })?,
        None => Timeframe::default(),
    };
    let now = config
        .get_string("engine", "now")
        .map(|s| parse_now(&s))
        .transpose()?;
    let max_bars = config.get_int("data", "max_bars", 0);
    if max_bars < 0 {
        return Err(RuleTraderError::ConfigInvalid {
            section: "data".into(),
            key: "max_bars".into(),
            reason: "max_bars must be non-negative".into(),
        });
    }

    Ok(EngineSettings {
        data_dir,
        vix_symbol: config
            .get_string("data", "vix_symbol")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| VIX_SYMBOL.to_string()),
        timeframe,
        now,
        max_bars: max_bars as usize,
        validate: config.get_bool("engine", "validate", true),
    })
}

pub fn parse_now(raw: &str) -> Result<NaiveDateTime, RuleTraderError> {
    NaiveDateTime::parse_from_str(raw.trim(), NOW_FORMAT).map_err(|_| {
        RuleTraderError::ConfigInvalid {
            section: "engine".into(),
            key: "now".into(),
            reason: format!("invalid timestamp '{raw}', expected YYYY-MM-DDTHH:MM:SS"),
        }
    })
}

fn csv_adapter(settings: &EngineSettings) -> CsvAdapter {
    let adapter = CsvAdapter::new(settings.data_dir.clone());
    match settings.max_bars {
        0 => adapter,
        n => adapter.with_max_bars(n),
    }
}

fn run_validate(strategy_path: &Path, config_path: Option<&Path>) -> ExitCode {
    let strategy = match load_with_optional_config(strategy_path, config_path) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };

    eprintln!("Validating strategy: {}", strategy_path.display());
    for rule in &strategy.rules {
        eprintln!("  {}", rule.display());
    }
    let issues = validate_strategy(&strategy);
    for issue in &issues {
        println!("{issue}");
    }

    match validate_strategy_or_err(&strategy) {
        Ok(()) => {
            eprintln!(
                "Strategy '{}' is valid ({} rules, {} tickers)",
                strategy.name,
                strategy.rules.len(),
                strategy.tickers.len()
            );
            ExitCode::SUCCESS
        }
        Err(e) => (&e).into(),
    }
}

fn run_subscriptions(strategy_path: &Path, config_path: Option<&Path>) -> ExitCode {
    let strategy = match load_with_optional_config(strategy_path, config_path) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };

    let engine = RuleEngine::new(strategy);
    for (symbol, timeframe) in engine.required_data_subscriptions() {
        println!("{symbol} {timeframe}");
    }
    ExitCode::SUCCESS
}

/// Load every subscribed symbol once.
///
/// A symbol's table comes from the engine timeframe if stored, else from
/// its subscribed timeframes in order. The VIX feed is read from
/// `settings.vix_symbol` and returned separately. Symbols with no data are
/// skipped with a warning.
pub fn load_market_data(
    data_port: &dyn DataPort,
    subscriptions: &[(String, Timeframe)],
    settings: &EngineSettings,
) -> Result<(MarketData, Option<BarTable>), RuleTraderError> {
    let mut market_data = MarketData::new();
    let mut vix_bars = None;

    let symbols: BTreeSet<&str> = subscriptions.iter().map(|(s, _)| s.as_str()).collect();

    for symbol in symbols {
        let mut timeframes = vec![settings.timeframe];
        timeframes.extend(
            subscriptions
                .iter()
                .filter(|(s, tf)| s == symbol && *tf != settings.timeframe)
                .map(|(_, tf)| *tf),
        );
        let source = if symbol == VIX_SYMBOL {
            settings.vix_symbol.as_str()
        } else {
            symbol
        };

        match fetch_first(data_port, source, &timeframes)? {
            Some(table) if symbol == VIX_SYMBOL => vix_bars = Some(table),
            Some(table) => {
                market_data.insert(symbol.to_string(), table);
            }
            None => warn!(symbol, "No bar data found"),
        }
    }

    Ok((market_data, vix_bars))
}

fn fetch_first(
    data_port: &dyn DataPort,
    symbol: &str,
    timeframes: &[Timeframe],
) -> Result<Option<BarTable>, RuleTraderError> {
    for &timeframe in timeframes {
        match data_port.fetch_bars(symbol, timeframe) {
            Ok(table) => return Ok(Some(table)),
            Err(RuleTraderError::NoData { .. }) => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(None)
}

/// One `TICKER: ACTION,ACTION` line per ticker.
pub fn format_signals(signals: &Signals) -> Vec<String> {
    signals
        .iter()
        .map(|(ticker, actions)| {
            let actions: Vec<String> = actions.iter().map(|a| a.to_string()).collect();
            format!("{}: {}", ticker, actions.join(","))
        })
        .collect()
}

/// Evaluate one cycle against data from `data_port`.
pub fn run_signals_pipeline(
    data_port: &dyn DataPort,
    strategy: Strategy,
    settings: &EngineSettings,
    now: Option<NaiveDateTime>,
) -> Result<Signals, RuleTraderError> {
    if settings.validate {
        validate_strategy_or_err(&strategy)?;
    }

    let mut engine = RuleEngine::new(strategy);
    let subscriptions: Vec<(String, Timeframe)> =
        engine.required_data_subscriptions().into_iter().collect();
    let (market_data, vix_bars) = load_market_data(data_port, &subscriptions, settings)?;

    eprintln!(
        "Evaluating {} rules over {} tables",
        engine.strategy().rules.len(),
        market_data.len()
    );
    Ok(engine.evaluate_all(
        &market_data,
        vix_bars.as_ref(),
        now.or(settings.now),
    ))
}

fn run_signals(strategy_path: &Path, config_path: &Path, now: Option<&str>, json: bool) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    init_logging_from(Some(&config));
    let strategy = match load_strategy(strategy_path) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let result = build_engine_settings(&config).and_then(|settings| {
        let now = now.map(parse_now).transpose()?;
        run_signals_pipeline(&csv_adapter(&settings), strategy, &settings, now)
    });
    let signals = match result {
        Ok(signals) => signals,
        Err(e) => return fail(e),
    };

    if json {
        match serde_json::to_string_pretty(&signals) {
            Ok(out) => println!("{out}"),
            Err(e) => {
                eprintln!("error: {e}");
                return ExitCode::from(1);
            }
        }
    } else if signals.is_empty() {
        eprintln!("No signals");
    } else {
        for line in format_signals(&signals) {
            println!("{line}");
        }
    }
    ExitCode::SUCCESS
}

/// Last-true info for one rule over one symbol.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct RuleHistory {
    pub rule_id: String,
    pub rule_name: String,
    pub bars: usize,
    pub info: LastTrueInfo,
}

/// Rule history for `symbol`, each rule on its own timeframe. Rules that
/// read VIX get the VIX table at the same timeframe when stored.
pub fn history_report(
    data_port: &dyn DataPort,
    strategy: &Strategy,
    symbol: &str,
    rule_id: Option<&str>,
    settings: &EngineSettings,
) -> Result<Vec<RuleHistory>, RuleTraderError> {
    let rules: Vec<&Rule> = strategy
        .rules
        .iter()
        .filter(|r| rule_id.is_none_or(|id| r.id == id))
        .collect();

    let mut report = Vec::with_capacity(rules.len());
    for rule in rules {
        let timeframe = rule.timeframe();
        let bars = fetch_first(data_port, symbol, &[timeframe, settings.timeframe])?;
        let vix_bars = if rule.uses_vix() {
            fetch_first(data_port, &settings.vix_symbol, &[timeframe, settings.timeframe])?
        } else {
            None
        };

        let info = last_true_info(rule, bars.as_ref(), vix_bars.as_ref())?;
        report.push(RuleHistory {
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            bars: bars.as_ref().map_or(0, BarTable::len),
            info,
        });
    }
    Ok(report)
}

pub fn format_history(entry: &RuleHistory) -> String {
    let info = &entry.info;
    match (info.last_true_index, info.bars_ago) {
        (Some(index), Some(bars_ago)) => {
            let at = info
                .last_true_timestamp
                .map(|ts| format!(" at {ts}"))
                .unwrap_or_default();
            format!(
                "{} ({}): last true {} bars ago (bar {}{}), {}/{} bars true",
                entry.rule_id,
                entry.rule_name,
                bars_ago,
                index,
                at,
                info.total_true_count,
                entry.bars
            )
        }
        _ => format!(
            "{} ({}): never true over {} bars",
            entry.rule_id, entry.rule_name, entry.bars
        ),
    }
}

fn run_history(
    strategy_path: &Path,
    config_path: &Path,
    symbol: &str,
    rule_id: Option<&str>,
    json: bool,
) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    init_logging_from(Some(&config));
    let strategy = match load_strategy(strategy_path) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let report = build_engine_settings(&config).and_then(|settings| {
        history_report(&csv_adapter(&settings), &strategy, symbol, rule_id, &settings)
    });
    let report = match report {
        Ok(report) => report,
        Err(e) => return fail(e),
    };

    if json {
        match serde_json::to_string_pretty(&report) {
            Ok(out) => println!("{out}"),
            Err(e) => {
                eprintln!("error: {e}");
                return ExitCode::from(1);
            }
        }
    } else {
        for entry in &report {
            println!("{}", format_history(entry));
        }
    }
    ExitCode::SUCCESS
}

fn run_list_symbols(config_path: &Path) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    init_logging_from(Some(&config));

    let symbols = build_engine_settings(&config)
        .and_then(|settings| csv_adapter(&settings).list_symbols());
    match symbols {
        Ok(symbols) if symbols.is_empty() => {
            eprintln!("No symbols found");
            ExitCode::SUCCESS
        }
        Ok(symbols) => {
            for symbol in &symbols {
                println!("{symbol}");
            }
            eprintln!("{} symbols found", symbols.len());
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

fn run_list_strategies(dir: &Path) -> ExitCode {
    init_logging_from(None);
    match JsonStrategyAdapter.list_strategies(dir) {
        Ok(strategies) => {
            for (name, id, path) in &strategies {
                println!("{name}\t{id}\t{}", path.display());
            }
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}
