//! CLI integration tests for the signal and history commands.
//!
//! Tests cover:
//! - Engine settings from INI config (build_engine_settings, parse_now)
//! - Market data loading (timeframe fallback, VIX symbol mapping)
//! - Signal pipeline and history report with MockDataPort
//! - Output formatting
//! - Full commands against INI, JSON and CSV files on disk

mod common;

use clap::Parser;
use common::*;
use ruletrader::adapters::file_config_adapter::FileConfigAdapter;
use ruletrader::cli::{self, Cli, EngineSettings};
use ruletrader::domain::error::RuleTraderError;
use ruletrader::domain::rule::{Action, Condition, ConditionKind, Rule, RuleScope};
use ruletrader::domain::rule_engine::Signals;
use ruletrader::domain::strategy::Strategy;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tempfile::TempDir;

fn settings() -> EngineSettings {
    EngineSettings {
        data_dir: PathBuf::from("unused"),
        vix_symbol: "VIX".to_string(),
        timeframe: Timeframe::M5,
        now: Some(ts(2024, 1, 2, 11, 0)),
        max_bars: 0,
        validate: true,
    }
}

fn mock_market() -> MockDataPort {
    MockDataPort::new()
        .with_table(make_table("AAPL", &[140.0, 150.0, 160.0]))
        .with_table(make_table("MSFT", &[110.0, 100.0, 90.0]))
        .with_table(make_table("VIX", &[18.0, 17.5]))
}

// ExitCode has no stable equality; compare its debug form.
fn code(exit: ExitCode) -> String {
    format!("{exit:?}")
}

mod engine_settings {
    use super::*;

    #[test]
    fn defaults_with_only_data_dir() {
        let adapter = FileConfigAdapter::from_string("[data]\ndir = ./data\n").unwrap();
        let settings = cli::build_engine_settings(&adapter).unwrap();

        assert_eq!(settings.data_dir, PathBuf::from("./data"));
        assert_eq!(settings.vix_symbol, "VIX");
        assert_eq!(settings.timeframe, Timeframe::M5);
        assert_eq!(settings.now, None);
        assert_eq!(settings.max_bars, 0);
        assert!(settings.validate);
    }

    #[test]
    fn reads_every_key() {
        let ini = r#"
[data]
dir = /srv/bars
vix_symbol = ^VIX
max_bars = 250

[engine]
timeframe = 1h
now = 2024-03-01T15:45:00
validate = false
"#;
        let adapter = FileConfigAdapter::from_string(ini).unwrap();
        let settings = cli::build_engine_settings(&adapter).unwrap();

        assert_eq!(settings.data_dir, PathBuf::from("/srv/bars"));
        assert_eq!(settings.vix_symbol, "^VIX");
        assert_eq!(settings.timeframe, Timeframe::H1);
        assert_eq!(settings.now, Some(ts(2024, 3, 1, 15, 45)));
        assert_eq!(settings.max_bars, 250);
        assert!(!settings.validate);
    }

    #[test]
    fn missing_data_dir() {
        let adapter = FileConfigAdapter::from_string("[engine]\ntimeframe = 5m\n").unwrap();
        let err = cli::build_engine_settings(&adapter).unwrap_err();
        assert!(matches!(err, RuleTraderError::ConfigMissing { key, .. } if key == "dir"));
    }

    #[test]
    fn invalid_timeframe() {
        let adapter =
            FileConfigAdapter::from_string("[data]\ndir = x\n[engine]\ntimeframe = 2m\n").unwrap();
        let err = cli::build_engine_settings(&adapter).unwrap_err();
        assert!(matches!(err, RuleTraderError::ConfigInvalid { key, .. } if key == "timeframe"));
    }

    #[test]
    fn invalid_now() {
        let adapter =
            FileConfigAdapter::from_string("[data]\ndir = x\n[engine]\nnow = 2024-03-01 15:45\n")
                .unwrap();
        let err = cli::build_engine_settings(&adapter).unwrap_err();
        assert!(matches!(err, RuleTraderError::ConfigInvalid { key, .. } if key == "now"));
    }

    #[test]
    fn negative_max_bars() {
        let adapter = FileConfigAdapter::from_string("[data]\ndir = x\nmax_bars = -5\n").unwrap();
        let err = cli::build_engine_settings(&adapter).unwrap_err();
        assert!(matches!(err, RuleTraderError::ConfigInvalid { key, .. } if key == "max_bars"));
    }

    #[test]
    fn parse_now_formats() {
        assert_eq!(
            cli::parse_now("2024-01-02T09:30:00").unwrap(),
            ts(2024, 1, 2, 9, 30)
        );
        assert_eq!(
            cli::parse_now(" 2024-01-02T09:30:00 ").unwrap(),
            ts(2024, 1, 2, 9, 30)
        );
        assert!(cli::parse_now("09:30").is_err());
    }
}

mod market_data_loading {
    use super::*;

    #[test]
    fn prefers_engine_timeframe_then_subscribed() {
        let port = MockDataPort::new()
            .with_table(make_table_on("AAPL", Timeframe::H1, &[1.0, 2.0]))
            .with_table(make_table_on("MSFT", Timeframe::H1, &[3.0]))
            .with_table(make_table_on("MSFT", Timeframe::M5, &[4.0, 5.0, 6.0]));
        let subs = vec![
            ("AAPL".to_string(), Timeframe::H1),
            ("MSFT".to_string(), Timeframe::H1),
        ];

        let (data, vix) = cli::load_market_data(&port, &subs, &settings()).unwrap();
        assert!(vix.is_none());
        assert_eq!(data["AAPL"].timeframe, Timeframe::H1);
        assert_eq!(data["MSFT"].timeframe, Timeframe::M5);
        assert_eq!(data["MSFT"].len(), 3);
    }

    #[test]
    fn vix_read_from_configured_symbol() {
        let port = MockDataPort::new()
            .with_table(make_table("AAPL", &[1.0]))
            .with_table(make_table("^VIX", &[21.0]));
        let subs = vec![
            ("AAPL".to_string(), Timeframe::M5),
            ("VIX".to_string(), Timeframe::M5),
        ];
        let mut settings = settings();
        settings.vix_symbol = "^VIX".to_string();

        let (data, vix) = cli::load_market_data(&port, &subs, &settings).unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(vix.map(|t| t.closes()), Some(vec![21.0]));
    }

    #[test]
    fn missing_symbols_are_skipped() {
        let port = MockDataPort::new().with_table(make_table("AAPL", &[1.0]));
        let subs = vec![
            ("AAPL".to_string(), Timeframe::M5),
            ("ZZZZ".to_string(), Timeframe::M5),
        ];

        let (data, _) = cli::load_market_data(&port, &subs, &settings()).unwrap();
        assert_eq!(data.keys().collect::<Vec<_>>(), vec!["AAPL"]);
    }

    #[test]
    fn data_errors_propagate() {
        let port = MockDataPort::new().with_error("AAPL", "corrupt file");
        let subs = vec![("AAPL".to_string(), Timeframe::M5)];

        let err = cli::load_market_data(&port, &subs, &settings()).unwrap_err();
        assert!(matches!(err, RuleTraderError::Data { reason } if reason == "corrupt file"));
    }
}

mod signals_pipeline {
    use super::*;

    #[test]
    fn produces_signals_per_ticker() {
        let signals =
            cli::run_signals_pipeline(&mock_market(), sample_strategy(), &settings(), None)
                .unwrap();

        assert_eq!(signals["AAPL"], vec![Action::Buy]);
        assert_eq!(signals["MSFT"], vec![Action::Sell]);
    }

    #[test]
    fn explicit_now_overrides_settings() {
        // 20:00 is outside market hours, so the global gate closes.
        let signals = cli::run_signals_pipeline(
            &mock_market(),
            sample_strategy(),
            &settings(),
            Some(ts(2024, 1, 2, 20, 0)),
        )
        .unwrap();
        assert!(signals.is_empty());
    }

    #[test]
    fn invalid_strategy_rejected_when_validating() {
        let global_buy = Rule::new(
            "bad",
            "global buy",
            RuleScope::Global,
            Action::Buy,
            Condition::new(ConditionKind::GreaterThan, close()).with_threshold(1.0),
        );
        let strategy = sample_strategy().with_rule(global_buy);

        let err = cli::run_signals_pipeline(&mock_market(), strategy.clone(), &settings(), None)
            .unwrap_err();
        assert!(matches!(err, RuleTraderError::StrategyInvalid { .. }));

        let mut lenient = settings();
        lenient.validate = false;
        assert!(cli::run_signals_pipeline(&mock_market(), strategy, &lenient, None).is_ok());
    }

    #[test]
    fn format_signals_lines() {
        let mut signals = Signals::new();
        signals.insert("MSFT".into(), vec![Action::Sell]);
        signals.insert("AAPL".into(), vec![Action::Buy, Action::Sell]);

        assert_eq!(
            cli::format_signals(&signals),
            vec!["AAPL: BUY,SELL".to_string(), "MSFT: SELL".to_string()]
        );
    }
}

mod history_reports {
    use super::*;

    #[test]
    fn report_covers_every_rule() {
        let report =
            cli::history_report(&mock_market(), &sample_strategy(), "AAPL", None, &settings())
                .unwrap();
        let ids: Vec<&str> = report.iter().map(|r| r.rule_id.as_str()).collect();
        assert_eq!(ids, vec!["hours", "vix", "buy", "sell"]);
        assert!(report.iter().all(|r| r.bars == 3));

        let hours = &report[0];
        assert_eq!(hours.info.total_true_count, 3);
    }

    #[test]
    fn single_rule_and_formatting() {
        let report = cli::history_report(
            &mock_market(),
            &sample_strategy(),
            "AAPL",
            Some("buy"),
            &settings(),
        )
        .unwrap();
        assert_eq!(report.len(), 1);
        assert_eq!(
            cli::format_history(&report[0]),
            "buy (close above 150): last true 0 bars ago (bar 2 at 2024-01-02 09:40:00), 1/3 bars true"
        );

        let report = cli::history_report(
            &mock_market(),
            &sample_strategy(),
            "AAPL",
            Some("sell"),
            &settings(),
        )
        .unwrap();
        assert_eq!(
            cli::format_history(&report[0]),
            "sell (close below 100): never true over 3 bars"
        );
    }

    #[test]
    fn unknown_symbol_has_empty_history() {
        let report = cli::history_report(
            &mock_market(),
            &sample_strategy(),
            "NONE",
            Some("buy"),
            &settings(),
        )
        .unwrap();
        assert_eq!(report[0].bars, 0);
        assert_eq!(report[0].info.total_true_count, 0);
    }
}

mod commands {
    use super::*;

    const HEADER: &str = "timestamp,open,high,low,close,volume\n";

    fn write_csv(dir: &Path, file: &str, closes: &[f64]) {
        let mut content = HEADER.to_string();
        for (i, close) in closes.iter().enumerate() {
            content.push_str(&format!(
                "2024-01-02 09:{:02}:00,{close},{close},{close},{close},1000\n",
                30 + 5 * i
            ));
        }
        fs::write(dir.join(file), content).unwrap();
    }

    /// Data, config and strategy files in one temp dir.
    fn workspace() -> (TempDir, PathBuf, PathBuf) {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("data");
        fs::create_dir_all(&data).unwrap();
        write_csv(&data, "AAPL_5m.csv", &[140.0, 150.0, 160.0]);
        write_csv(&data, "MSFT_5m.csv", &[110.0, 100.0, 90.0]);
        write_csv(&data, "VIX_5m.csv", &[18.0, 17.0]);

        let config = dir.path().join("config.ini");
        fs::write(
            &config,
            format!(
                "[data]\ndir = {}\n\n[engine]\nnow = 2024-01-02T11:00:00\n\n[logging]\nlevel = warn\n",
                data.display()
            ),
        )
        .unwrap();

        let strategy = dir.path().join("strategy.json");
        fs::write(&strategy, SAMPLE_STRATEGY_JSON).unwrap();

        (dir, config, strategy)
    }

    fn run(args: &[&str]) -> String {
        let mut argv = vec!["ruletrader"];
        argv.extend_from_slice(args);
        code(cli::run(Cli::parse_from(argv)))
    }

    fn path(p: &Path) -> &str {
        p.to_str().unwrap()
    }

    #[test]
    fn validate_valid_strategy() {
        let (_dir, _config, strategy) = workspace();
        assert_eq!(run(&["validate", "-s", path(&strategy)]), code(ExitCode::SUCCESS));
    }

    #[test]
    fn validate_invalid_strategy_exits_4() {
        let (dir, config, _) = workspace();
        let strategy = dir.path().join("empty.json");
        fs::write(&strategy, r#"{"id": "e", "name": "Empty"}"#).unwrap();

        assert_eq!(
            run(&["validate", "-s", path(&strategy), "-c", path(&config)]),
            code(ExitCode::from(4))
        );
    }

    #[test]
    fn unparseable_strategy_exits_4() {
        let (dir, _, _) = workspace();
        let strategy = dir.path().join("broken.json");
        fs::write(&strategy, "{\"rules\": [").unwrap();
        assert_eq!(run(&["validate", "-s", path(&strategy)]), code(ExitCode::from(4)));
    }

    #[test]
    fn missing_strategy_file_exits_1() {
        let (dir, config, _) = workspace();
        let strategy = dir.path().join("absent.json");
        assert_eq!(
            run(&["signals", "-s", path(&strategy), "-c", path(&config)]),
            code(ExitCode::from(1))
        );
    }

    #[test]
    fn subscriptions_command() {
        let (_dir, _config, strategy) = workspace();
        assert_eq!(run(&["subscriptions", "-s", path(&strategy)]), code(ExitCode::SUCCESS));
    }

    #[test]
    fn signals_command() {
        let (_dir, config, strategy) = workspace();
        assert_eq!(
            run(&["signals", "-s", path(&strategy), "-c", path(&config)]),
            code(ExitCode::SUCCESS)
        );
        assert_eq!(
            run(&[
                "signals",
                "-s",
                path(&strategy),
                "-c",
                path(&config),
                "--now",
                "2024-01-02T12:00:00",
                "--json"
            ]),
            code(ExitCode::SUCCESS)
        );
    }

    #[test]
    fn signals_bad_now_exits_2() {
        let (_dir, config, strategy) = workspace();
        assert_eq!(
            run(&[
                "signals",
                "-s",
                path(&strategy),
                "-c",
                path(&config),
                "--now",
                "noon"
            ]),
            code(ExitCode::from(2))
        );
    }

    #[test]
    fn config_without_data_dir_exits_2() {
        let (dir, _, strategy) = workspace();
        let config = dir.path().join("bad.ini");
        fs::write(&config, "[engine]\ntimeframe = 5m\n").unwrap();
        assert_eq!(
            run(&["signals", "-s", path(&strategy), "-c", path(&config)]),
            code(ExitCode::from(2))
        );
    }

    #[test]
    fn history_command() {
        let (_dir, config, strategy) = workspace();
        assert_eq!(
            run(&[
                "history",
                "-s",
                path(&strategy),
                "-c",
                path(&config),
                "--symbol",
                "AAPL",
                "--rule",
                "buy"
            ]),
            code(ExitCode::SUCCESS)
        );
    }

    #[test]
    fn list_commands() {
        let (dir, config, _) = workspace();
        assert_eq!(run(&["list-symbols", "-c", path(&config)]), code(ExitCode::SUCCESS));
        assert_eq!(
            run(&["list-strategies", "--dir", path(dir.path())]),
            code(ExitCode::SUCCESS)
        );
    }

    #[test]
    fn strategy_saved_by_adapter_runs() {
        use ruletrader::adapters::json_strategy_adapter::JsonStrategyAdapter;
        use ruletrader::ports::strategy_port::StrategyPort;

        let (dir, config, _) = workspace();
        let saved = dir.path().join("saved").join("sample.json");
        let strategy: Strategy = sample_strategy();
        JsonStrategyAdapter.save_strategy(&strategy, &saved).unwrap();

        assert_eq!(
            run(&["signals", "-s", path(&saved), "-c", path(&config)]),
            code(ExitCode::SUCCESS)
        );
    }
}
