//! CLI integration tests: settings merging, config files on disk and the
//! command pipelines over a mock data port.

mod common;

use clap::Parser;
use common::*;
use emacross::adapters::file_config_adapter::FileConfigAdapter;
use emacross::adapters::json_report_adapter::JsonReportAdapter;
use emacross::adapters::text_report_adapter::TextReportAdapter;
use emacross::cli::{self, Cli, Command, RunArgs};
use emacross::domain::backtest::{CancelFlag, Mode, TradeEvent};
use emacross::domain::error::EngineError;
use emacross::domain::ledger::{Granularity, Halt};
use emacross::domain::resample::BucketSize;
use emacross::domain::strategy::Stance;
use emacross::ports::config_port::ConfigPort;
use emacross::ports::event_port::NullSink;
use rust_decimal_macros::dec;
use std::io::Write;
use std::path::PathBuf;

fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

const VALID_INI: &str = r#"
[data]
csv_file = /data/btc.csv
start = 1500000000
end = 1600000000

[backtest]
strategy = dema
resample = 4h
length_a = 3
length_b = 9
cadence = 30
fee_rate = 0.001
initial_wallet = 500
ruin_threshold = 10
granularity = day
"#;

fn args_with_csv() -> RunArgs {
    RunArgs {
        csv_file: Some(PathBuf::from("prices.csv")),
        ..RunArgs::default()
    }
}

mod settings {
    use super::*;

    #[test]
    fn defaults_without_config_file() {
        let settings = cli::build_settings(None, &args_with_csv()).unwrap();

        assert_eq!(settings.csv_file, PathBuf::from("prices.csv"));
        assert_eq!(settings.strategy, "ema");
        assert_eq!((settings.length_a, settings.length_b), (1, 2));
        assert_eq!(settings.cadence, 60);
        assert!(!settings.c2c);
        assert_eq!(settings.backtest.bucket, BucketSize::DAILY);
        assert_eq!(settings.backtest.fee_rate, dec!(0.006));
        assert_eq!(settings.backtest.initial_wallet, dec!(1000));
        assert_eq!(settings.backtest.ruin_threshold, dec!(1));
        assert_eq!(settings.backtest.granularity, Granularity::Month);
        assert!(settings.start.is_none() && settings.end.is_none());
    }

    #[test]
    fn values_come_from_config_file() {
        let adapter = FileConfigAdapter::from_string(VALID_INI).unwrap();
        let settings =
            cli::build_settings(Some(&adapter as &dyn ConfigPort), &RunArgs::default()).unwrap();

        assert_eq!(settings.csv_file, PathBuf::from("/data/btc.csv"));
        assert_eq!(settings.start, Some(1_500_000_000));
        assert_eq!(settings.end, Some(1_600_000_000));
        assert_eq!(settings.strategy, "dema");
        assert_eq!((settings.length_a, settings.length_b), (3, 9));
        assert_eq!(settings.cadence, 30);
        assert_eq!(settings.backtest.bucket.seconds(), 4 * 3_600);
        assert_eq!(settings.backtest.fee_rate, dec!(0.001));
        assert_eq!(settings.backtest.initial_wallet, dec!(500));
        assert_eq!(settings.backtest.ruin_threshold, dec!(10));
        assert_eq!(settings.backtest.granularity, Granularity::Day);
    }

    #[test]
    fn flags_override_config_file() {
        let adapter = FileConfigAdapter::from_string(VALID_INI).unwrap();
        let args = RunArgs {
            csv_file: Some(PathBuf::from("override.csv")),
            strategy: Some("ema-stream".into()),
            resample: Some("15min".into()),
            ema_a: Some(5),
            ema_b: Some(20),
            cadence: Some(4),
            granularity: Some("month".into()),
            ..RunArgs::default()
        };
        let settings = cli::build_settings(Some(&adapter as &dyn ConfigPort), &args).unwrap();

        assert_eq!(settings.csv_file, PathBuf::from("override.csv"));
        assert_eq!(settings.strategy, "ema-stream");
        assert_eq!((settings.length_a, settings.length_b), (5, 20));
        assert_eq!(settings.cadence, 4);
        assert_eq!(settings.backtest.bucket.seconds(), 900);
        assert_eq!(settings.backtest.granularity, Granularity::Month);

        let choice = settings.choice().unwrap();
        assert_eq!(
            settings.config_for(&choice).mode,
            Mode::Causal { cadence: 4 }
        );
    }

    #[test]
    fn coin_to_coin_flag_sets_small_wallet() {
        let args = RunArgs {
            c2c: true,
            ..args_with_csv()
        };
        let settings = cli::build_settings(None, &args).unwrap();
        assert!(settings.c2c);
        assert_eq!(settings.backtest.initial_wallet, dec!(0.0245));
    }

    #[test]
    fn coin_to_coin_from_config_keeps_explicit_wallet() {
        let adapter = FileConfigAdapter::from_string(
            "[data]\ncsv_file = a.csv\n[backtest]\nc2c = true\ninitial_wallet = 0.5\n",
        )
        .unwrap();
        let settings =
            cli::build_settings(Some(&adapter as &dyn ConfigPort), &RunArgs::default()).unwrap();
        assert!(settings.c2c);
        assert_eq!(settings.backtest.initial_wallet, dec!(0.5));
    }

    #[test]
    fn missing_csv_file_is_config_missing() {
        let err = cli::build_settings(None, &RunArgs::default()).unwrap_err();
        assert!(matches!(err, EngineError::ConfigMissing { ref key, .. } if key == "csv_file"));
    }

    #[test]
    fn zero_length_flag_is_invalid() {
        let args = RunArgs {
            ema_a: Some(0),
            ..args_with_csv()
        };
        let err = cli::build_settings(None, &args).unwrap_err();
        assert!(matches!(err, EngineError::ConfigInvalid { ref key, .. } if key == "length_a"));
    }

    #[test]
    fn bad_resample_flag_is_invalid() {
        let args = RunArgs {
            resample: Some("3 fortnights".into()),
            ..args_with_csv()
        };
        let err = cli::build_settings(None, &args).unwrap_err();
        assert!(matches!(err, EngineError::ConfigInvalid { ref key, .. } if key == "resample"));
    }

    #[test]
    fn unknown_strategy_surfaces_on_choice() {
        let args = RunArgs {
            strategy: Some("macd".into()),
            ..args_with_csv()
        };
        let settings = cli::build_settings(None, &args).unwrap();
        let err = settings.choice().unwrap_err();
        assert!(matches!(err, EngineError::UnknownStrategy { .. }));
    }
}

mod config_files {
    use super::*;

    #[test]
    fn resolve_settings_reads_file_on_disk() {
        let file = write_temp_ini(VALID_INI);
        let args = RunArgs {
            config: Some(file.path().to_path_buf()),
            ..RunArgs::default()
        };
        let settings = cli::resolve_settings(&args).unwrap();
        assert_eq!(settings.strategy, "dema");
        assert_eq!(settings.length_b, 9);
    }

    #[test]
    fn missing_config_file_is_parse_error() {
        let err = cli::load_config(&PathBuf::from("/nonexistent/emacross.ini"))
            .err()
            .unwrap();
        assert!(matches!(err, EngineError::ConfigParse { .. }));
    }

    #[test]
    fn invalid_file_values_are_rejected() {
        let file = write_temp_ini("[data]\ncsv_file = a.csv\n[backtest]\nfee_rate = 1.5\n");
        let args = RunArgs {
            config: Some(file.path().to_path_buf()),
            ..RunArgs::default()
        };
        let err = cli::resolve_settings(&args).unwrap_err();
        assert!(matches!(err, EngineError::ConfigInvalid { ref key, .. } if key == "fee_rate"));
    }

    #[test]
    fn inverted_window_is_rejected() {
        let file = write_temp_ini("[data]\ncsv_file = a.csv\nstart = 200\nend = 100\n");
        let args = RunArgs {
            config: Some(file.path().to_path_buf()),
            ..RunArgs::default()
        };
        assert!(cli::resolve_settings(&args).is_err());
    }

    #[test]
    fn unknown_strategy_flag_fails_before_loading_data() {
        let args = RunArgs {
            strategy: Some("nope".into()),
            csv_file: Some(PathBuf::from("/nonexistent/prices.csv")),
            ..RunArgs::default()
        };
        let err = cli::resolve_settings(&args).unwrap_err();
        assert!(matches!(err, EngineError::UnknownStrategy { .. }));
    }
}

mod pipeline_mock {
    use super::*;

    fn settings() -> cli::Settings {
        cli::build_settings(None, &args_with_csv()).unwrap()
    }

    #[test]
    fn backtest_writes_text_report() {
        let port = MockDataPort::new().with_bars(daily_bars(&rise_and_fall()));
        let mut out = Vec::new();
        let mut events = Vec::new();
        let stats = cli::run_backtest_pipeline(
            &port,
            &settings(),
            &TextReportAdapter::new(),
            &mut events,
            &CancelFlag::new(),
            &mut out,
        )
        .unwrap();

        assert_eq!(stats.trade_count(), 1);
        assert!(matches!(events[0], TradeEvent::Buy { .. }));
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("SELL: 195.00"));
        assert!(text.contains("Breakdown by month"));
        assert!(text.contains("wins: 1 losses: 0"));
    }

    #[test]
    fn backtest_writes_json_report() {
        let port = MockDataPort::new().with_bars(daily_bars(&rise_and_fall()));
        let mut out = Vec::new();
        cli::run_backtest_pipeline(
            &port,
            &settings(),
            &JsonReportAdapter,
            &mut NullSink,
            &CancelFlag::new(),
            &mut out,
        )
        .unwrap();

        let doc: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(doc["summary"]["trades"], 1);
        assert_eq!(doc["stats"]["bars_processed"], 41);
    }

    #[test]
    fn cancelled_backtest_still_reports() {
        let port = MockDataPort::new().with_bars(daily_bars(&rise_and_fall()));
        let cancel = CancelFlag::new();
        cancel.cancel();
        let mut out = Vec::new();
        let stats = cli::run_backtest_pipeline(
            &port,
            &settings(),
            &TextReportAdapter::new(),
            &mut NullSink,
            &cancel,
            &mut out,
        )
        .unwrap();

        assert_eq!(stats.halt, Some(Halt::Cancelled));
        assert_eq!(stats.bars_processed, 0);
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("halted: cancelled"));
    }

    #[test]
    fn backtest_propagates_load_errors() {
        let port = MockDataPort::new();
        let err = cli::run_backtest_pipeline(
            &port,
            &settings(),
            &TextReportAdapter::new(),
            &mut NullSink,
            &CancelFlag::new(),
            &mut Vec::new(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::EmptySeries));
    }

    #[test]
    fn sweep_ranks_pairs_by_wallet() {
        let port = MockDataPort::new().with_bars(daily_bars(&rise_and_fall()));
        let results = cli::run_sweep_pipeline(&port, &settings(), 3, 4).unwrap();

        assert_eq!(results.len(), 12);
        assert!(results.windows(2).all(|w| w[0].wallet >= w[1].wallet));
        assert_eq!(port.loads.get(), 1);

        let mut out = Vec::new();
        cli::write_sweep(&results[..2], false, false, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.contains("->"));
    }

    #[test]
    fn sweep_json_is_an_array() {
        let port = MockDataPort::new().with_bars(daily_bars(&rise_and_fall()));
        let results = cli::run_sweep_pipeline(&port, &settings(), 2, 2).unwrap();
        let mut out = Vec::new();
        cli::write_sweep(&results, true, false, &mut out).unwrap();
        let doc: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(doc.as_array().unwrap().len(), 4);
    }

    #[test]
    fn frame_rows_skip_warmup() {
        let port = MockDataPort::new().with_bars(daily_bars(&closes_from(&[1, 2, 3, 4, 5])));
        let rows = cli::frame_rows(&port, &settings()).unwrap();
        assert_eq!(rows.len(), 4);

        let mut out = Vec::new();
        cli::write_frame(&rows, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().next(), Some("timestamp,close,a,b"));
        assert_eq!(text.lines().count(), 5);
    }

    #[test]
    fn signal_reports_latest_stance() {
        let rising = MockDataPort::new().with_bars(daily_bars(&closes_from(&[100, 101, 102, 110])));
        let (row, stance) = cli::signal(&rising, &settings()).unwrap();
        assert!(row.is_some());
        assert_eq!(stance, Stance::Buyable);

        let falling = MockDataPort::new().with_bars(daily_bars(&closes_from(&[110, 108, 104, 90])));
        let (_, stance) = cli::signal(&falling, &settings()).unwrap();
        assert_eq!(stance, Stance::Sellable);
    }

    #[test]
    fn signal_without_warmup_is_noop() {
        let port = MockDataPort::new().with_bars(daily_bars(&closes_from(&[100])));
        let (row, stance) = cli::signal(&port, &settings()).unwrap();
        assert!(row.is_none());
        assert_eq!(stance, Stance::Hold);
    }

    #[test]
    fn strategies_lists_registry() {
        let mut out = Vec::new();
        cli::run_strategies(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 6);
        assert!(text.lines().any(|l| l.starts_with("ema-stream") && l.contains("causal")));
        assert!(text.lines().any(|l| l.starts_with("stochrsi-70") && l.contains("batch")));
    }
}

mod argument_parsing {
    use super::*;

    #[test]
    fn backtest_flags_parse() {
        let cli = Cli::try_parse_from([
            "emacross",
            "backtest",
            "--csv-file",
            "btc.csv",
            "--strategy",
            "dema",
            "--ema-a",
            "4",
            "--ema-b",
            "12",
            "--resample",
            "1h",
            "--json",
        ])
        .unwrap();

        match cli.command {
            Command::Backtest { args, json, verbose } => {
                assert!(json);
                assert!(!verbose);
                assert_eq!(args.csv_file, Some(PathBuf::from("btc.csv")));
                assert_eq!(args.strategy.as_deref(), Some("dema"));
                assert_eq!((args.ema_a, args.ema_b), (Some(4), Some(12)));
                assert_eq!(args.resample.as_deref(), Some("1h"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn sweep_defaults_to_twenty_five_by_twenty_five() {
        let cli = Cli::try_parse_from(["emacross", "sweep", "--csv-file", "btc.csv"]).unwrap();
        match cli.command {
            Command::Sweep {
                max_a, max_b, top, ..
            } => {
                assert_eq!((max_a, max_b), (25, 25));
                assert!(top.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn strategies_takes_no_arguments() {
        let cli = Cli::try_parse_from(["emacross", "strategies"]).unwrap();
        assert!(matches!(cli.command, Command::Strategies));
    }
}
