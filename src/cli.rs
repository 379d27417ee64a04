//! CLI definition and dispatch.

use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::interrupt::cancel_on_interrupt;
use crate::adapters::json_report_adapter::JsonReportAdapter;
use crate::adapters::logging::init_logging;
use crate::adapters::text_report_adapter::TextReportAdapter;
use crate::domain::backtest::{self as engine, BacktestConfig, CancelFlag, Mode, TradeEvent};
use crate::domain::config_validation::{validate_backtest_config, validate_data_config};
use crate::domain::error::EngineError;
use crate::domain::frame::FrameRow;
use crate::domain::ledger::{Granularity, Stats};
use crate::domain::metrics::StatsSummary;
use crate::domain::resample::BucketSize;
use crate::domain::strategy::{self, Stance, StrategyChoice};
use crate::domain::sweep::{grid, run_sweep, SweepResult};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::event_port::{EventSink, NullSink};
use crate::ports::report_port::ReportPort;

const DEFAULT_STRATEGY: &str = "ema";
const DEFAULT_LENGTH_A: usize = 1;
const DEFAULT_LENGTH_B: usize = 2;
const DEFAULT_CADENCE: usize = 60;

#[derive(Parser, Debug)]
#[command(name = "emacross", about = "Long/flat indicator-crossover backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every command that loads price history.
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// INI file with [data] and [backtest] sections
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// CSV with timestamp,low,high,open,close,volume
    #[arg(long)]
    pub csv_file: Option<PathBuf>,
    #[arg(short, long)]
    pub strategy: Option<String>,
    /// Bucket size, e.g. 1D, 4h, 15min
    #[arg(long)]
    pub resample: Option<String>,
    #[arg(long = "ema-a")]
    pub ema_a: Option<usize>,
    #[arg(long = "ema-b")]
    pub ema_b: Option<usize>,
    /// Bars between causal re-evaluations
    #[arg(long)]
    pub cadence: Option<usize>,
    /// day or month
    #[arg(long)]
    pub granularity: Option<String>,
    /// Coin-to-coin wallet (0.0245 units)
    #[arg(long)]
    pub c2c: bool,
    #[arg(long)]
    pub debug: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[command(flatten)]
        args: RunArgs,
        #[arg(long)]
        json: bool,
        /// Print BUY/SELL events to stderr as they happen
        #[arg(short, long)]
        verbose: bool,
    },
    /// Brute-force indicator lengths
    Sweep {
        #[command(flatten)]
        args: RunArgs,
        #[arg(long, default_value_t = 25)]
        max_a: usize,
        #[arg(long, default_value_t = 25)]
        max_b: usize,
        #[arg(long)]
        top: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// Dump the prepared indicator frame
    Frame {
        #[command(flatten)]
        args: RunArgs,
    },
    /// Print the signal of the latest bucket
    Signal {
        #[command(flatten)]
        args: RunArgs,
    },
    /// List registered strategies
    Strategies,
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            args,
            json,
            verbose,
        } => {
            init_logging(args.debug);
            report(run_backtest(&args, json, verbose))
        }
        Command::Sweep {
            args,
            max_a,
            max_b,
            top,
            json,
        } => {
            init_logging(args.debug);
            report(run_sweep_command(&args, max_a, max_b, top, json))
        }
        Command::Frame { args } => {
            init_logging(args.debug);
            report(run_frame(&args))
        }
        Command::Signal { args } => {
            init_logging(args.debug);
            report(run_signal(&args))
        }
        Command::Strategies => report(run_strategies(&mut io::stdout().lock())),
    }
}

fn report(result: Result<(), EngineError>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, EngineError> {
    eprintln!("Loading config from {}", path.display());
    FileConfigAdapter::from_file(path)
}

/// Everything a command needs, merged from file and flags.
#[derive(Debug, Clone)]
pub struct Settings {
    pub csv_file: PathBuf,
    pub start: Option<i64>,
    pub end: Option<i64>,
    pub strategy: String,
    pub length_a: usize,
    pub length_b: usize,
    pub cadence: usize,
    pub c2c: bool,
    pub backtest: BacktestConfig,
}

impl Settings {
    pub fn choice(&self) -> Result<StrategyChoice, EngineError> {
        strategy::resolve(&self.strategy, self.length_a, self.length_b, self.cadence)
    }

    /// Backtest config with the mode of the selected strategy.
    pub fn config_for(&self, choice: &StrategyChoice) -> BacktestConfig {
        BacktestConfig {
            mode: choice.mode,
            ..self.backtest.clone()
        }
    }
}

/// Merges `file` (if any) with `args`. Flags win over file values, file
/// values win over defaults.
pub fn build_settings(
    file: Option<&dyn ConfigPort>,
    args: &RunArgs,
) -> Result<Settings, EngineError> {
    let get = |section: &str, key: &str| {
        file.and_then(|f| f.get_string(section, key))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };
    let int = |key: &str, default: usize| {
        file.map(|f| f.get_int("backtest", key, default as i64))
            .and_then(|v| usize::try_from(v).ok())
            .unwrap_or(default)
    };
    let dec = |key: &str, default: Decimal| {
        file.map(|f| f.get_decimal("backtest", key, default))
            .unwrap_or(default)
    };

    let csv_file = args
        .csv_file
        .clone()
        .or_else(|| get("data", "csv_file").map(PathBuf::from))
        .ok_or_else(|| EngineError::ConfigMissing {
            section: "data".to_string(),
            key: "csv_file".to_string(),
        })?;
    let start = get("data", "start").and_then(|v| v.parse().ok());
    let end = get("data", "end").and_then(|v| v.parse().ok());

    let strategy = args
        .strategy
        .clone()
        .or_else(|| get("backtest", "strategy"))
        .unwrap_or_else(|| DEFAULT_STRATEGY.to_string());
    let length_a = positive(
        "length_a",
        args.ema_a.unwrap_or_else(|| int("length_a", DEFAULT_LENGTH_A)),
    )?;
    let length_b = positive(
        "length_b",
        args.ema_b.unwrap_or_else(|| int("length_b", DEFAULT_LENGTH_B)),
    )?;
    let cadence = positive(
        "cadence",
        args.cadence.unwrap_or_else(|| int("cadence", DEFAULT_CADENCE)),
    )?;

    let bucket = match args.resample.clone().or_else(|| get("backtest", "resample")) {
        Some(v) => v.parse::<BucketSize>()?,
        None => BucketSize::DAILY,
    };
    let granularity = match args
        .granularity
        .clone()
        .or_else(|| get("backtest", "granularity"))
    {
        Some(v) => v.parse::<Granularity>()?,
        None => Granularity::Month,
    };

    let c2c = args.c2c || file.is_some_and(|f| f.get_bool("backtest", "c2c", false));
    let base = if c2c {
        BacktestConfig::coin_to_coin()
    } else {
        BacktestConfig::default()
    };

    let backtest = BacktestConfig {
        bucket,
        fee_rate: dec("fee_rate", base.fee_rate),
        initial_wallet: dec("initial_wallet", base.initial_wallet),
        ruin_threshold: dec("ruin_threshold", base.ruin_threshold),
        granularity,
        mode: Mode::Batch,
    };

    Ok(Settings {
        csv_file,
        start,
        end,
        strategy,
        length_a,
        length_b,
        cadence,
        c2c,
        backtest,
    })
}

fn positive(key: &str, value: usize) -> Result<usize, EngineError> {
    if value == 0 {
        return Err(EngineError::invalid(
            "backtest",
            key,
            format!("{key} must be a positive integer"),
        ));
    }
    Ok(value)
}

/// Loads and validates the config file (if any), then merges in the flags.
pub fn resolve_settings(args: &RunArgs) -> Result<Settings, EngineError> {
    let adapter = match &args.config {
        Some(path) => {
            let adapter = load_config(path)?;
            validate_backtest_config(&adapter)?;
            validate_data_config(&adapter)?;
            Some(adapter)
        }
        None => None,
    };
    let settings = build_settings(adapter.as_ref().map(|a| a as &dyn ConfigPort), args)?;
    // Fail on an unknown flag value before touching the data.
    settings.choice()?;
    Ok(settings)
}

fn data_port(settings: &Settings) -> CsvAdapter {
    eprintln!("Loading price history from {}", settings.csv_file.display());
    CsvAdapter::new(settings.csv_file.clone()).with_window(settings.start, settings.end)
}

/// Prints trade events to stderr as they happen.
struct ConsoleSink;

impl EventSink for ConsoleSink {
    fn record(&mut self, event: TradeEvent) {
        match event {
            TradeEvent::Buy { timestamp, price } => {
                eprintln!("{} BUY: {:.2}", timestamp.format("%Y-%m-%d %H:%M:%S"), price)
            }
            TradeEvent::Sell(trade) => eprintln!(
                "{} SELL: {:.2} wallet={:.2} p={:.2}%",
                trade.exit_time.format("%Y-%m-%d %H:%M:%S"),
                trade.exit_price,
                trade.wallet_after,
                trade.percent_return
            ),
        }
    }
}

fn run_backtest(args: &RunArgs, json: bool, verbose: bool) -> Result<(), EngineError> {
    let settings = resolve_settings(args)?;
    let port = data_port(&settings);
    let reporter: Box<dyn ReportPort> = match (json, settings.c2c) {
        (true, _) => Box::new(JsonReportAdapter),
        (false, true) => Box::new(TextReportAdapter::coin_to_coin()),
        (false, false) => Box::new(TextReportAdapter::new()),
    };
    let mut sink: Box<dyn EventSink> = if verbose {
        Box::new(ConsoleSink)
    } else {
        Box::new(NullSink)
    };

    let cancel = CancelFlag::new();
    cancel_on_interrupt(&cancel)?;

    let mut out = io::stdout().lock();
    run_backtest_pipeline(
        &port,
        &settings,
        reporter.as_ref(),
        sink.as_mut(),
        &cancel,
        &mut out,
    )?;
    Ok(())
}

/// Load, run and report. Returns the stats for callers that want them.
/// Raising `cancel` mid-run still produces a report over the bars seen.
pub fn run_backtest_pipeline(
    data_port: &dyn DataPort,
    settings: &Settings,
    reporter: &dyn ReportPort,
    sink: &mut dyn EventSink,
    cancel: &CancelFlag,
    out: &mut dyn Write,
) -> Result<Stats, EngineError> {
    let series = data_port.load()?;
    let choice = settings.choice()?;
    let config = settings.config_for(&choice);

    eprintln!(
        "Running {} {} over {} bars ({}, {})",
        choice.strategy.name(),
        choice.strategy.spec(),
        series.len(),
        config.bucket,
        config.mode
    );

    let stats = engine::run_with(
        &series,
        choice.strategy.as_ref(),
        &config,
        sink,
        cancel,
    )?;
    let summary = StatsSummary::compute(&stats);
    reporter.write(&stats, &summary, out)?;
    Ok(stats)
}

fn run_sweep_command(
    args: &RunArgs,
    max_a: usize,
    max_b: usize,
    top: Option<usize>,
    json: bool,
) -> Result<(), EngineError> {
    let settings = resolve_settings(args)?;
    let port = data_port(&settings);
    let results = run_sweep_pipeline(&port, &settings, max_a, max_b)?;
    let shown = &results[..top.unwrap_or(results.len()).min(results.len())];

    let mut out = io::stdout().lock();
    write_sweep(shown, json, settings.c2c, &mut out)
}

pub fn run_sweep_pipeline(
    data_port: &dyn DataPort,
    settings: &Settings,
    max_a: usize,
    max_b: usize,
) -> Result<Vec<SweepResult>, EngineError> {
    let series = data_port.load()?;
    let pairs = grid(1..=max_a, 1..=max_b);
    eprintln!(
        "Sweeping {} over {} length pairs on {} bars",
        settings.strategy,
        pairs.len(),
        series.len()
    );
    let config = BacktestConfig {
        mode: Mode::Causal {
            cadence: settings.cadence,
        },
        ..settings.backtest.clone()
    };
    run_sweep(&series, &settings.strategy, &pairs, &config)
}

pub fn write_sweep(
    results: &[SweepResult],
    json: bool,
    c2c: bool,
    out: &mut dyn Write,
) -> Result<(), EngineError> {
    if json {
        serde_json::to_writer_pretty(&mut *out, results).map_err(|e| EngineError::Report {
            reason: format!("failed to encode sweep results: {e}"),
        })?;
        writeln!(out)?;
        return Ok(());
    }
    let dp = if c2c { 8 } else { 2 };
    for r in results {
        writeln!(
            out,
            "{},{} -> {:.dp$} ({} trades, {} wins)",
            r.length_a, r.length_b, r.wallet, r.trades, r.wins
        )?;
    }
    Ok(())
}

fn run_frame(args: &RunArgs) -> Result<(), EngineError> {
    let settings = resolve_settings(args)?;
    let rows = frame_rows(&data_port(&settings), &settings)?;
    let mut out = io::stdout().lock();
    write_frame(&rows, &mut out)
}

/// Prepared bucket rows over the whole series.
pub fn frame_rows(data_port: &dyn DataPort, settings: &Settings) -> Result<Vec<FrameRow>, EngineError> {
    let series = data_port.load()?;
    let choice = settings.choice()?;
    let frame = choice.strategy.prepare(&series, settings.backtest.bucket);
    Ok(frame.rows().to_vec())
}

pub fn write_frame(rows: &[FrameRow], out: &mut dyn Write) -> Result<(), EngineError> {
    writeln!(out, "timestamp,close,a,b")?;
    for row in rows {
        writeln!(
            out,
            "{},{},{},{}",
            row.timestamp.timestamp(),
            row.close,
            row.a,
            row.b
        )?;
    }
    Ok(())
}

fn run_signal(args: &RunArgs) -> Result<(), EngineError> {
    let settings = resolve_settings(args)?;
    let (row, stance) = signal(&data_port(&settings), &settings)?;
    let mut out = io::stdout().lock();
    if let Some(row) = row {
        writeln!(
            out,
            "last_row: {} close={} a={:.4} b={:.4}",
            row.timestamp.format("%Y-%m-%d %H:%M:%S"),
            row.close,
            row.a,
            row.b
        )?;
    }
    writeln!(out, "{stance}")?;
    Ok(())
}

/// Stance of the latest bucket. No warmed-up bucket means no signal.
pub fn signal(
    data_port: &dyn DataPort,
    settings: &Settings,
) -> Result<(Option<FrameRow>, Stance), EngineError> {
    let series = data_port.load()?;
    let choice = settings.choice()?;
    let frame = choice.strategy.prepare(&series, settings.backtest.bucket);
    Ok(match frame.latest() {
        Some(row) => (Some(row.clone()), choice.strategy.stance(row)),
        None => (None, Stance::Hold),
    })
}

pub fn run_strategies(out: &mut dyn Write) -> Result<(), EngineError> {
    for name in strategy::names() {
        let choice = strategy::resolve(name, DEFAULT_LENGTH_A, DEFAULT_LENGTH_B, DEFAULT_CADENCE)?;
        let mode = match choice.mode {
            Mode::Batch => "batch",
            Mode::Causal { .. } => "causal",
        };
        writeln!(out, "{name:<12} {mode:<7} {}", choice.strategy.spec().kind)?;
    }
    Ok(())
}
