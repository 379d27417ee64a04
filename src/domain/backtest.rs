//! Backtest runner: feeds bars through a strategy, the position state
//! machine and the trade ledger.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

use super::error::EngineError;
use super::frame::{FrameRow, IndicatorFrame};
use super::ledger::{Granularity, Halt, Stats, Trade, TradeLedger};
use super::ohlcv::{Bar, PriceSeries};
use super::position::{PositionStateMachine, Transition};
use super::resample::BucketSize;
use super::strategy::Strategy;
use crate::ports::event_port::{EventSink, NullSink};

/// How indicator values reach the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// One frame over the whole series, aligned onto every bar. Carries a
    /// lookahead bias within each bucket.
    #[default]
    Batch,
    /// Frame rebuilt from bars up to the current one on every `cadence`-th
    /// bar, the first decision landing on bar `cadence - 1`.
    Causal { cadence: usize },
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Batch => write!(f, "batch"),
            Mode::Causal { cadence } => write!(f, "causal/{cadence}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub bucket: BucketSize,
    pub fee_rate: Decimal,
    pub initial_wallet: Decimal,
    pub ruin_threshold: Decimal,
    pub granularity: Granularity,
    pub mode: Mode,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            bucket: BucketSize::DAILY,
            fee_rate: Decimal::new(6, 3),
            initial_wallet: Decimal::new(1000, 0),
            ruin_threshold: Decimal::ONE,
            granularity: Granularity::Month,
            mode: Mode::Batch,
        }
    }
}

impl BacktestConfig {
    /// Coin-to-coin numeraire: a much smaller starting wallet.
    pub fn coin_to_coin() -> Self {
        BacktestConfig {
            initial_wallet: Decimal::new(245, 4),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TradeEvent {
    Buy {
        timestamp: DateTime<Utc>,
        price: Decimal,
    },
    Sell(Trade),
}

/// Cooperative cancellation shared between a run and its caller.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub fn run(
    series: &PriceSeries,
    strategy: &dyn Strategy,
    config: &BacktestConfig,
) -> Result<Stats, EngineError> {
    run_with(series, strategy, config, &mut NullSink, &CancelFlag::new())
}

/// Runs `strategy` over `series`. Stops early on ruin, cancellation or a
/// settlement overflow and returns whatever has accumulated.
pub fn run_with(
    series: &PriceSeries,
    strategy: &dyn Strategy,
    config: &BacktestConfig,
    sink: &mut dyn EventSink,
    cancel: &CancelFlag,
) -> Result<Stats, EngineError> {
    if config.mode == (Mode::Causal { cadence: 0 }) {
        return Err(EngineError::invalid(
            "backtest",
            "cadence",
            "must be at least 1",
        ));
    }

    info!(
        strategy = strategy.name(),
        spec = %strategy.spec(),
        bucket = %config.bucket,
        mode = %config.mode,
        bars = series.len(),
        "starting backtest"
    );

    let batch = match config.mode {
        Mode::Batch => Some(strategy.prepare(series, config.bucket)),
        Mode::Causal { .. } => None,
    };

    let mut machine = PositionStateMachine::new();
    let mut ledger = TradeLedger::new(
        config.initial_wallet,
        config.fee_rate,
        config.granularity,
    );

    for (index, bar) in series.bars().iter().enumerate() {
        if cancel.is_cancelled() {
            info!(bar = index, "backtest cancelled");
            ledger.halt(Halt::Cancelled);
            break;
        }

        let row = match (&batch, config.mode) {
            (Some(frame), _) => decision_row(frame, bar, false),
            (None, Mode::Causal { cadence }) if (index + 1) % cadence == 0 => {
                let frame = strategy.prepare_until(series, index, config.bucket);
                decision_row(&frame, bar, true)
            }
            _ => None,
        };

        ledger.count_bar();
        if let Some(row) = row {
            if let Err(halt) = step(strategy, &mut machine, &mut ledger, sink, &row) {
                warn!(bar = index, wallet = %ledger.wallet(), "trade settlement overflowed");
                ledger.halt(halt);
                break;
            }
        }

        if ledger.wallet() < config.ruin_threshold {
            info!(
                bar = index,
                wallet = %ledger.wallet(),
                threshold = %config.ruin_threshold,
                "wallet below ruin threshold"
            );
            ledger.halt(Halt::Ruin);
            break;
        }
    }

    let stats = ledger.into_stats();
    info!(
        trades = stats.trade_count(),
        wins = stats.wins,
        losses = stats.losses,
        wallet = %stats.wallet,
        bars = stats.bars_processed,
        "backtest finished"
    );
    Ok(stats)
}

/// Indicator row for `bar`, carrying the bar's own timestamp and close.
fn decision_row(frame: &IndicatorFrame, bar: &Bar, latest: bool) -> Option<FrameRow> {
    let row = if latest {
        frame.latest()
    } else {
        frame.row_for(bar.timestamp)
    }?;
    Some(FrameRow {
        timestamp: bar.timestamp,
        close: bar.close,
        a: row.a,
        b: row.b,
    })
}

fn step(
    strategy: &dyn Strategy,
    machine: &mut PositionStateMachine,
    ledger: &mut TradeLedger,
    sink: &mut dyn EventSink,
    row: &FrameRow,
) -> Result<(), Halt> {
    let action = strategy.decide(machine.state(), row);
    match machine.apply(action, row.timestamp, row.close) {
        Some(Transition::Opened(position)) => {
            debug!(
                time = %position.entry_time,
                price = %position.entry_price,
                a = row.a,
                b = row.b,
                "BUY"
            );
            sink.record(TradeEvent::Buy {
                timestamp: position.entry_time,
                price: position.entry_price,
            });
        }
        Some(Transition::Closed {
            position,
            exit_time,
            exit_price,
        }) => {
            let trade = ledger
                .close(&position, exit_time, exit_price)
                .ok_or(Halt::Overflow)?
                .clone();
            debug!(
                time = %exit_time,
                price = %exit_price,
                percent = %trade.percent_return,
                wallet = %trade.wallet_after,
                "SELL"
            );
            sink.record(TradeEvent::Sell(trade));
        }
        None => {}
    }
    Ok(())
}
