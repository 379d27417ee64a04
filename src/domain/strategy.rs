//! Trading strategies and the static strategy registry.
//!
//! A strategy prepares an [`IndicatorFrame`] and maps the current
//! [`PositionState`] plus one [`FrameRow`] to an [`Action`]. Strategies are
//! selected by name through [`resolve`].

use std::fmt;

use super::backtest::Mode;
use super::error::EngineError;
use super::frame::{FrameRow, IndicatorFrame};
use super::indicator::{IndicatorKind, IndicatorSpec};
use super::ohlcv::PriceSeries;
use super::position::{Action, PositionState};
use super::resample::BucketSize;

pub trait Strategy: Send + Sync {
    fn name(&self) -> &str;

    fn spec(&self) -> &IndicatorSpec;

    fn prepare(&self, series: &PriceSeries, bucket: BucketSize) -> IndicatorFrame {
        IndicatorFrame::prepare(series, bucket, self.spec())
    }

    /// Frame built from bars `0..=index` only.
    fn prepare_until(&self, series: &PriceSeries, index: usize, bucket: BucketSize) -> IndicatorFrame {
        IndicatorFrame::prepare_until(series, index, bucket, self.spec())
    }

    fn decide(&self, state: PositionState, row: &FrameRow) -> Action;

    /// What this strategy would do on `row` from either state.
    fn stance(&self, row: &FrameRow) -> Stance {
        if self.decide(PositionState::Flat, row) == Action::Buy {
            Stance::Buyable
        } else if self.decide(PositionState::Long, row) == Action::Sell {
            Stance::Sellable
        } else {
            Stance::Hold
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stance {
    Buyable,
    Sellable,
    Hold,
}

impl fmt::Display for Stance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stance::Buyable => write!(f, "BUYABLE"),
            Stance::Sellable => write!(f, "SELLABLE"),
            Stance::Hold => write!(f, "NOOP"),
        }
    }
}

/// Long while A is strictly above B. Equality holds the current state.
fn crossover(state: PositionState, row: &FrameRow) -> Action {
    match state {
        PositionState::Flat if row.a > row.b => Action::Buy,
        PositionState::Long if row.b > row.a => Action::Sell,
        _ => Action::Hold,
    }
}

#[derive(Debug, Clone)]
pub struct EmaCross {
    name: &'static str,
    spec: IndicatorSpec,
}

impl EmaCross {
    pub fn new(name: &'static str, length_a: usize, length_b: usize) -> Self {
        Self {
            name,
            spec: IndicatorSpec::new(IndicatorKind::Ema, length_a, length_b),
        }
    }
}

impl Strategy for EmaCross {
    fn name(&self) -> &str {
        self.name
    }

    fn spec(&self) -> &IndicatorSpec {
        &self.spec
    }

    fn decide(&self, state: PositionState, row: &FrameRow) -> Action {
        crossover(state, row)
    }
}

#[derive(Debug, Clone)]
pub struct DemaCross {
    name: &'static str,
    spec: IndicatorSpec,
}

impl DemaCross {
    pub fn new(name: &'static str, length_a: usize, length_b: usize) -> Self {
        Self {
            name,
            spec: IndicatorSpec::new(IndicatorKind::Dema, length_a, length_b),
        }
    }
}

impl Strategy for DemaCross {
    fn name(&self) -> &str {
        self.name
    }

    fn spec(&self) -> &IndicatorSpec {
        &self.spec
    }

    fn decide(&self, state: PositionState, row: &FrameRow) -> Action {
        crossover(state, row)
    }
}

/// Stochastic RSI oscillator: A is %K, B is %D.
///
/// Buys when %K is above `level` with %D below it, sells when %K is below
/// `level` with %D above it.
#[derive(Debug, Clone)]
pub struct StochRsiCross {
    name: &'static str,
    spec: IndicatorSpec,
    level: f64,
}

impl StochRsiCross {
    pub fn new(name: &'static str, length_a: usize, length_b: usize, level: f64) -> Self {
        Self {
            name,
            spec: IndicatorSpec::new(IndicatorKind::StochRsi, length_a, length_b),
            level,
        }
    }
}

impl Strategy for StochRsiCross {
    fn name(&self) -> &str {
        self.name
    }

    fn spec(&self) -> &IndicatorSpec {
        &self.spec
    }

    fn decide(&self, state: PositionState, row: &FrameRow) -> Action {
        let (k, d) = (row.a, row.b);
        match state {
            PositionState::Flat if k > self.level && d < k => Action::Buy,
            PositionState::Long if k < self.level && d > k => Action::Sell,
            _ => Action::Hold,
        }
    }
}

/// A resolved strategy together with the feed mode it runs under.
pub struct StrategyChoice {
    pub strategy: Box<dyn Strategy>,
    pub mode: Mode,
}

impl fmt::Debug for StrategyChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyChoice")
            .field("strategy", &self.strategy.name())
            .field("spec", self.strategy.spec())
            .field("mode", &self.mode)
            .finish()
    }
}

const REGISTRY: &[&str] = &[
    "ema",
    "dema",
    "stochrsi",
    "stochrsi-70",
    "ema-stream",
    "dema-stream",
];

/// Registered strategy names.
pub fn names() -> &'static [&'static str] {
    REGISTRY
}

/// Looks up `name` in the registry. `cadence` only applies to the causal
/// (`-stream`) strategies.
pub fn resolve(
    name: &str,
    length_a: usize,
    length_b: usize,
    cadence: usize,
) -> Result<StrategyChoice, EngineError> {
    let causal = Mode::Causal { cadence };
    let (strategy, mode): (Box<dyn Strategy>, Mode) = match name.trim().to_lowercase().as_str() {
        "ema" => (Box::new(EmaCross::new("ema", length_a, length_b)), Mode::Batch),
        "dema" => (Box::new(DemaCross::new("dema", length_a, length_b)), Mode::Batch),
        "stochrsi" => (
            Box::new(StochRsiCross::new("stochrsi", length_a, length_b, 50.0)),
            Mode::Batch,
        ),
        "stochrsi-70" => (
            Box::new(StochRsiCross::new("stochrsi-70", length_a, length_b, 70.0)),
            Mode::Batch,
        ),
        "ema-stream" => (Box::new(EmaCross::new("ema-stream", length_a, length_b)), causal),
        "dema-stream" => (Box::new(DemaCross::new("dema-stream", length_a, length_b)), causal),
        _ => {
            return Err(EngineError::UnknownStrategy {
                name: name.to_string(),
                known: REGISTRY.join(", "),
            });
        }
    };
    Ok(StrategyChoice { strategy, mode })
}
