//! Trend indicators over bucket closes.
//!
//! Every indicator is a pure function `&[f64] -> Vec<Option<f64>>` whose
//! output is aligned with its input; `None` marks warm-up or an undefined
//! value. [`IndicatorSpec`] selects the pair of series (A and B) a strategy
//! compares.

pub mod dema;
pub mod ema;
pub mod rsi;
pub mod stoch_rsi;

pub use dema::calculate_dema;
pub use ema::calculate_ema;
pub use rsi::calculate_rsi;
pub use stoch_rsi::calculate_stoch_rsi;

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::domain::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorKind {
    Ema,
    Dema,
    StochRsi,
}

impl fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorKind::Ema => write!(f, "EMA"),
            IndicatorKind::Dema => write!(f, "DEMA"),
            IndicatorKind::StochRsi => write!(f, "STOCHRSI"),
        }
    }
}

impl FromStr for IndicatorKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ema" => Ok(IndicatorKind::Ema),
            "dema" => Ok(IndicatorKind::Dema),
            "stochrsi" | "stoch_rsi" => Ok(IndicatorKind::StochRsi),
            other => Err(EngineError::invalid(
                "backtest",
                "indicator",
                format!("unknown indicator '{other}'"),
            )),
        }
    }
}

/// Indicator kind plus the two lengths that parameterise it.
///
/// For EMA and DEMA, A and B are the same indicator at `length_a` and
/// `length_b`. For StochRSI, `length_a` is both the RSI period and the %K
/// window, `length_b` the %D smoothing; A is %K and B is %D.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct IndicatorSpec {
    pub kind: IndicatorKind,
    pub length_a: usize,
    pub length_b: usize,
}

impl IndicatorSpec {
    pub fn new(kind: IndicatorKind, length_a: usize, length_b: usize) -> Self {
        Self {
            kind,
            length_a,
            length_b,
        }
    }

    pub fn ema(length_a: usize, length_b: usize) -> Self {
        Self::new(IndicatorKind::Ema, length_a, length_b)
    }

    /// Computes the A and B series over `closes`.
    pub fn compute(&self, closes: &[f64]) -> (Vec<Option<f64>>, Vec<Option<f64>>) {
        match self.kind {
            IndicatorKind::Ema => (
                calculate_ema(closes, self.length_a),
                calculate_ema(closes, self.length_b),
            ),
            IndicatorKind::Dema => (
                calculate_dema(closes, self.length_a),
                calculate_dema(closes, self.length_b),
            ),
            IndicatorKind::StochRsi => {
                let out = calculate_stoch_rsi(closes, self.length_a, self.length_a, self.length_b);
                (out.k, out.d)
            }
        }
    }

    /// Minimum number of buckets before both series can have a value.
    pub fn warmup(&self) -> usize {
        let (a, b) = (self.length_a, self.length_b);
        match self.kind {
            IndicatorKind::Ema => a.max(b),
            IndicatorKind::Dema => (2 * a.max(b)).saturating_sub(1),
            IndicatorKind::StochRsi => (2 * a + b).saturating_sub(1),
        }
    }
}

impl Default for IndicatorSpec {
    fn default() -> Self {
        IndicatorSpec::ema(1, 2)
    }
}

impl fmt::Display for IndicatorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({},{})", self.kind, self.length_a, self.length_b)
    }
}
