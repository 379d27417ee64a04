//! Brute-force search over indicator length pairs.
//!
//! Each pair runs as an isolated backtest on the rayon pool; the input
//! series is the only shared state and is read-only.

use rayon::prelude::*;
use rust_decimal::Decimal;
use serde::Serialize;
use std::ops::RangeInclusive;
use tracing::info;

use super::backtest::{run, BacktestConfig, Mode};
use super::error::EngineError;
use super::ohlcv::PriceSeries;
use super::strategy::resolve;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepResult {
    pub length_a: usize,
    pub length_b: usize,
    pub wallet: Decimal,
    pub trades: usize,
    pub wins: usize,
    pub losses: usize,
}

/// Every `(a, b)` pair from the two ranges, `a`-major.
pub fn grid(a_range: RangeInclusive<usize>, b_range: RangeInclusive<usize>) -> Vec<(usize, usize)> {
    a_range
        .flat_map(|a| b_range.clone().map(move |b| (a, b)))
        .collect()
}

/// Runs strategy `name` for every pair. Results are sorted by final wallet,
/// best first, ties broken by pair.
pub fn run_sweep(
    series: &PriceSeries,
    name: &str,
    pairs: &[(usize, usize)],
    config: &BacktestConfig,
) -> Result<Vec<SweepResult>, EngineError> {
    let cadence = match config.mode {
        Mode::Causal { cadence } => cadence,
        Mode::Batch => 1,
    };
    // Unknown names fail even when `pairs` is empty.
    resolve(name, 1, 1, cadence)?;

    info!(strategy = name, pairs = pairs.len(), "starting sweep");

    let mut results = pairs
        .par_iter()
        .map(|&(length_a, length_b)| {
            let choice = resolve(name, length_a, length_b, cadence)?;
            let config = BacktestConfig {
                mode: choice.mode,
                ..config.clone()
            };
            let stats = run(series, choice.strategy.as_ref(), &config)?;
            Ok(SweepResult {
                length_a,
                length_b,
                wallet: stats.wallet,
                trades: stats.trade_count(),
                wins: stats.wins,
                losses: stats.losses,
            })
        })
        .collect::<Result<Vec<_>, EngineError>>()?;

    results.sort_by(|x, y| {
        y.wallet
            .cmp(&x.wallet)
            .then((x.length_a, x.length_b).cmp(&(y.length_a, y.length_b)))
    });

    if let Some(best) = results.first() {
        info!(
            length_a = best.length_a,
            length_b = best.length_b,
            wallet = %best.wallet,
            "sweep finished"
        );
    }
    Ok(results)
}
