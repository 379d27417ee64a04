//! Stochastic RSI.
//!
//! %K = 100 * (RSI - min(RSI, k)) / (max(RSI, k) - min(RSI, k)) over the
//! trailing `k_window` RSI values; %D = SMA(%K, d_period).
//! A flat RSI window has no defined %K and yields null.

use super::rsi::calculate_rsi;

#[derive(Debug, Clone, PartialEq)]
pub struct StochRsiSeries {
    pub k: Vec<Option<f64>>,
    pub d: Vec<Option<f64>>,
}

pub fn calculate_stoch_rsi(
    values: &[f64],
    rsi_period: usize,
    k_window: usize,
    d_period: usize,
) -> StochRsiSeries {
    let rsi = calculate_rsi(values, rsi_period);
    let k = stochastic(&rsi, k_window);
    let d = rolling_mean(&k, d_period);
    StochRsiSeries { k, d }
}

fn stochastic(series: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    if window == 0 {
        return vec![None; series.len()];
    }

    (0..series.len())
        .map(|i| {
            if i + 1 < window {
                return None;
            }
            let current = series[i]?;
            let mut lo = f64::INFINITY;
            let mut hi = f64::NEG_INFINITY;
            for v in &series[i + 1 - window..=i] {
                let v = (*v)?;
                lo = lo.min(v);
                hi = hi.max(v);
            }
            let range = hi - lo;
            (range > 0.0).then(|| 100.0 * (current - lo) / range)
        })
        .collect()
}

/// Simple moving average; any null inside the window makes the output null.
pub fn rolling_mean(series: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; series.len()];
    }

    (0..series.len())
        .map(|i| {
            if i + 1 < period {
                return None;
            }
            let mut sum = 0.0;
            for v in &series[i + 1 - period..=i] {
                sum += (*v)?;
            }
            Some(sum / period as f64)
        })
        .collect()
}
