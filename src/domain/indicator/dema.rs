//! Double Exponential Moving Average.
//!
//! DEMA(n) = 2 * EMA(n) - EMA(EMA(n)). Warmup: first 2(n-1) outputs are null.

use super::ema::{calculate_ema, calculate_ema_of};

pub fn calculate_dema(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let single = calculate_ema(values, period);
    let double = calculate_ema_of(&single, period);

    single
        .iter()
        .zip(&double)
        .map(|(s, d)| match (s, d) {
            (Some(s), Some(d)) => Some(2.0 * s - d),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn dema_warmup() {
        let values: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        let series = calculate_dema(&values, 3);

        for (i, v) in series.iter().enumerate() {
            assert_eq!(v.is_some(), i >= 4, "index {i}");
        }
    }

    #[test]
    fn dema_period_1_is_identity() {
        let series = calculate_dema(&[5.0, 7.0, 3.0], 1);
        assert_eq!(series, vec![Some(5.0), Some(7.0), Some(3.0)]);
    }

    #[test]
    fn dema_tracks_linear_trend_without_lag() {
        // A single EMA lags a linear ramp by a constant; DEMA cancels that lag.
        let values: Vec<f64> = (0..60).map(|i| 10.0 + 2.0 * i as f64).collect();
        let series = calculate_dema(&values, 5);
        let last = series.last().unwrap().unwrap();
        assert_relative_eq!(last, *values.last().unwrap(), epsilon = 1e-6);
    }

    #[test]
    fn dema_constant_input() {
        let series = calculate_dema(&[50.0; 12], 4);
        for v in series.iter().flatten() {
            assert_eq!(*v, 50.0);
        }
    }

    #[test]
    fn dema_zero_period() {
        assert_eq!(calculate_dema(&[1.0, 2.0, 3.0], 0), vec![None, None, None]);
    }
}
