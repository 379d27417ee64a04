//! Exponential Moving Average.
//!
//! alpha = 2/(n+1), seeded with the SMA of the first n inputs, then
//! EMA[i] = EMA[i-1] + alpha * (x[i] - EMA[i-1]).
//! Warmup: first (n-1) outputs are null.

pub fn calculate_ema(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; values.len()];
    }

    let mut out = Vec::with_capacity(values.len());
    let alpha = smoothing(period);
    let mut ema = 0.0;
    let mut sum = 0.0;

    for (i, &x) in values.iter().enumerate() {
        if i < period - 1 {
            sum += x;
            out.push(None);
        } else if i == period - 1 {
            sum += x;
            ema = sum / period as f64;
            out.push(Some(ema));
        } else {
            // Incremental form keeps a constant input exactly constant.
            ema += alpha * (x - ema);
            out.push(Some(ema));
        }
    }

    out
}

/// EMA over the non-null tail of `series`. Output is aligned with the input;
/// positions before the first value stay null.
pub fn calculate_ema_of(series: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let Some(first) = series.iter().position(Option::is_some) else {
        return vec![None; series.len()];
    };

    let tail: Vec<f64> = series[first..]
        .iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect();

    let mut out = vec![None; first];
    out.extend(calculate_ema(&tail, period));
    out
}

pub fn smoothing(period: usize) -> f64 {
    2.0 / (period as f64 + 1.0)
}
