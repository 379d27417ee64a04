//! RSI (Relative Strength Index).
//!
//! Uses Wilder's smoothing for average gain/loss calculation:
//! - First average: simple mean of gains/losses over first n changes
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0: RSI = 100
//!
//! Warmup: first n outputs are null (need n price changes to compute initial average).

pub fn calculate_rsi(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 || values.len() < 2 {
        return vec![None; values.len()];
    }

    let mut out = Vec::with_capacity(values.len());
    out.push(None);

    let changes: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();
    let gain = |c: f64| if c > 0.0 { c } else { 0.0 };
    let loss = |c: f64| if c < 0.0 { -c } else { 0.0 };

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;

    for (idx, &change) in changes.iter().enumerate() {
        if idx < period - 1 {
            out.push(None);
            continue;
        }

        if idx == period - 1 {
            avg_gain = changes[..period].iter().map(|&c| gain(c)).sum::<f64>() / period as f64;
            avg_loss = changes[..period].iter().map(|&c| loss(c)).sum::<f64>() / period as f64;
        } else {
            let n = period as f64;
            avg_gain = (avg_gain * (n - 1.0) + gain(change)) / n;
            avg_loss = (avg_loss * (n - 1.0) + loss(change)) / n;
        }

        let rsi = if avg_loss == 0.0 {
            100.0
        } else {
            100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
        };
        out.push(Some(rsi));
    }

    out
}
