#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use emacross::domain::backtest::BacktestConfig;
use emacross::domain::error::EngineError;
use emacross::domain::ohlcv::{Bar, PriceSeries};
use emacross::ports::data_port::DataPort;
use rust_decimal::Decimal;
use std::cell::Cell;

pub const DAY: i64 = 86_400;

pub struct MockDataPort {
    pub bars: Vec<Bar>,
    pub error: Option<String>,
    pub loads: Cell<usize>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            bars: Vec::new(),
            error: None,
            loads: Cell::new(0),
        }
    }

    pub fn with_bars(mut self, bars: Vec<Bar>) -> Self {
        self.bars = bars;
        self
    }

    pub fn with_error(mut self, reason: &str) -> Self {
        self.error = Some(reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn load(&self) -> Result<PriceSeries, EngineError> {
        self.loads.set(self.loads.get() + 1);
        if let Some(reason) = &self.error {
            return Err(EngineError::MalformedInput {
                line: 0,
                reason: reason.clone(),
            });
        }
        if self.bars.is_empty() {
            return Err(EngineError::EmptySeries);
        }
        PriceSeries::new(self.bars.clone())
    }
}

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap()
}

pub fn make_bar(secs: i64, close: Decimal) -> Bar {
    Bar {
        timestamp: DateTime::from_timestamp(secs, 0).unwrap(),
        open: close,
        high: close + Decimal::ONE,
        low: close - Decimal::ONE,
        close,
        volume: Decimal::from(10),
    }
}

/// One bar per day starting 2021-01-01.
pub fn daily_bars(closes: &[Decimal]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_bar((start() + Duration::days(i as i64)).timestamp(), c))
        .collect()
}

pub fn daily_series(closes: &[Decimal]) -> PriceSeries {
    PriceSeries::new(daily_bars(closes)).unwrap()
}

pub fn closes_from(values: &[i64]) -> Vec<Decimal> {
    values.iter().map(|&v| Decimal::from(v)).collect()
}

/// 100 up to 200 in steps of 5, then back down to 100.
pub fn rise_and_fall() -> Vec<Decimal> {
    let up = (0..=20).map(|i| 100 + 5 * i);
    let down = (21..=40).map(|i| 200 - 5 * (i - 20));
    up.chain(down).map(Decimal::from).collect()
}

pub fn daily_config() -> BacktestConfig {
    BacktestConfig::default()
}
