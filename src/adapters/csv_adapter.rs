//! CSV price history adapter.
//!
//! Reads `timestamp,low,high,open,close,volume` rows (unix seconds, any
//! column order, quoted or not). Rows with a missing or non-numeric field
//! are dropped with a warning; ordering problems are fatal.

use crate::domain::error::EngineError;
use crate::domain::ohlcv::{Bar, PriceSeries};
use crate::ports::data_port::DataPort;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::fs::File;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{info, warn};

const COLUMNS: [&str; 6] = ["timestamp", "low", "high", "open", "close", "volume"];

pub struct CsvAdapter {
    path: PathBuf,
    start: Option<i64>,
    end: Option<i64>,
}

impl CsvAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            start: None,
            end: None,
        }
    }

    /// Keeps only rows with `start <= timestamp <= end` (unix seconds).
    pub fn with_window(mut self, start: Option<i64>, end: Option<i64>) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    fn in_window(&self, secs: i64) -> bool {
        self.start.is_none_or(|s| secs >= s) && self.end.is_none_or(|e| secs <= e)
    }
}

/// Header positions of the six required columns.
fn column_indices(headers: &csv::StringRecord) -> Result<[usize; 6], EngineError> {
    let mut indices = [0; 6];
    for (slot, name) in indices.iter_mut().zip(COLUMNS) {
        *slot = headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
            .ok_or_else(|| EngineError::MalformedInput {
                line: 1,
                reason: format!("missing {name} column"),
            })?;
    }
    Ok(indices)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    let secs = raw
        .parse::<i64>()
        .ok()
        .or_else(|| Decimal::from_str(raw).ok().and_then(|d| d.trunc().to_i64()))?;
    DateTime::from_timestamp(secs, 0)
}

fn field<'r>(record: &'r csv::StringRecord, idx: &[usize; 6], i: usize) -> Result<&'r str, String> {
    record
        .get(idx[i])
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| format!("missing {}", COLUMNS[i]))
}

fn number(record: &csv::StringRecord, idx: &[usize; 6], i: usize) -> Result<Decimal, String> {
    let raw = field(record, idx, i)?;
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .map_err(|_| format!("invalid {} value '{raw}'", COLUMNS[i]))
}

fn parse_row(record: &csv::StringRecord, idx: &[usize; 6]) -> Result<Bar, String> {
    let raw_ts = field(record, idx, 0)?;
    let timestamp =
        parse_timestamp(raw_ts).ok_or_else(|| format!("invalid timestamp '{raw_ts}'"))?;

    Ok(Bar {
        timestamp,
        low: number(record, idx, 1)?,
        high: number(record, idx, 2)?,
        open: number(record, idx, 3)?,
        close: number(record, idx, 4)?,
        volume: number(record, idx, 5)?,
    })
}

impl DataPort for CsvAdapter {
    fn load(&self) -> Result<PriceSeries, EngineError> {
        let file = File::open(&self.path)?;
        let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(file);

        let headers = rdr.headers().map_err(|e| EngineError::MalformedInput {
            line: 1,
            reason: format!("CSV header error: {e}"),
        })?;
        let idx = column_indices(headers)?;

        let mut bars = Vec::new();
        let mut dropped = 0usize;

        for result in rdr.records() {
            let record = match result {
                Ok(r) => r,
                Err(e) => {
                    let line = e.position().map(|p| p.line()).unwrap_or(0);
                    warn!(line, error = %e, "dropping unreadable row");
                    dropped += 1;
                    continue;
                }
            };
            let line = record.position().map(|p| p.line()).unwrap_or(0);

            match parse_row(&record, &idx) {
                Ok(bar) => {
                    if self.in_window(bar.timestamp.timestamp()) {
                        bars.push(bar);
                    }
                }
                Err(reason) => {
                    warn!(line, %reason, "dropping malformed row");
                    dropped += 1;
                }
            }
        }

        info!(
            path = %self.path.display(),
            bars = bars.len(),
            dropped,
            "loaded price history"
        );

        if bars.is_empty() {
            return Err(EngineError::EmptySeries);
        }
        PriceSeries::new(bars)
    }
}
