//! Bucketed indicator frame.
//!
//! [`IndicatorFrame::prepare`] resamples a series, computes the A/B
//! indicator pair over bucket closes, forward-fills nulls and drops the
//! leading rows that have not warmed up. Only the close price flows into
//! the indicators and into trading decisions.
//!
//! Two ways of feeding a frame to the simulation exist:
//!
//! - **Batch** ([`IndicatorFrame::row_for`]): one frame over the whole
//!   series, looked up by each base bar's timestamp. A bar sees the
//!   indicator value of its own bucket, which includes closes later in that bucket. This is a
//!   lookahead bias, kept because it reproduces the historical results and
//!   costs one pass.
//! - **Causal** ([`IndicatorFrame::prepare_until`]): the frame is rebuilt
//!   from bars up to and including the evaluation bar, and only the latest
//!   row is used. No future bar can influence it.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;

use super::indicator::IndicatorSpec;
use super::ohlcv::{Bar, PriceSeries};
use super::resample::{resample, BucketSize};

/// One decision point: a timestamp, the close there, and both indicators.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameRow {
    pub timestamp: DateTime<Utc>,
    pub close: Decimal,
    pub a: f64,
    pub b: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndicatorFrame {
    rows: Vec<FrameRow>,
}

impl IndicatorFrame {
    /// Batch preparation over every bar of `series`.
    pub fn prepare(series: &PriceSeries, bucket: BucketSize, spec: &IndicatorSpec) -> Self {
        Self::from_bars(series.bars(), bucket, spec)
    }

    /// Causal preparation: only bars `0..=index` are visible.
    pub fn prepare_until(
        series: &PriceSeries,
        index: usize,
        bucket: BucketSize,
        spec: &IndicatorSpec,
    ) -> Self {
        let end = (index + 1).min(series.len());
        Self::from_bars(&series.bars()[..end], bucket, spec)
    }

    pub fn from_bars(bars: &[Bar], bucket: BucketSize, spec: &IndicatorSpec) -> Self {
        let buckets = resample(bars, bucket);
        if buckets.len() < spec.warmup() {
            return Self::default();
        }

        let closes: Vec<f64> = buckets
            .iter()
            .map(|b| b.close.to_f64().unwrap_or(f64::NAN))
            .collect();
        let (a, b) = spec.compute(&closes);
        let a = forward_fill(&finite(a));
        let b = forward_fill(&finite(b));

        let rows = buckets
            .iter()
            .zip(a.into_iter().zip(b))
            .filter_map(|(bucket, pair)| match pair {
                (Some(a), Some(b)) => Some(FrameRow {
                    timestamp: bucket.start,
                    close: bucket.close,
                    a,
                    b,
                }),
                _ => None,
            })
            .collect();

        Self { rows }
    }

    pub fn rows(&self) -> &[FrameRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn latest(&self) -> Option<&FrameRow> {
        self.rows.last()
    }

    /// Row of the latest bucket starting at or before `timestamp`.
    pub fn row_for(&self, timestamp: DateTime<Utc>) -> Option<&FrameRow> {
        let idx = self.rows.partition_point(|r| r.timestamp <= timestamp);
        idx.checked_sub(1).map(|i| &self.rows[i])
    }
}

fn finite(values: Vec<Option<f64>>) -> Vec<Option<f64>> {
    values
        .into_iter()
        .map(|v| v.filter(|x| x.is_finite()))
        .collect()
}

/// Replaces each null with the most recent earlier value. Leading nulls stay
/// null; values never propagate backwards.
pub fn forward_fill(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut last = None;
    values
        .iter()
        .map(|v| {
            if v.is_some() {
                last = *v;
            }
            last
        })
        .collect()
}
