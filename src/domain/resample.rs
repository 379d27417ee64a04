//! Fixed-duration bucketing of bars.
//!
//! Buckets are epoch aligned and labelled by their start instant. Only
//! buckets that contain at least one bar are produced.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

use super::error::EngineError;
use super::ohlcv::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BucketSize {
    seconds: i64,
}

impl BucketSize {
    pub const DAILY: BucketSize = BucketSize { seconds: 86_400 };
    pub const HOURLY: BucketSize = BucketSize { seconds: 3_600 };

    pub fn from_seconds(seconds: i64) -> Option<Self> {
        (seconds > 0).then_some(Self { seconds })
    }

    pub fn seconds(&self) -> i64 {
        self.seconds
    }

    /// Start of the bucket that contains `timestamp`.
    pub fn bucket_start(&self, timestamp: DateTime<Utc>) -> DateTime<Utc> {
        let start = timestamp.timestamp().div_euclid(self.seconds) * self.seconds;
        DateTime::from_timestamp(start, 0).unwrap_or(timestamp)
    }
}

impl Default for BucketSize {
    fn default() -> Self {
        BucketSize::DAILY
    }
}

/// Parses pandas-style offsets: `1D`, `4h`, `15min`, `15T`, `30s`.
impl FromStr for BucketSize {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
        let (count, unit) = s.split_at(split);

        let count: i64 = if count.is_empty() {
            1
        } else {
            count.parse().map_err(|_| {
                EngineError::invalid("backtest", "resample", format!("bad count in '{s}'"))
            })?
        };

        let unit_seconds = match unit {
            "D" | "d" => 86_400,
            "h" | "H" => 3_600,
            "min" | "T" => 60,
            "s" | "S" => 1,
            _ => {
                return Err(EngineError::invalid(
                    "backtest",
                    "resample",
                    format!("unsupported unit in '{s}' (use D, h, min or s)"),
                ));
            }
        };

        count
            .checked_mul(unit_seconds)
            .and_then(BucketSize::from_seconds)
            .ok_or_else(|| {
                EngineError::invalid(
                    "backtest",
                    "resample",
                    format!("'{s}' is not a positive duration"),
                )
            })
    }
}

impl fmt::Display for BucketSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.seconds;
        if s % 86_400 == 0 {
            write!(f, "{}D", s / 86_400)
        } else if s % 3_600 == 0 {
            write!(f, "{}h", s / 3_600)
        } else if s % 60 == 0 {
            write!(f, "{}min", s / 60)
        } else {
            write!(f, "{}s", s)
        }
    }
}

/// OHLC aggregate of the bars falling in one bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    pub start: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub bar_count: usize,
}

impl Bucket {
    fn open_with(start: DateTime<Utc>, bar: &Bar) -> Self {
        Bucket {
            start,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
            bar_count: 1,
        }
    }

    fn absorb(&mut self, bar: &Bar) {
        self.high = self.high.max(bar.high);
        self.low = self.low.min(bar.low);
        self.close = bar.close;
        self.volume = self.volume.saturating_add(bar.volume);
        self.bar_count += 1;
    }
}

/// Groups chronologically ordered bars into buckets of `size`.
pub fn resample(bars: &[Bar], size: BucketSize) -> Vec<Bucket> {
    let mut buckets: Vec<Bucket> = Vec::new();

    for bar in bars {
        let start = size.bucket_start(bar.timestamp);
        match buckets.last_mut() {
            Some(current) if current.start == start => current.absorb(bar),
            _ => buckets.push(Bucket::open_with(start, bar)),
        }
    }

    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn bar(secs: i64, low: Decimal, high: Decimal, close: Decimal) -> Bar {
        Bar {
            timestamp: ts(secs),
            open: close,
            high,
            low,
            close,
            volume: dec!(1),
        }
    }

    #[test]
    fn huge_volumes_saturate() {
        let mut first = bar(0, dec!(1), dec!(1), dec!(1));
        first.volume = Decimal::MAX;
        let mut second = bar(60, dec!(1), dec!(1), dec!(1));
        second.volume = Decimal::MAX;
        let buckets = resample(&[first, second], BucketSize::DAILY);
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].volume, Decimal::MAX);
        assert_eq!(buckets[0].bar_count, 2);
    }

    #[test]
    fn parse_offsets() {
        assert_eq!("1D".parse::<BucketSize>().unwrap().seconds(), 86_400);
        assert_eq!("4h".parse::<BucketSize>().unwrap().seconds(), 14_400);
        assert_eq!("1H".parse::<BucketSize>().unwrap().seconds(), 3_600);
        assert_eq!("15min".parse::<BucketSize>().unwrap().seconds(), 900);
        assert_eq!("15T".parse::<BucketSize>().unwrap().seconds(), 900);
        assert_eq!("30s".parse::<BucketSize>().unwrap().seconds(), 30);
        assert_eq!("D".parse::<BucketSize>().unwrap(), BucketSize::DAILY);
    }

    #[test]
    fn parse_rejects_bad_offsets() {
        assert!("0D".parse::<BucketSize>().is_err());
        assert!("1Y".parse::<BucketSize>().is_err());
        assert!("".parse::<BucketSize>().is_err());
        assert!("x1D".parse::<BucketSize>().is_err());
    }

    #[test]
    fn display_round_trips_common_sizes() {
        assert_eq!(BucketSize::DAILY.to_string(), "1D");
        assert_eq!(BucketSize::HOURLY.to_string(), "1h");
        assert_eq!(BucketSize::from_seconds(900).unwrap().to_string(), "15min");
        assert_eq!(BucketSize::from_seconds(45).unwrap().to_string(), "45s");
    }

    #[test]
    fn bucket_start_is_epoch_aligned() {
        // 2021-01-02 13:45:00 UTC
        let t = ts(1_609_595_100);
        assert_eq!(BucketSize::DAILY.bucket_start(t), ts(1_609_545_600));
        assert_eq!(BucketSize::HOURLY.bucket_start(t), ts(1_609_592_400));
    }

    #[test]
    fn resample_aggregates_ohlc() {
        let bars = vec![
            bar(0, dec!(9), dec!(11), dec!(10)),
            bar(3_600, dec!(8), dec!(15), dec!(12)),
            bar(86_400, dec!(20), dec!(22), dec!(21)),
        ];
        let buckets = resample(&bars, BucketSize::DAILY);

        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].start, ts(0));
        assert_eq!(buckets[0].open, dec!(10));
        assert_eq!(buckets[0].high, dec!(15));
        assert_eq!(buckets[0].low, dec!(8));
        assert_eq!(buckets[0].close, dec!(12));
        assert_eq!(buckets[0].volume, dec!(2));
        assert_eq!(buckets[0].bar_count, 2);
        assert_eq!(buckets[1].close, dec!(21));
    }

    #[test]
    fn resample_skips_empty_buckets() {
        let bars = vec![
            bar(0, dec!(1), dec!(1), dec!(1)),
            bar(3 * 86_400, dec!(2), dec!(2), dec!(2)),
        ];
        let buckets = resample(&bars, BucketSize::DAILY);
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[1].start, ts(3 * 86_400));
    }

    #[test]
    fn resample_empty_input() {
        assert!(resample(&[], BucketSize::DAILY).is_empty());
    }
}
