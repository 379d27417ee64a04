//! Closed-trade accounting and calendar-bucketed statistics.
//!
//! The fee is one flat deduction per round trip, taken from the percentage
//! return before it is scaled by the pre-trade wallet:
//!
//! ```text
//! profit       = wallet_before * (percent / 100 - fee_rate)
//! wallet_after = wallet_before + profit
//! ```

use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::error::EngineError;
use super::position::Position;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub percent_return: Decimal,
    pub fee: Decimal,
    pub net_profit: Decimal,
    pub wallet_after: Decimal,
}

impl Trade {
    pub fn is_win(&self) -> bool {
        self.net_profit > Decimal::ZERO
    }
}

/// Settles one round trip against `wallet_before`.
///
/// A zero entry price yields a zero percent return. Returns `None` when any
/// amount leaves the range of `Decimal`.
pub fn close_trade(
    entry_price: Decimal,
    exit_price: Decimal,
    entry_time: DateTime<Utc>,
    exit_time: DateTime<Utc>,
    wallet_before: Decimal,
    fee_rate: Decimal,
) -> Option<Trade> {
    let percent_return = if entry_price.is_zero() {
        Decimal::ZERO
    } else {
        exit_price
            .checked_sub(entry_price)?
            .checked_div(entry_price)?
            .checked_mul(Decimal::ONE_HUNDRED)?
    };
    let fee = wallet_before.checked_mul(fee_rate)?;
    let rate = (percent_return / Decimal::ONE_HUNDRED).checked_sub(fee_rate)?;
    let net_profit = wallet_before.checked_mul(rate)?;
    let wallet_after = wallet_before.checked_add(net_profit)?;

    Some(Trade {
        entry_time,
        exit_time,
        entry_price,
        exit_price,
        percent_return,
        fee,
        net_profit,
        wallet_after,
    })
}

/// Sum that pins at the `Decimal` bounds instead of overflowing.
pub(crate) fn saturating_sum<'a>(values: impl IntoIterator<Item = &'a Decimal>) -> Decimal {
    values
        .into_iter()
        .fold(Decimal::ZERO, |acc, v| acc.saturating_add(*v))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    #[default]
    Month,
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Granularity::Day => write!(f, "day"),
            Granularity::Month => write!(f, "month"),
        }
    }
}

impl FromStr for Granularity {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "day" | "daily" | "d" => Ok(Granularity::Day),
            "month" | "monthly" | "m" => Ok(Granularity::Month),
            other => Err(EngineError::invalid(
                "backtest",
                "granularity",
                format!("unknown granularity '{other}' (use day or month)"),
            )),
        }
    }
}

/// Calendar bucket derived from a trade's exit time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BucketKey {
    year: i32,
    month: u32,
    day: Option<u32>,
}

impl BucketKey {
    pub fn new(timestamp: DateTime<Utc>, granularity: Granularity) -> Self {
        let day = match granularity {
            Granularity::Day => Some(timestamp.day()),
            Granularity::Month => None,
        };
        BucketKey {
            year: timestamp.year(),
            month: timestamp.month(),
            day,
        }
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.day {
            Some(day) => write!(f, "{:04}-{:02}-{:02}", self.year, self.month, day),
            None => write!(f, "{:04}-{:02}", self.year, self.month),
        }
    }
}

impl Serialize for BucketKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Per-trade metrics of every trade that closed in one bucket.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BucketEntry {
    pub fees: Vec<Decimal>,
    pub percents: Vec<Decimal>,
    pub net_profits: Vec<Decimal>,
}

impl BucketEntry {
    pub fn trade_count(&self) -> usize {
        self.percents.len()
    }

    pub fn percent_sum(&self) -> Decimal {
        saturating_sum(&self.percents)
    }

    pub fn net_profit_sum(&self) -> Decimal {
        saturating_sum(&self.net_profits)
    }

    pub fn fee_sum(&self) -> Decimal {
        saturating_sum(&self.fees)
    }
}

/// Why a run stopped before the end of the series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Halt {
    Ruin,
    Cancelled,
    /// The wallet left the representable range.
    Overflow,
}

impl fmt::Display for Halt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Halt::Ruin => write!(f, "ruin"),
            Halt::Cancelled => write!(f, "cancelled"),
            Halt::Overflow => write!(f, "overflow"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stats {
    pub initial_wallet: Decimal,
    pub wallet: Decimal,
    pub wins: usize,
    pub losses: usize,
    pub granularity: Granularity,
    pub per_bucket: BTreeMap<BucketKey, BucketEntry>,
    pub trades: Vec<Trade>,
    pub bars_processed: usize,
    pub halt: Option<Halt>,
}

impl Stats {
    pub fn new(initial_wallet: Decimal, granularity: Granularity) -> Self {
        Stats {
            initial_wallet,
            wallet: initial_wallet,
            wins: 0,
            losses: 0,
            granularity,
            per_bucket: BTreeMap::new(),
            trades: Vec::new(),
            bars_processed: 0,
            halt: None,
        }
    }

    /// Closed trades in chronological order.
    pub fn sell_log(&self) -> &[Trade] {
        &self.trades
    }

    pub fn trade_count(&self) -> usize {
        self.trades.len()
    }
}

/// Owns the [`Stats`] of one run; the only writer to them.
#[derive(Debug, Clone)]
pub struct TradeLedger {
    fee_rate: Decimal,
    stats: Stats,
}

impl TradeLedger {
    pub fn new(initial_wallet: Decimal, fee_rate: Decimal, granularity: Granularity) -> Self {
        TradeLedger {
            fee_rate,
            stats: Stats::new(initial_wallet, granularity),
        }
    }

    pub fn wallet(&self) -> Decimal {
        self.stats.wallet
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn into_stats(self) -> Stats {
        self.stats
    }

    /// Settles `position` at the current wallet and records the trade.
    /// Records nothing and returns `None` on overflow.
    pub fn close(
        &mut self,
        position: &Position,
        exit_time: DateTime<Utc>,
        exit_price: Decimal,
    ) -> Option<&Trade> {
        let trade = close_trade(
            position.entry_price,
            exit_price,
            position.entry_time,
            exit_time,
            self.stats.wallet,
            self.fee_rate,
        )?;
        Some(self.append(trade))
    }

    pub fn append(&mut self, trade: Trade) -> &Trade {
        let stats = &mut self.stats;
        stats.wallet = trade.wallet_after;
        if trade.is_win() {
            stats.wins += 1;
        } else {
            stats.losses += 1;
        }

        let entry = stats
            .per_bucket
            .entry(BucketKey::new(trade.exit_time, stats.granularity))
            .or_default();
        entry.fees.push(trade.fee);
        entry.percents.push(trade.percent_return);
        entry.net_profits.push(trade.net_profit);

        stats.trades.push(trade);
        &stats.trades[stats.trades.len() - 1]
    }

    pub fn count_bar(&mut self) {
        self.stats.bars_processed += 1;
    }

    pub fn halt(&mut self, reason: Halt) {
        self.stats.halt = Some(reason);
    }
}
