//! Summary statistics over a finished run.

use rust_decimal::Decimal;
use serde::Serialize;

use super::ledger::{saturating_sum, Stats};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSummary {
    pub trades: usize,
    pub wins: usize,
    pub losses: usize,
    /// Wins as a percentage of all trades.
    pub win_rate: Decimal,
    pub total_fee: Decimal,
    pub total_percent: Decimal,
    pub total_net_profit: Decimal,
    pub mean_trade_percent: Decimal,
    pub median_trade_percent: Decimal,
    /// Mean of the per-bucket percent sums.
    pub mean_bucket_percent: Decimal,
    pub median_bucket_percent: Decimal,
    pub final_wallet: Decimal,
    pub total_return_percent: Decimal,
}

impl StatsSummary {
    pub fn compute(stats: &Stats) -> Self {
        let trades = stats.sell_log();
        let count = trades.len();

        let trade_percents: Vec<Decimal> = trades.iter().map(|t| t.percent_return).collect();
        let bucket_percents: Vec<Decimal> =
            stats.per_bucket.values().map(|b| b.percent_sum()).collect();

        let win_rate = if count > 0 {
            Decimal::from(stats.wins) * Decimal::ONE_HUNDRED / Decimal::from(count)
        } else {
            Decimal::ZERO
        };

        let total_return_percent = stats
            .wallet
            .checked_sub(stats.initial_wallet)
            .and_then(|gain| gain.checked_div(stats.initial_wallet))
            .and_then(|r| r.checked_mul(Decimal::ONE_HUNDRED))
            .unwrap_or(Decimal::ZERO);

        StatsSummary {
            trades: count,
            wins: stats.wins,
            losses: stats.losses,
            win_rate,
            total_fee: saturating_sum(trades.iter().map(|t| &t.fee)),
            total_percent: saturating_sum(&trade_percents),
            total_net_profit: saturating_sum(trades.iter().map(|t| &t.net_profit)),
            mean_trade_percent: mean(&trade_percents),
            median_trade_percent: median(&trade_percents),
            mean_bucket_percent: mean(&bucket_percents),
            median_bucket_percent: median(&bucket_percents),
            final_wallet: stats.wallet,
            total_return_percent,
        }
    }
}

fn mean(values: &[Decimal]) -> Decimal {
    if values.is_empty() {
        return Decimal::ZERO;
    }
    saturating_sum(values) / Decimal::from(values.len())
}

fn median(values: &[Decimal]) -> Decimal {
    if values.is_empty() {
        return Decimal::ZERO;
    }
    let mut sorted = values.to_vec();
    sorted.sort();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] / Decimal::TWO).saturating_add(sorted[mid] / Decimal::TWO)
    } else {
        sorted[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ledger::{Granularity, TradeLedger};
    use crate::domain::position::Position;
    use chrono::{DateTime, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn ledger_with(trades: &[(i64, i64, DateTime<Utc>)]) -> Stats {
        let mut ledger = TradeLedger::new(dec!(1000), dec!(0.006), Granularity::Month);
        for &(entry, exit, when) in trades {
            let pos = Position {
                entry_price: Decimal::from(entry),
                entry_time: when,
            };
            ledger.close(&pos, when, Decimal::from(exit)).unwrap();
        }
        ledger.into_stats()
    }

    #[test]
    fn empty_stats_give_zeros() {
        let summary = StatsSummary::compute(&ledger_with(&[]));
        assert_eq!(summary.trades, 0);
        assert_eq!(summary.win_rate, Decimal::ZERO);
        assert_eq!(summary.mean_trade_percent, Decimal::ZERO);
        assert_eq!(summary.median_bucket_percent, Decimal::ZERO);
        assert_eq!(summary.final_wallet, dec!(1000));
        assert_eq!(summary.total_return_percent, Decimal::ZERO);
    }

    #[test]
    fn single_trade() {
        let summary = StatsSummary::compute(&ledger_with(&[(100, 110, at(2021, 1, 5))]));
        assert_eq!(summary.trades, 1);
        assert_eq!(summary.wins, 1);
        assert_eq!(summary.win_rate, dec!(100));
        assert_eq!(summary.total_fee, dec!(6));
        assert_eq!(summary.total_net_profit, dec!(94));
        assert_eq!(summary.final_wallet, dec!(1094));
        assert_eq!(summary.total_return_percent, dec!(9.4));
    }

    #[test]
    fn means_and_medians() {
        let stats = ledger_with(&[
            (100, 110, at(2021, 1, 5)),
            (100, 90, at(2021, 1, 9)),
            (100, 130, at(2021, 2, 1)),
            (100, 104, at(2021, 3, 1)),
        ]);
        let summary = StatsSummary::compute(&stats);

        // Trade percents 10, -10, 30, 4.
        assert_eq!(summary.total_percent, dec!(34));
        assert_eq!(summary.mean_trade_percent, dec!(8.5));
        assert_eq!(summary.median_trade_percent, dec!(7));
        // Bucket sums: Jan 0, Feb 30, Mar 4.
        assert_eq!(summary.median_bucket_percent, dec!(4));
        assert_eq!(summary.wins, 3);
        assert_eq!(summary.losses, 1);
        assert_eq!(summary.win_rate, dec!(75));
    }

    #[test]
    fn median_odd_and_even() {
        assert_eq!(median(&[dec!(3), dec!(1), dec!(2)]), dec!(2));
        assert_eq!(median(&[dec!(4), dec!(1), dec!(3), dec!(2)]), dec!(2.5));
    }

    #[test]
    fn extreme_values_do_not_overflow() {
        assert_eq!(median(&[Decimal::MAX, Decimal::MAX]), Decimal::MAX);
        assert_eq!(mean(&[Decimal::MAX, Decimal::MAX]), Decimal::MAX / Decimal::TWO);

        let mut stats = ledger_with(&[]);
        stats.initial_wallet = dec!(0.0000000001);
        stats.wallet = Decimal::MAX;
        assert_eq!(StatsSummary::compute(&stats).total_return_percent, Decimal::ZERO);
    }
}
