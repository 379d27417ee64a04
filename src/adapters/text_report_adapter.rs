//! Plain text report adapter implementing ReportPort.
//!
//! Prints the sell log, the per-bucket breakdown and the summary.

use std::io::Write;

use crate::domain::error::EngineError;
use crate::domain::ledger::Stats;
use crate::domain::metrics::StatsSummary;
use crate::ports::report_port::ReportPort;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct TextReportAdapter {
    decimals: usize,
}

impl TextReportAdapter {
    pub fn new() -> Self {
        Self { decimals: 2 }
    }

    /// Eight decimals for the small coin-to-coin wallet.
    pub fn coin_to_coin() -> Self {
        Self { decimals: 8 }
    }
}

impl Default for TextReportAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportPort for TextReportAdapter {
    fn write(
        &self,
        stats: &Stats,
        summary: &StatsSummary,
        out: &mut dyn Write,
    ) -> Result<(), EngineError> {
        let dp = self.decimals;

        writeln!(out, "Sell log")?;
        if stats.sell_log().is_empty() {
            writeln!(out, "  (no trades)")?;
        }
        for trade in stats.sell_log() {
            writeln!(
                out,
                "{} SELL: {:.dp$} wallet={:.dp$} bought={:.dp$} profit={:.dp$} fee={:.dp$} p={:.2}%",
                trade.exit_time.format(TIME_FORMAT),
                trade.exit_price,
                trade.wallet_after,
                trade.entry_price,
                trade.net_profit,
                trade.fee,
                trade.percent_return,
            )?;
        }

        writeln!(out)?;
        writeln!(out, "Breakdown by {}", stats.granularity)?;
        for (key, bucket) in &stats.per_bucket {
            writeln!(
                out,
                "{} {:.dp$} {:.2}% fee={:.dp$} ({} trades)",
                key,
                bucket.net_profit_sum(),
                bucket.percent_sum(),
                bucket.fee_sum(),
                bucket.trade_count(),
            )?;
        }

        writeln!(out)?;
        writeln!(out, "mean-p: {:.2}%", summary.mean_trade_percent)?;
        writeln!(out, "median-p: {:.2}%", summary.median_trade_percent)?;
        writeln!(
            out,
            "mean-{}-p: {:.2}%",
            stats.granularity, summary.mean_bucket_percent
        )?;
        writeln!(
            out,
            "median-{}-p: {:.2}%",
            stats.granularity, summary.median_bucket_percent
        )?;
        writeln!(
            out,
            "wins: {} losses: {} win-rate: {:.2}%",
            summary.wins, summary.losses, summary.win_rate
        )?;
        writeln!(out, "total fee: {:.dp$}", summary.total_fee)?;
        writeln!(
            out,
            "wallet: {:.dp$} -> {:.dp$} ({:.2}%)",
            stats.initial_wallet, summary.final_wallet, summary.total_return_percent
        )?;
        writeln!(out, "bars processed: {}", stats.bars_processed)?;
        if let Some(halt) = stats.halt {
            writeln!(out, "halted: {halt}")?;
        }
        Ok(())
    }
}
