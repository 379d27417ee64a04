//! JSON report adapter implementing ReportPort.

use serde::Serialize;
use std::io::Write;

use crate::domain::error::EngineError;
use crate::domain::ledger::Stats;
use crate::domain::metrics::StatsSummary;
use crate::ports::report_port::ReportPort;

#[derive(Serialize)]
struct Document<'a> {
    summary: &'a StatsSummary,
    stats: &'a Stats,
}

#[derive(Debug, Default)]
pub struct JsonReportAdapter;

impl ReportPort for JsonReportAdapter {
    fn write(
        &self,
        stats: &Stats,
        summary: &StatsSummary,
        out: &mut dyn Write,
    ) -> Result<(), EngineError> {
        serde_json::to_writer_pretty(&mut *out, &Document { summary, stats }).map_err(|e| {
            EngineError::Report {
                reason: format!("failed to encode JSON report: {e}"),
            }
        })?;
        writeln!(out)?;
        Ok(())
    }
}
