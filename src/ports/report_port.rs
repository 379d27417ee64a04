//! Report generation port trait.

use std::io::Write;

use crate::domain::error::EngineError;
use crate::domain::ledger::Stats;
use crate::domain::metrics::StatsSummary;

/// Port for rendering the result of a run.
pub trait ReportPort {
    fn write(
        &self,
        stats: &Stats,
        summary: &StatsSummary,
        out: &mut dyn Write,
    ) -> Result<(), EngineError>;
}
