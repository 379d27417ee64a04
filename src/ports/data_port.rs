//! Price history port trait.

use crate::domain::error::EngineError;
use crate::domain::ohlcv::PriceSeries;

pub trait DataPort {
    /// Loads a validated, strictly ordered series.
    fn load(&self) -> Result<PriceSeries, EngineError>;
}
