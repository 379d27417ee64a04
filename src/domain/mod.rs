//! Core simulation: series, indicators, strategies, the backtest loop and
//! its accounting.

pub mod error;
pub mod ohlcv;
pub mod resample;
pub mod indicator;
pub mod frame;
pub mod position;
pub mod ledger;
pub mod metrics;
pub mod strategy;
pub mod backtest;
pub mod sweep;
pub mod config_validation;
