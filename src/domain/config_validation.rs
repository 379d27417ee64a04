//! Configuration validation.
//!
//! Every key is optional; a key that is present must hold a usable value.

use crate::domain::error::EngineError;
use crate::domain::ledger::Granularity;
use crate::domain::resample::BucketSize;
use crate::domain::strategy;
use crate::ports::config_port::ConfigPort;
use rust_decimal::Decimal;
use std::str::FromStr;

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), EngineError> {
    validate_strategy(config)?;
    validate_resample(config)?;
    validate_lengths(config)?;
    validate_fee_rate(config)?;
    validate_wallet(config)?;
    validate_ruin_threshold(config)?;
    validate_cadence(config)?;
    validate_granularity(config)?;
    validate_c2c(config)?;
    Ok(())
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), EngineError> {
    let start = parse_unix(config, "start")?;
    let end = parse_unix(config, "end")?;
    if matches!((start, end), (Some(start), Some(end)) if start > end) {
        return Err(EngineError::invalid(
            "data",
            "start",
            "start must not be after end",
        ));
    }
    Ok(())
}

fn value(config: &dyn ConfigPort, section: &str, key: &str) -> Option<String> {
    config
        .get_string(section, key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate_strategy(config: &dyn ConfigPort) -> Result<(), EngineError> {
    if let Some(name) = value(config, "backtest", "strategy") {
        let known = strategy::names();
        if !known.contains(&name.to_lowercase().as_str()) {
            return Err(EngineError::UnknownStrategy {
                name,
                known: known.join(", "),
            });
        }
    }
    Ok(())
}

fn validate_resample(config: &dyn ConfigPort) -> Result<(), EngineError> {
    if let Some(v) = value(config, "backtest", "resample") {
        v.parse::<BucketSize>()?;
    }
    Ok(())
}

fn validate_lengths(config: &dyn ConfigPort) -> Result<(), EngineError> {
    for key in ["length_a", "length_b"] {
        positive_int(config, key)?;
    }
    Ok(())
}

fn validate_cadence(config: &dyn ConfigPort) -> Result<(), EngineError> {
    positive_int(config, "cadence").map(|_| ())
}

fn positive_int(config: &dyn ConfigPort, key: &str) -> Result<Option<usize>, EngineError> {
    let Some(v) = value(config, "backtest", key) else {
        return Ok(None);
    };
    match v.parse::<usize>() {
        Ok(n) if n > 0 => Ok(Some(n)),
        _ => Err(EngineError::invalid(
            "backtest",
            key,
            format!("{key} must be a positive integer"),
        )),
    }
}

fn decimal(config: &dyn ConfigPort, key: &str) -> Result<Option<Decimal>, EngineError> {
    value(config, "backtest", key)
        .map(|v| {
            Decimal::from_str(&v).map_err(|_| {
                EngineError::invalid("backtest", key, format!("'{v}' is not a number"))
            })
        })
        .transpose()
}

fn validate_fee_rate(config: &dyn ConfigPort) -> Result<(), EngineError> {
    let fee = decimal(config, "fee_rate")?;
    if fee.is_some_and(|fee| fee < Decimal::ZERO || fee >= Decimal::ONE) {
        return Err(EngineError::invalid(
            "backtest",
            "fee_rate",
            "fee_rate must be between 0 and 1",
        ));
    }
    Ok(())
}

fn validate_wallet(config: &dyn ConfigPort) -> Result<(), EngineError> {
    let wallet = decimal(config, "initial_wallet")?;
    if wallet.is_some_and(|wallet| wallet <= Decimal::ZERO) {
        return Err(EngineError::invalid(
            "backtest",
            "initial_wallet",
            "initial_wallet must be positive",
        ));
    }
    Ok(())
}

fn validate_ruin_threshold(config: &dyn ConfigPort) -> Result<(), EngineError> {
    let threshold = decimal(config, "ruin_threshold")?;
    if threshold.is_some_and(|threshold| threshold < Decimal::ZERO) {
        return Err(EngineError::invalid(
            "backtest",
            "ruin_threshold",
            "ruin_threshold must be non-negative",
        ));
    }
    Ok(())
}

fn validate_granularity(config: &dyn ConfigPort) -> Result<(), EngineError> {
    if let Some(v) = value(config, "backtest", "granularity") {
        v.parse::<Granularity>()?;
    }
    Ok(())
}

fn validate_c2c(config: &dyn ConfigPort) -> Result<(), EngineError> {
    if let Some(v) = value(config, "backtest", "c2c") {
        let ok = matches!(
            v.to_lowercase().as_str(),
            "true" | "yes" | "1" | "false" | "no" | "0"
        );
        if !ok {
            return Err(EngineError::invalid(
                "backtest",
                "c2c",
                "c2c must be true or false",
            ));
        }
    }
    Ok(())
}

fn parse_unix(config: &dyn ConfigPort, key: &str) -> Result<Option<i64>, EngineError> {
    value(config, "data", key)
        .map(|v| {
            v.parse::<i64>().map_err(|_| {
                EngineError::invalid("data", key, format!("{key} must be unix seconds"))
            })
        })
        .transpose()
}
