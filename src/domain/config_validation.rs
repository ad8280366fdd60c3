//! Configuration validation.
//!
//! Checks the `[backtest]` and `[algorithm]` sections before anything runs.
//! Missing keys fall back to their defaults; only present but unusable values
//! are rejected.

use crate::domain::error::TraderError;
use crate::domain::symbol::Resolution;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

const BACKTEST_NUMBERS: [&str; 4] = [
    "commission_per_trade",
    "commission_pct",
    "slippage_pct",
    "risk_free_rate",
];
const ALGORITHM_INTEGERS: [&str; 2] = ["fast_period", "slow_period"];
const ALGORITHM_NUMBERS: [&str; 2] = ["cash", "allocation"];

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), TraderError> {
    for key in BACKTEST_NUMBERS {
        number(config, "backtest", key)?;
    }
    non_negative(config, "backtest", "commission_per_trade")?;
    non_negative(config, "backtest", "commission_pct")?;
    non_negative(config, "backtest", "slippage_pct")?;

    let rate = config.get_double("backtest", "risk_free_rate", 0.0);
    if !(0.0..1.0).contains(&rate) {
        return Err(invalid("backtest", "risk_free_rate", "risk_free_rate must be between 0 and 1"));
    }
    Ok(())
}

pub fn validate_algorithm_config(config: &dyn ConfigPort) -> Result<(), TraderError> {
    for key in ["index", "equity"] {
        if let Some(ticker) = config.get_string("algorithm", key) {
            if ticker.trim().is_empty() {
                return Err(invalid("algorithm", key, "ticker must not be empty"));
            }
        }
    }

    if let Some(resolution) = config.get_string("algorithm", "resolution") {
        let resolution: Resolution = resolution.parse()?;
        if resolution == Resolution::Tick {
            return Err(invalid("algorithm", "resolution", "tick resolution is not supported"));
        }
    }

    for key in ALGORITHM_INTEGERS {
        integer(config, "algorithm", key)?;
    }
    for key in ALGORITHM_NUMBERS {
        number(config, "algorithm", key)?;
    }

    for key in ALGORITHM_INTEGERS {
        if config.get_int("algorithm", key, 1) < 1 {
            return Err(invalid("algorithm", key, "period must be at least 1"));
        }
    }

    if config.get_double("algorithm", "cash", 1.0) <= 0.0 {
        return Err(invalid("algorithm", "cash", "cash must be positive"));
    }

    let allocation = config.get_double("algorithm", "allocation", 1.0);
    if !(allocation > 0.0 && allocation <= 1.0) {
        return Err(invalid("algorithm", "allocation", "allocation must be in (0, 1]"));
    }

    let start = parse_date(config, "start_date")?;
    let end = parse_date(config, "end_date")?;
    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            return Err(invalid("algorithm", "start_date", "start_date must not be after end_date"));
        }
    }
    Ok(())
}

/// Parse an optional `[algorithm]` date in `YYYY-MM-DD` form.
pub fn parse_date(config: &dyn ConfigPort, key: &str) -> Result<Option<NaiveDate>, TraderError> {
    match config.get_string("algorithm", key) {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Some)
            .map_err(|_| {
                invalid(
                    "algorithm",
                    key,
                    &format!("invalid {} format, expected YYYY-MM-DD", key),
                )
            }),
    }
}

/// Present numeric keys must parse.
fn integer(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), TraderError> {
    match config.get_string(section, key) {
        Some(raw) if raw.trim().parse::<i64>().is_err() => {
            Err(invalid(section, key, &format!("{} must be an integer, got '{}'", key, raw)))
        }
        _ => Ok(()),
    }
}

fn number(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), TraderError> {
    match config.get_string(section, key) {
        Some(raw) if !raw.trim().parse::<f64>().is_ok_and(f64::is_finite) => {
            Err(invalid(section, key, &format!("{} must be a number, got '{}'", key, raw)))
        }
        _ => Ok(()),
    }
}

fn non_negative(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), TraderError> {
    if config.get_double(section, key, 0.0) < 0.0 {
        return Err(invalid(section, key, &format!("{} must be non-negative", key)));
    }
    Ok(())
}

fn invalid(section: &str, key: &str, reason: &str) -> TraderError {
    TraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
