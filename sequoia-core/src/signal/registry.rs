//! Signal registry — a fixed lookup table from name to constructor.
//!
//! Parameters come from configuration as `name -> f64` pairs; anything not
//! given falls back to the signal's default.

use super::{Breakout, LimitUp, MaCrossover, Signal, VolumeSurge};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Every name [`create_signal`] accepts.
pub const SIGNAL_NAMES: &[&str] = &["ma_crossover", "breakout", "volume_surge", "limit_up"];

#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("unknown signal '{0}' (known: {known})", known = SIGNAL_NAMES.join(", "))]
    UnknownSignal(String),

    #[error("signal '{signal}': invalid parameter {param} = {value}")]
    InvalidParam {
        signal: String,
        param: &'static str,
        value: f64,
    },
}

/// A signal selection as written in the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalSpec {
    pub name: String,
    #[serde(default)]
    pub params: BTreeMap<String, f64>,
}

impl SignalSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: f64) -> Self {
        self.params.insert(key.to_string(), value);
        self
    }
}

fn param(spec: &SignalSpec, name: &str, default: f64) -> f64 {
    spec.params.get(name).copied().unwrap_or(default)
}

/// Longest accepted window, in bars.
pub const MAX_PERIOD: usize = 10_000;

/// A window length: finite and within `1..=MAX_PERIOD`.
fn param_period(spec: &SignalSpec, name: &'static str, default: usize) -> Result<usize, RegistryError> {
    let value = param(spec, name, default as f64);
    if !value.is_finite() || !(1.0..=MAX_PERIOD as f64).contains(&value) {
        return Err(invalid(spec, name, value));
    }
    Ok(value as usize)
}

fn param_finite(spec: &SignalSpec, name: &'static str, default: f64) -> Result<f64, RegistryError> {
    let value = param(spec, name, default);
    if !value.is_finite() {
        return Err(invalid(spec, name, value));
    }
    Ok(value)
}

fn invalid(spec: &SignalSpec, param: &'static str, value: f64) -> RegistryError {
    RegistryError::InvalidParam {
        signal: spec.name.clone(),
        param,
        value,
    }
}

pub fn create_signal(spec: &SignalSpec) -> Result<Box<dyn Signal>, RegistryError> {
    match spec.name.as_str() {
        "ma_crossover" => {
            let fast = param_period(spec, "fast_period", 5)?;
            let slow = param_period(spec, "slow_period", 20)?;
            if slow <= fast {
                return Err(invalid(spec, "slow_period", slow as f64));
            }
            Ok(Box::new(MaCrossover::new(fast, slow)))
        }
        "breakout" => {
            let lookback = param_period(spec, "lookback", 60)?;
            Ok(Box::new(Breakout::new(lookback)))
        }
        "volume_surge" => {
            let period = param_period(spec, "period", 20)?;
            let multiplier = param_finite(spec, "multiplier", 2.0)?;
            if multiplier <= 0.0 {
                return Err(invalid(spec, "multiplier", multiplier));
            }
            Ok(Box::new(VolumeSurge::new(period, multiplier)))
        }
        "limit_up" => {
            let threshold = param_finite(spec, "threshold_pct", 9.9)?;
            Ok(Box::new(LimitUp::new(threshold)))
        }
        other => Err(RegistryError::UnknownSignal(other.to_string())),
    }
}

/// Build a whole selection, failing on the first bad entry.
pub fn create_signals(specs: &[SignalSpec]) -> Result<Vec<Box<dyn Signal>>, RegistryError> {
    specs.iter().map(create_signal).collect()
}
