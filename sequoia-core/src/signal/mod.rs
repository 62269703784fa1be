//! Signal capability — a predicate over a price series.
//!
//! Signals see only the series, never run state. A signal that cannot decide
//! returns a [`SignalError`]; the scan loop isolates it to that one symbol.

pub mod breakout;
pub mod indicators;
pub mod limit_up;
pub mod ma_crossover;
pub mod registry;
pub mod volume_surge;

use crate::domain::PriceSeries;
use thiserror::Error;

pub use breakout::Breakout;
pub use limit_up::LimitUp;
pub use ma_crossover::MaCrossover;
pub use registry::{create_signal, create_signals, RegistryError, SignalSpec, SIGNAL_NAMES};
pub use volume_surge::VolumeSurge;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SignalError {
    #[error("insufficient history: need {needed} bars, got {got}")]
    InsufficientHistory { needed: usize, got: usize },

    #[error("invalid input: {0}")]
    Invalid(String),
}

pub trait Signal: Send + Sync {
    /// Registry name, e.g. `"ma_crossover"`.
    fn name(&self) -> &str;

    /// Bars required before `evaluate` can answer.
    fn warmup_bars(&self) -> usize;

    /// Whether the last bar of `series` triggers.
    fn evaluate(&self, series: &PriceSeries) -> Result<bool, SignalError>;
}

/// Fail with `InsufficientHistory` unless `series` has at least `needed` bars.
pub(crate) fn require_bars(series: &PriceSeries, needed: usize) -> Result<(), SignalError> {
    if series.len() < needed {
        return Err(SignalError::InsufficientHistory {
            needed,
            got: series.len(),
        });
    }
    Ok(())
}
