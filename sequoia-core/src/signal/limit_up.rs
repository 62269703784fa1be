//! Limit-up close: last change at or above `threshold_pct`.

use super::{require_bars, Signal, SignalError};
use crate::domain::PriceSeries;

#[derive(Debug, Clone)]
pub struct LimitUp {
    pub threshold_pct: f64,
}

impl LimitUp {
    pub fn new(threshold_pct: f64) -> Self {
        Self { threshold_pct }
    }
}

impl Default for LimitUp {
    /// Main-board daily band is 10%; 9.9 absorbs tick rounding.
    fn default() -> Self {
        Self::new(9.9)
    }
}

impl Signal for LimitUp {
    fn name(&self) -> &str {
        "limit_up"
    }

    fn warmup_bars(&self) -> usize {
        2
    }

    fn evaluate(&self, series: &PriceSeries) -> Result<bool, SignalError> {
        require_bars(series, self.warmup_bars())?;
        let change = series
            .last_change_pct()
            .ok_or_else(|| SignalError::Invalid("no previous close".into()))?;
        Ok(change >= self.threshold_pct)
    }
}
