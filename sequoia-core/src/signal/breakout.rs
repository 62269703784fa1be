//! N-day breakout: last close above the highest high of the previous `lookback` bars.

use super::indicators::max;
use super::{require_bars, Signal, SignalError};
use crate::domain::PriceSeries;

#[derive(Debug, Clone)]
pub struct Breakout {
    pub lookback: usize,
}

impl Breakout {
    pub fn new(lookback: usize) -> Self {
        Self { lookback }
    }
}

impl Default for Breakout {
    fn default() -> Self {
        Self::new(60)
    }
}

impl Signal for Breakout {
    fn name(&self) -> &str {
        "breakout"
    }

    fn warmup_bars(&self) -> usize {
        self.lookback + 1
    }

    fn evaluate(&self, series: &PriceSeries) -> Result<bool, SignalError> {
        require_bars(series, self.warmup_bars())?;
        let bars = series.bars();
        let n = bars.len();
        let highs: Vec<f64> = bars[n - 1 - self.lookback..n - 1].iter().map(|b| b.high).collect();
        let ceiling = max(&highs).ok_or_else(|| SignalError::Invalid("empty lookback window".into()))?;
        Ok(series.last().close > ceiling)
    }
}
