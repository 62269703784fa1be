//! Golden cross: the fast SMA crosses above the slow SMA on the last bar.

use super::indicators::sma;
use super::{require_bars, Signal, SignalError};
use crate::domain::PriceSeries;

#[derive(Debug, Clone)]
pub struct MaCrossover {
    pub fast_period: usize,
    pub slow_period: usize,
}

impl MaCrossover {
    /// Callers guarantee `1 <= fast_period < slow_period`; the registry checks it.
    pub fn new(fast_period: usize, slow_period: usize) -> Self {
        Self {
            fast_period,
            slow_period,
        }
    }
}

impl Default for MaCrossover {
    fn default() -> Self {
        Self::new(5, 20)
    }
}

impl Signal for MaCrossover {
    fn name(&self) -> &str {
        "ma_crossover"
    }

    /// Slow window plus the previous bar for the cross comparison.
    fn warmup_bars(&self) -> usize {
        self.slow_period + 1
    }

    fn evaluate(&self, series: &PriceSeries) -> Result<bool, SignalError> {
        require_bars(series, self.warmup_bars())?;
        let closes = series.closes();
        let fast = sma(&closes, self.fast_period);
        let slow = sma(&closes, self.slow_period);

        let n = closes.len();
        let (f_prev, f_now) = (fast[n - 2], fast[n - 1]);
        let (s_prev, s_now) = (slow[n - 2], slow[n - 1]);
        if [f_prev, f_now, s_prev, s_now].iter().any(|v| v.is_nan()) {
            return Err(SignalError::Invalid("moving average undefined".into()));
        }
        Ok(f_prev <= s_prev && f_now > s_now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::testing::closes;

    #[test]
    fn fires_on_cross_up() {
        // Flat at 10, then a jump on the last bar pulls the 2-bar SMA over the 4-bar SMA.
        let series = closes(&[10.0, 10.0, 10.0, 10.0, 10.0, 14.0]);
        assert!(MaCrossover::new(2, 4).evaluate(&series).unwrap());
    }

    #[test]
    fn no_fire_when_already_above() {
        let series = closes(&[10.0, 11.0, 12.0, 13.0, 14.0, 15.0]);
        assert!(!MaCrossover::new(2, 4).evaluate(&series).unwrap());
    }

    #[test]
    fn no_fire_on_cross_down() {
        let series = closes(&[10.0, 10.0, 10.0, 10.0, 10.0, 6.0]);
        assert!(!MaCrossover::new(2, 4).evaluate(&series).unwrap());
    }

    #[test]
    fn single_bar_is_insufficient() {
        let series = closes(&[10.0]);
        assert_eq!(
            MaCrossover::default().evaluate(&series),
            Err(SignalError::InsufficientHistory { needed: 21, got: 1 })
        );
    }
}
