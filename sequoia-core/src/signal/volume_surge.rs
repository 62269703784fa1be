//! Volume surge on an up day.
//!
//! Fires when the last volume is at least `multiplier` times the mean volume
//! of the previous `period` bars and the last close is above the one before.

use super::indicators::mean;
use super::{require_bars, Signal, SignalError};
use crate::domain::PriceSeries;

#[derive(Debug, Clone)]
pub struct VolumeSurge {
    pub period: usize,
    pub multiplier: f64,
}

impl VolumeSurge {
    pub fn new(period: usize, multiplier: f64) -> Self {
        Self { period, multiplier }
    }
}

impl Default for VolumeSurge {
    fn default() -> Self {
        Self::new(20, 2.0)
    }
}

impl Signal for VolumeSurge {
    fn name(&self) -> &str {
        "volume_surge"
    }

    fn warmup_bars(&self) -> usize {
        self.period + 1
    }

    fn evaluate(&self, series: &PriceSeries) -> Result<bool, SignalError> {
        require_bars(series, self.warmup_bars())?;
        let bars = series.bars();
        let n = bars.len();
        let volumes: Vec<f64> = bars[n - 1 - self.period..n - 1].iter().map(|b| b.volume).collect();
        let avg = mean(&volumes).ok_or_else(|| SignalError::Invalid("empty volume window".into()))?;
        if avg <= 0.0 {
            // no trading in the window, nothing to compare against
            return Ok(false);
        }

        let last = &bars[n - 1];
        let up_day = last.close > bars[n - 2].close;
        Ok(up_day && last.volume >= self.multiplier * avg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bar::bar;
    use crate::domain::PriceBar;
    use crate::signal::testing::{day, series_of};

    fn last_bar(close: f64, volume: f64) -> PriceBar {
        PriceBar {
            volume,
            ..bar(day(3), close)
        }
    }

    fn base() -> Vec<PriceBar> {
        (0..3).map(|i| bar(day(i), 10.0)).collect()
    }

    #[test]
    fn fires_on_double_volume_up_day() {
        let mut bars = base();
        bars.push(last_bar(10.5, 2_000.0));
        assert!(VolumeSurge::new(3, 2.0).evaluate(&series_of(bars)).unwrap());
    }

    #[test]
    fn down_day_does_not_fire() {
        let mut bars = base();
        bars.push(last_bar(9.5, 5_000.0));
        assert!(!VolumeSurge::new(3, 2.0).evaluate(&series_of(bars)).unwrap());
    }

    #[test]
    fn modest_volume_does_not_fire() {
        let mut bars = base();
        bars.push(last_bar(10.5, 1_500.0));
        assert!(!VolumeSurge::new(3, 2.0).evaluate(&series_of(bars)).unwrap());
    }

    #[test]
    fn zero_volume_window_is_no_trigger() {
        let mut bars: Vec<PriceBar> = (0..3)
            .map(|i| PriceBar {
                volume: 0.0,
                ..bar(day(i), 10.0)
            })
            .collect();
        bars.push(last_bar(10.5, 100.0));
        assert!(!VolumeSurge::new(3, 2.0).evaluate(&series_of(bars)).unwrap());
    }
}
