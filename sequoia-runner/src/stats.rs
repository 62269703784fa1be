//! Market-breadth statistics over the fetched series.
//!
//! Counts are plain sums, so totals do not depend on the order series arrive in.

use serde::{Deserialize, Serialize};

/// Main-board daily band is ±10%; 9.9 absorbs tick rounding.
pub const LIMIT_PCT: f64 = 9.9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatsThresholds {
    pub gain_pct: f64,
    /// Magnitude; a loser has change <= -loss_pct.
    pub loss_pct: f64,
}

impl Default for StatsThresholds {
    fn default() -> Self {
        Self {
            gain_pct: 5.0,
            loss_pct: 5.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub fetched: usize,
    pub limit_up: usize,
    pub limit_down: usize,
    pub gainers: usize,
    pub losers: usize,
    pub triggered: usize,
}

impl RunStats {
    /// Record one fetched series. `change_pct` is `None` below two bars.
    pub fn record(&mut self, change_pct: Option<f64>, triggered: bool, thresholds: &StatsThresholds) {
        self.fetched += 1;
        if triggered {
            self.triggered += 1;
        }
        let Some(change) = change_pct.filter(|c| c.is_finite()) else {
            return;
        };
        if change >= LIMIT_PCT {
            self.limit_up += 1;
        }
        if change <= -LIMIT_PCT {
            self.limit_down += 1;
        }
        if change >= thresholds.gain_pct {
            self.gainers += 1;
        }
        if change <= -thresholds.loss_pct {
            self.losers += 1;
        }
    }
}
