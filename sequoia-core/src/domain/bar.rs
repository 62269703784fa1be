//! Price bar and price series — the canonical OHLCV schema.
//!
//! Every adapter hands its rows to [`PriceSeries::canonicalize`], which is the
//! only way to build a series. After that point the series is guaranteed to be
//! non-empty, strictly ascending by date, and free of unusable rows, no matter
//! which upstream produced it.

use super::TickerSymbol;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One trading day for one symbol.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceBar {
    /// Prices finite and positive, volume finite and non-negative.
    pub fn is_usable(&self) -> bool {
        [self.open, self.high, self.low, self.close]
            .iter()
            .all(|p| p.is_finite() && *p > 0.0)
            && self.volume.is_finite()
            && self.volume >= 0.0
    }
}

/// Chronologically ascending bars for a single symbol, no duplicate dates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSeries {
    symbol: TickerSymbol,
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    /// Normalize raw upstream rows into a series.
    ///
    /// Sorts ascending (stable), keeps the first row per date, and drops rows
    /// failing [`PriceBar::is_usable`]. Returns `None` when nothing survives.
    pub fn canonicalize(symbol: TickerSymbol, mut bars: Vec<PriceBar>) -> Option<Self> {
        bars.retain(PriceBar::is_usable);
        bars.sort_by_key(|b| b.date);
        bars.dedup_by_key(|b| b.date);

        if bars.is_empty() {
            None
        } else {
            Some(Self { symbol, bars })
        }
    }

    pub fn symbol(&self) -> TickerSymbol {
        self.symbol
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Never true for a constructed series.
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first(&self) -> &PriceBar {
        &self.bars[0]
    }

    pub fn last(&self) -> &PriceBar {
        &self.bars[self.bars.len() - 1]
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// Percent change of the last close against the previous close.
    ///
    /// `None` for single-bar series (e.g. the snapshot source).
    pub fn last_change_pct(&self) -> Option<f64> {
        let n = self.bars.len();
        if n < 2 {
            return None;
        }
        let prev = self.bars[n - 2].close;
        Some((self.bars[n - 1].close - prev) / prev * 100.0)
    }
}

#[cfg(test)]
pub(crate) fn bar(date: NaiveDate, close: f64) -> PriceBar {
    PriceBar {
        date,
        open: close,
        high: close * 1.01,
        low: close * 0.99,
        close,
        volume: 1_000.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    fn sym() -> TickerSymbol {
        TickerSymbol::parse("600519.SH").unwrap()
    }

    #[test]
    fn canonicalize_sorts_ascending() {
        let s = PriceSeries::canonicalize(sym(), vec![bar(d(4), 3.0), bar(d(1), 1.0), bar(d(2), 2.0)])
            .unwrap();
        let dates: Vec<_> = s.bars().iter().map(|b| b.date).collect();
        assert_eq!(dates, vec![d(1), d(2), d(4)]);
    }

    #[test]
    fn canonicalize_keeps_first_duplicate() {
        let s = PriceSeries::canonicalize(sym(), vec![bar(d(1), 10.0), bar(d(1), 11.0), bar(d(2), 12.0)])
            .unwrap();
        assert_eq!(s.len(), 2);
        assert_eq!(s.first().close, 10.0);
    }

    #[test]
    fn canonicalize_drops_unusable_rows() {
        let mut suspended = bar(d(2), 0.0);
        suspended.open = 0.0;
        let mut nan = bar(d(3), 5.0);
        nan.high = f64::NAN;
        let s = PriceSeries::canonicalize(sym(), vec![bar(d(1), 5.0), suspended, nan]).unwrap();
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn canonicalize_empty_is_none() {
        assert!(PriceSeries::canonicalize(sym(), vec![]).is_none());
        assert!(PriceSeries::canonicalize(sym(), vec![bar(d(1), -1.0)]).is_none());
    }

    #[test]
    fn last_change_pct() {
        let s = PriceSeries::canonicalize(sym(), vec![bar(d(1), 10.0), bar(d(2), 11.0)]).unwrap();
        let pct = s.last_change_pct().unwrap();
        assert!((pct - 10.0).abs() < 1e-9);

        let single = PriceSeries::canonicalize(sym(), vec![bar(d(1), 10.0)]).unwrap();
        assert!(single.last_change_pct().is_none());
    }
}
