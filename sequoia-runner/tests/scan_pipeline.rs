//! Integration tests for the scan loop and result sink.
//!
//! Tests:
//! 1. A signal error on one symbol does not stop the run
//! 2. A panicking signal is isolated to its symbol
//! 3. Symbols without data are skipped
//! 4. Zero triggers writes exactly the sentinel
//! 5. Parallel and sequential scans agree
//! 6. An expired deadline skips unstarted symbols
//! 7. Summary and hit artifacts are written when configured
//! 8. A failed artifact write leaves the selection in place
//! 9. A failed run replaces the previous selection with the sentinel

use chrono::{Duration as ChronoDuration, NaiveDate};
use std::collections::HashMap;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use sequoia_core::data::{DataSource, SeriesFetcher, SourcedSeries};
use sequoia_core::domain::{PriceBar, PriceSeries, TickerSymbol};
use sequoia_core::signal::{create_signals, Signal, SignalError, SignalSpec};
use sequoia_core::universe::{UniverseSnapshot, UniverseSource};
use sequoia_runner::{run_scan, ResultSink, ScanOptions, NO_SELECTION};

// ──────────────────────────────────────────────
// Helpers
// ──────────────────────────────────────────────

fn sym(s: &str) -> TickerSymbol {
    TickerSymbol::parse(s).unwrap()
}

/// Flat series ending in a jump of `last_change_pct`.
fn series(symbol: TickerSymbol, n: usize, last_change_pct: f64) -> PriceSeries {
    let base = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    let bars = (0..n)
        .map(|i| {
            let close = if i + 1 == n { 10.0 * (1.0 + last_change_pct / 100.0) } else { 10.0 };
            PriceBar {
                date: base + ChronoDuration::days(i as i64),
                open: 10.0,
                high: close.max(10.0) * 1.01,
                low: close.min(10.0) * 0.99,
                close,
                volume: 5_000.0,
            }
        })
        .collect();
    PriceSeries::canonicalize(symbol, bars).unwrap()
}

#[derive(Default)]
struct FakeFetcher {
    data: HashMap<TickerSymbol, PriceSeries>,
    calls: AtomicUsize,
}

impl FakeFetcher {
    fn with(mut self, symbol: TickerSymbol, series: PriceSeries) -> Self {
        self.data.insert(symbol, series);
        self
    }
}

impl SeriesFetcher for FakeFetcher {
    fn fetch(&self, symbol: &TickerSymbol) -> Option<SourcedSeries> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.data.get(symbol).map(|series| SourcedSeries {
            series: series.clone(),
            source: DataSource::Tushare,
        })
    }
}

/// Errors for one symbol, triggers for every other.
struct FailsOn(TickerSymbol);

impl Signal for FailsOn {
    fn name(&self) -> &str {
        "fails_on"
    }

    fn warmup_bars(&self) -> usize {
        1
    }

    fn evaluate(&self, series: &PriceSeries) -> Result<bool, SignalError> {
        if series.symbol() == self.0 {
            Err(SignalError::Invalid("corrupt history".into()))
        } else {
            Ok(true)
        }
    }
}

/// Panics for one symbol, never triggers.
struct PanicsOn(TickerSymbol);

impl Signal for PanicsOn {
    fn name(&self) -> &str {
        "panics_on"
    }

    fn warmup_bars(&self) -> usize {
        1
    }

    fn evaluate(&self, series: &PriceSeries) -> Result<bool, SignalError> {
        if series.symbol() == self.0 {
            panic!("index out of range");
        }
        Ok(false)
    }
}

fn universe(symbols: &[TickerSymbol]) -> UniverseSnapshot {
    UniverseSnapshot::from_symbols(symbols.iter().copied(), UniverseSource::Explicit)
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[test]
fn signal_error_is_isolated() {
    let (a, b) = (sym("000001.SZ"), sym("000002.SZ"));
    let fetcher = FakeFetcher::default()
        .with(a, series(a, 30, 1.0))
        .with(b, series(b, 30, 1.0));
    let signals: Vec<Box<dyn Signal>> = vec![Box::new(FailsOn(a))];

    let result = run_scan(&universe(&[a, b]), &fetcher, &signals, &ScanOptions::default()).unwrap();
    assert_eq!(result.selected, vec![b]);
    assert_eq!(result.errored, 1);
    assert_eq!(result.fetched, 2);
    assert_eq!(result.hits.len(), 1);
    assert_eq!(result.hits[0].source, DataSource::Tushare);
}

#[test]
fn panicking_signal_is_isolated() {
    let (a, b) = (sym("000001.SZ"), sym("600519.SH"));
    let fetcher = FakeFetcher::default()
        .with(a, series(a, 30, 1.0))
        .with(b, series(b, 30, 1.0));
    let signals: Vec<Box<dyn Signal>> = vec![Box::new(PanicsOn(a)), Box::new(FailsOn(sym("000002.SZ")))];

    let result = run_scan(&universe(&[a, b]), &fetcher, &signals, &ScanOptions::default()).unwrap();
    // FailsOn still ran for both symbols after PanicsOn blew up on the first
    assert_eq!(result.selected, vec![a, b]);
    assert_eq!(result.errored, 1);
}

#[test]
fn missing_data_is_skipped() {
    let (a, b) = (sym("000001.SZ"), sym("000002.SZ"));
    let fetcher = FakeFetcher::default().with(b, series(b, 30, 10.0));
    let signals = create_signals(&[SignalSpec::new("limit_up")]).unwrap();

    let result = run_scan(&universe(&[a, b]), &fetcher, &signals, &ScanOptions::default()).unwrap();
    assert_eq!(result.skipped, 1);
    assert_eq!(result.fetched, 1);
    assert_eq!(result.selected, vec![b]);
    assert_eq!(result.stats.limit_up, 1);
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
}

#[test]
fn zero_triggers_writes_sentinel() {
    let dir = tempfile::tempdir().unwrap();
    let a = sym("600036.SH");
    let fetcher = FakeFetcher::default().with(a, series(a, 30, 0.5));
    let signals = create_signals(&[SignalSpec::new("limit_up")]).unwrap();

    let result = run_scan(&universe(&[a]), &fetcher, &signals, &ScanOptions::default()).unwrap();
    assert!(result.selected.is_empty());

    let sink = ResultSink::new(dir.path().join("data/stock.db"));
    sink.write(&result).unwrap();
    assert_eq!(fs::read_to_string(sink.result_path()).unwrap(), "No stocks selected.");
    assert_eq!(NO_SELECTION, "No stocks selected.");
}

#[test]
fn parallel_matches_sequential() {
    let mut fetcher = FakeFetcher::default();
    let mut symbols = Vec::new();
    for i in 0..300usize {
        let code = if i % 2 == 0 { 600_000 + i } else { i };
        let symbol = TickerSymbol::main_board(&code.to_string()).unwrap();
        if i % 7 != 0 {
            // spread of changes from -12% to +12%
            let change = (i % 25) as f64 - 12.0;
            fetcher = fetcher.with(symbol, series(symbol, 70, change));
        }
        symbols.push(symbol);
    }
    let signals = create_signals(&[
        SignalSpec::new("limit_up"),
        SignalSpec::new("breakout"),
        SignalSpec::new("ma_crossover"),
    ])
    .unwrap();
    let universe = universe(&symbols);

    let sequential = run_scan(&universe, &fetcher, &signals, &ScanOptions::default()).unwrap();
    let parallel = run_scan(
        &universe,
        &fetcher,
        &signals,
        &ScanOptions {
            workers: 4,
            progress_every: 50,
            ..ScanOptions::default()
        },
    )
    .unwrap();

    assert!(!sequential.selected.is_empty());
    assert_eq!(sequential.selected, parallel.selected);
    assert_eq!(sequential.hits, parallel.hits);
    assert_eq!(sequential.stats, parallel.stats);
    assert_eq!(sequential.skipped, parallel.skipped);
    assert!(sequential.selected.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn expired_deadline_skips_everything() {
    let a = sym("000001.SZ");
    let fetcher = FakeFetcher::default().with(a, series(a, 30, 10.0));
    let signals = create_signals(&[SignalSpec::new("limit_up")]).unwrap();
    let options = ScanOptions {
        deadline: Some(Duration::ZERO),
        ..ScanOptions::default()
    };

    let result = run_scan(&universe(&[a]), &fetcher, &signals, &options).unwrap();
    assert!(result.deadline_expired);
    assert_eq!(result.deadline_skipped, 1);
    assert!(result.selected.is_empty());
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn artifacts_written_when_configured() {
    let dir = tempfile::tempdir().unwrap();
    let a = sym("600519.SH");
    let fetcher = FakeFetcher::default().with(a, series(a, 30, 10.0));
    let signals = create_signals(&[SignalSpec::new("limit_up")]).unwrap();
    let result = run_scan(&universe(&[a]), &fetcher, &signals, &ScanOptions::default()).unwrap();

    let sink = ResultSink::new(dir.path().join("stock.db"))
        .with_summary(dir.path().join("summary.json"))
        .with_hits_csv(dir.path().join("hits.csv"));
    sink.write(&result).unwrap();

    assert_eq!(fs::read_to_string(dir.path().join("stock.db")).unwrap(), "600519.SH");

    let summary: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("summary.json")).unwrap()).unwrap();
    assert_eq!(summary["selected"][0], "600519.SH");
    assert_eq!(summary["universe_source"], "explicit");
    assert_eq!(summary["stats"]["limit_up"], 1);

    let csv = fs::read_to_string(dir.path().join("hits.csv")).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[1].starts_with("limit_up,600519.SH,2024-01-31,11.00,10.00,tushare"));
}

#[test]
fn artifact_failure_keeps_selection() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    fs::write(&blocker, "x").unwrap();

    let a = sym("600519.SH");
    let fetcher = FakeFetcher::default().with(a, series(a, 30, 10.0));
    let signals = create_signals(&[SignalSpec::new("limit_up")]).unwrap();
    let outcome = run_scan(&universe(&[a]), &fetcher, &signals, &ScanOptions::default())
        .map_err(anyhow::Error::from);

    // parent of each artifact is a regular file
    let sink = ResultSink::new(dir.path().join("stock.db"))
        .with_summary(blocker.join("summary.json"))
        .with_hits_csv(blocker.join("hits.csv"));
    let result = sink.finalize(outcome).unwrap();

    assert_eq!(result.selected, vec![a]);
    assert_eq!(fs::read_to_string(dir.path().join("stock.db")).unwrap(), "600519.SH");
}

#[test]
fn failed_run_writes_sentinel() {
    let dir = tempfile::tempdir().unwrap();
    let sink = ResultSink::new(dir.path().join("stock.db"));
    sink.write_selection(&[sym("600519.SH")]).unwrap();

    let err = sink
        .finalize(Err(anyhow::anyhow!("universe exhausted")))
        .unwrap_err();
    assert_eq!(err.to_string(), "universe exhausted");
    assert_eq!(fs::read_to_string(sink.result_path()).unwrap(), NO_SELECTION);
}
