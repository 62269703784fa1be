//! Scan loop — fetch, evaluate and collect across the universe.
//!
//! Each symbol is independent: fetch through the waterfall, run every
//! signal on the series, emit one [`SymbolOutcome`]. Outcomes flow to a
//! single collector on the calling thread, which owns all accumulation. With
//! `workers > 1` the per-symbol work runs on a dedicated rayon pool and
//! outcomes arrive over a channel in completion order; the collector's
//! result does not depend on that order.
//!
//! A failing or panicking signal affects only its own symbol. Missing data
//! skips the symbol. Neither stops the run.

use chrono::{DateTime, NaiveDate, Utc};
use rayon::prelude::*;
use sequoia_core::data::{DataSource, SeriesFetcher};
use sequoia_core::domain::TickerSymbol;
use sequoia_core::signal::{Signal, SignalError};
use sequoia_core::universe::UniverseSnapshot;
use serde::Serialize;
use std::collections::BTreeSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::stats::{RunStats, StatsThresholds};

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to build scan worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub workers: usize,
    /// Measured from the start of the scan, after universe resolution.
    pub deadline: Option<Duration>,
    pub progress_every: usize,
    pub thresholds: StatsThresholds,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            workers: 1,
            deadline: None,
            progress_every: 100,
            thresholds: StatsThresholds::default(),
        }
    }
}

/// One signal firing on one symbol.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalHit {
    pub signal: String,
    pub symbol: TickerSymbol,
    pub date: NaiveDate,
    pub close: f64,
    pub pct_change: Option<f64>,
    pub source: DataSource,
}

/// What happened to one symbol.
#[derive(Debug, Clone)]
pub enum SymbolOutcome {
    /// Every source was unavailable.
    NoData { symbol: TickerSymbol },
    /// Not started before the deadline.
    DeadlineSkipped { symbol: TickerSymbol },
    Evaluated {
        symbol: TickerSymbol,
        change_pct: Option<f64>,
        hits: Vec<SignalHit>,
        /// Signals that errored or panicked.
        failures: usize,
    },
}

/// Immutable summary of a finished scan.
#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub universe_size: usize,
    pub universe_source: String,
    pub universe_fingerprint: String,
    pub signals: Vec<String>,
    pub fetched: usize,
    pub skipped: usize,
    pub errored: usize,
    pub deadline_skipped: usize,
    pub deadline_expired: bool,
    /// Union of every signal's hits, ascending.
    pub selected: Vec<TickerSymbol>,
    /// Sorted by signal name, then symbol.
    pub hits: Vec<SignalHit>,
    pub stats: RunStats,
}

impl ScanResult {
    pub fn hits_for<'a>(&'a self, signal: &'a str) -> impl Iterator<Item = &'a SignalHit> + 'a {
        self.hits.iter().filter(move |h| h.signal == signal)
    }
}

/// Single-owner fold of outcomes into a [`ScanResult`].
struct Collector {
    total: usize,
    progress_every: usize,
    thresholds: StatsThresholds,
    seen: usize,
    skipped: usize,
    errored: usize,
    deadline_skipped: usize,
    selected: BTreeSet<TickerSymbol>,
    hits: Vec<SignalHit>,
    stats: RunStats,
}

impl Collector {
    fn new(total: usize, options: &ScanOptions) -> Self {
        Self {
            total,
            progress_every: options.progress_every.max(1),
            thresholds: options.thresholds,
            seen: 0,
            skipped: 0,
            errored: 0,
            deadline_skipped: 0,
            selected: BTreeSet::new(),
            hits: Vec::new(),
            stats: RunStats::default(),
        }
    }

    fn absorb(&mut self, outcome: SymbolOutcome) {
        self.seen += 1;
        let current = match outcome {
            SymbolOutcome::NoData { symbol } => {
                self.skipped += 1;
                symbol
            }
            SymbolOutcome::DeadlineSkipped { symbol } => {
                self.deadline_skipped += 1;
                symbol
            }
            SymbolOutcome::Evaluated {
                symbol,
                change_pct,
                hits,
                failures,
            } => {
                if failures > 0 {
                    self.errored += 1;
                }
                let triggered = !hits.is_empty();
                if triggered {
                    info!(%symbol, signals = ?hits.iter().map(|h| h.signal.as_str()).collect::<Vec<_>>(), "signal triggered");
                    self.selected.insert(symbol);
                }
                self.stats.record(change_pct, triggered, &self.thresholds);
                self.hits.extend(hits);
                symbol
            }
        };
        if self.seen % self.progress_every == 0 {
            info!(done = self.seen, total = self.total, current = %current, selected = self.selected.len(), "scan progress");
        }
    }
}

/// Evaluate every signal against one symbol's series.
pub fn scan_symbol(
    symbol: TickerSymbol,
    fetcher: &dyn SeriesFetcher,
    signals: &[Box<dyn Signal>],
    deadline: Option<Instant>,
) -> SymbolOutcome {
    if deadline.is_some_and(|d| Instant::now() >= d) {
        return SymbolOutcome::DeadlineSkipped { symbol };
    }
    let Some(sourced) = fetcher.fetch(&symbol) else {
        return SymbolOutcome::NoData { symbol };
    };

    let series = &sourced.series;
    let last = series.last();
    let change_pct = series.last_change_pct();
    let mut hits = Vec::new();
    let mut failures = 0;

    for signal in signals {
        let verdict = panic::catch_unwind(AssertUnwindSafe(|| signal.evaluate(series)));
        match verdict {
            Ok(Ok(true)) => hits.push(SignalHit {
                signal: signal.name().to_string(),
                symbol,
                date: last.date,
                close: last.close,
                pct_change: change_pct,
                source: sourced.source,
            }),
            Ok(Ok(false)) => {}
            Ok(Err(e @ SignalError::InsufficientHistory { .. })) => {
                failures += 1;
                debug!(%symbol, signal = signal.name(), source = %sourced.source, error = %e, "signal skipped");
            }
            Ok(Err(e)) => {
                failures += 1;
                warn!(%symbol, signal = signal.name(), error = %e, "signal failed");
            }
            Err(_) => {
                failures += 1;
                warn!(%symbol, signal = signal.name(), "signal panicked");
            }
        }
    }

    SymbolOutcome::Evaluated {
        symbol,
        change_pct,
        hits,
        failures,
    }
}

/// Scan the universe with the given signals.
pub fn run_scan(
    universe: &UniverseSnapshot,
    fetcher: &dyn SeriesFetcher,
    signals: &[Box<dyn Signal>],
    options: &ScanOptions,
) -> Result<ScanResult, ScanError> {
    let started_at = Utc::now();
    let deadline = options.deadline.map(|d| Instant::now() + d);
    let symbols = universe.symbols();
    let mut collector = Collector::new(symbols.len(), options);

    info!(
        symbols = symbols.len(),
        source = %universe.source(),
        workers = options.workers,
        signals = ?signals.iter().map(|s| s.name()).collect::<Vec<_>>(),
        "scan started"
    );

    if options.workers > 1 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.workers)
            .thread_name(|i| format!("scan-{i}"))
            .build()?;
        let pool = &pool;
        let (tx, rx) = mpsc::channel();
        std::thread::scope(|scope| {
            scope.spawn(move || {
                pool.install(|| {
                    symbols.par_iter().for_each_with(tx, |tx, symbol| {
                        // receiver lives until every sender is dropped
                        let _ = tx.send(scan_symbol(*symbol, fetcher, signals, deadline));
                    })
                })
            });
            for outcome in rx {
                collector.absorb(outcome);
            }
        });
    } else {
        for symbol in symbols {
            collector.absorb(scan_symbol(*symbol, fetcher, signals, deadline));
        }
    }

    let mut hits = collector.hits;
    hits.sort_by(|a, b| a.signal.cmp(&b.signal).then(a.symbol.cmp(&b.symbol)));
    let result = ScanResult {
        started_at,
        finished_at: Utc::now(),
        universe_size: symbols.len(),
        universe_source: universe.source().to_string(),
        universe_fingerprint: universe.fingerprint().to_string(),
        signals: signals.iter().map(|s| s.name().to_string()).collect(),
        fetched: collector.stats.fetched,
        skipped: collector.skipped,
        errored: collector.errored,
        deadline_skipped: collector.deadline_skipped,
        deadline_expired: collector.deadline_skipped > 0,
        selected: collector.selected.into_iter().collect(),
        hits,
        stats: collector.stats,
    };

    if result.deadline_expired {
        warn!(not_scanned = result.deadline_skipped, "scan deadline expired");
    }
    info!(
        fetched = result.fetched,
        skipped = result.skipped,
        errored = result.errored,
        selected = result.selected.len(),
        "scan finished"
    );
    Ok(result)
}
