//! Run artifacts — JSON summary and CSV hit list.

use anyhow::{Context, Result};
use sequoia_core::persist::atomic_write;
use std::path::Path;

use crate::scan::{ScanResult, SignalHit};

/// Serialize the full run summary to pretty JSON.
pub fn summary_json(result: &ScanResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize scan summary to JSON")
}

/// Hit list as CSV.
///
/// Columns: signal, symbol, date, close, pct_change, source
pub fn hits_csv(hits: &[SignalHit]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["signal", "symbol", "date", "close", "pct_change", "source"])?;

    for h in hits {
        wtr.write_record([
            h.signal.clone(),
            h.symbol.to_string(),
            h.date.to_string(),
            format!("{:.2}", h.close),
            h.pct_change.map(|p| format!("{p:.2}")).unwrap_or_default(),
            h.source.to_string(),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Atomically replace `path` with `contents`.
pub fn write_artifact(path: &Path, contents: &str) -> Result<()> {
    atomic_write(path, contents.as_bytes())
        .with_context(|| format!("failed to write {}", path.display()))
}
