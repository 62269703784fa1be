//! Result sink — the selected-symbol file plus optional artifacts.
//!
//! The result file is written at the end of every run, including failed
//! ones, so downstream readers always find a current file. Selected symbols
//! are sorted, one per line; an empty selection is the single sentinel line.
//! The sentinel replaces a selection only when the run produced no result.
//! Summary and hit artifacts are secondary: failing to write them is logged
//! and never touches the result file.

use anyhow::Result;
use sequoia_core::domain::TickerSymbol;
use sequoia_core::persist::atomic_write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::OutputConfig;
use crate::export::{hits_csv, summary_json, write_artifact};
use crate::scan::ScanResult;

pub const NO_SELECTION: &str = "No stocks selected.";

#[derive(Debug, Error)]
#[error("failed to write result file {}: {source}", .path.display())]
pub struct SinkError {
    pub path: PathBuf,
    pub source: std::io::Error,
}

pub struct ResultSink {
    result_path: PathBuf,
    summary_path: Option<PathBuf>,
    hits_path: Option<PathBuf>,
}

impl ResultSink {
    pub fn new(result_path: impl Into<PathBuf>) -> Self {
        Self {
            result_path: result_path.into(),
            summary_path: None,
            hits_path: None,
        }
    }

    pub fn from_config(output: &OutputConfig) -> Self {
        Self {
            result_path: output.result_path.clone(),
            summary_path: output.summary_path.clone(),
            hits_path: output.hits_csv_path.clone(),
        }
    }

    pub fn with_summary(mut self, path: impl Into<PathBuf>) -> Self {
        self.summary_path = Some(path.into());
        self
    }

    pub fn with_hits_csv(mut self, path: impl Into<PathBuf>) -> Self {
        self.hits_path = Some(path.into());
        self
    }

    pub fn result_path(&self) -> &Path {
        &self.result_path
    }

    /// Write only the result file.
    pub fn write_selection(&self, selected: &[TickerSymbol]) -> Result<(), SinkError> {
        let body = render_selection(selected);
        atomic_write(&self.result_path, body.as_bytes()).map_err(|source| SinkError {
            path: self.result_path.clone(),
            source,
        })?;
        info!(path = %self.result_path.display(), selected = selected.len(), "result file written");
        Ok(())
    }

    /// Write the result file, then every configured artifact.
    pub fn write(&self, result: &ScanResult) -> Result<(), SinkError> {
        self.write_selection(&result.selected)?;
        if let Some(path) = &self.summary_path {
            match summary_json(result).and_then(|json| write_artifact(path, &json)) {
                Ok(()) => info!(path = %path.display(), "summary written"),
                Err(e) => warn!(path = %path.display(), error = %format_args!("{e:#}"), "failed to write summary"),
            }
        }
        if let Some(path) = &self.hits_path {
            match hits_csv(&result.hits).and_then(|csv| write_artifact(path, &csv)) {
                Ok(()) => info!(path = %path.display(), hits = result.hits.len(), "hits written"),
                Err(e) => warn!(path = %path.display(), error = %format_args!("{e:#}"), "failed to write hits"),
            }
        }
        Ok(())
    }

    /// Settle a finished run.
    ///
    /// A result is written as-is. A failed run leaves the sentinel behind
    /// and its error is handed back unchanged.
    pub fn finalize(&self, outcome: Result<ScanResult>) -> Result<ScanResult> {
        match outcome {
            Ok(result) => {
                self.write(&result)?;
                Ok(result)
            }
            Err(e) => {
                if let Err(sink_err) = self.write_selection(&[]) {
                    error!(error = %sink_err, "failed to write sentinel result file");
                }
                Err(e)
            }
        }
    }
}

/// Sorted symbols joined by newlines, or the sentinel.
pub fn render_selection(selected: &[TickerSymbol]) -> String {
    if selected.is_empty() {
        return NO_SELECTION.to_string();
    }
    let mut sorted = selected.to_vec();
    sorted.sort();
    sorted.dedup();
    sorted.iter().map(|s| s.to_string()).collect::<Vec<_>>().join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn syms(raw: &[&str]) -> Vec<TickerSymbol> {
        raw.iter().map(|s| TickerSymbol::parse(s).unwrap()).collect()
    }

    #[test]
    fn empty_selection_is_sentinel() {
        assert_eq!(render_selection(&[]), "No stocks selected.");
    }

    #[test]
    fn selection_is_sorted() {
        assert_eq!(
            render_selection(&syms(&["600519.SH", "000002.SZ", "000001.SZ"])),
            "000001.SZ\n000002.SZ\n600519.SH"
        );
    }

    #[test]
    fn write_selection_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = ResultSink::new(dir.path().join("data/stock.db"));
        sink.write_selection(&syms(&["600519.SH"])).unwrap();
        sink.write_selection(&[]).unwrap();
        assert_eq!(fs::read_to_string(sink.result_path()).unwrap(), NO_SELECTION);
    }

    #[test]
    fn unwritable_path_is_sink_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x").unwrap();
        // parent is a regular file, so the directory cannot be created
        let sink = ResultSink::new(blocker.join("stock.db"));
        let err = sink.write_selection(&[]).unwrap_err();
        assert_eq!(err.path, blocker.join("stock.db"));
    }
}
