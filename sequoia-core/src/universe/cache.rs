//! Plain-text universe cache: one symbol per line, UTF-8, no header.

use crate::domain::TickerSymbol;
use crate::persist::atomic_write;
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct UniverseCache {
    path: PathBuf,
}

impl UniverseCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every valid symbol. Blank and unparseable lines are skipped.
    pub fn read(&self) -> io::Result<BTreeSet<TickerSymbol>> {
        let text = fs::read_to_string(&self.path)?;
        let mut symbols = BTreeSet::new();
        let mut skipped = 0usize;
        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            match TickerSymbol::parse(line) {
                Ok(sym) => {
                    symbols.insert(sym);
                }
                Err(_) => skipped += 1,
            }
        }
        if skipped > 0 {
            debug!(path = %self.path.display(), skipped, "ignored invalid cache lines");
        }
        Ok(symbols)
    }

    /// Overwrite the whole file atomically.
    pub fn write<'a>(&self, symbols: impl IntoIterator<Item = &'a TickerSymbol>) -> io::Result<()> {
        let mut out = String::new();
        for sym in symbols {
            out.push_str(&sym.to_string());
            out.push('\n');
        }
        atomic_write(&self.path, out.as_bytes())
    }
}
