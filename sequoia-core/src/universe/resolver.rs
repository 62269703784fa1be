//! Universe resolver — remote listings, then cache, then a fixed fallback.
//!
//! Every channel goes through [`normalize_listing`], so the main-board rule
//! and suffix derivation are identical whichever channel wins. A remote
//! channel only wins when its filtered result is larger than
//! `min_viable`; smaller listings are treated as partial or garbled.

use super::cache::UniverseCache;
use super::listing::ListingChannel;
use crate::domain::TickerSymbol;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::io;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Large, liquid main-board names used when nothing else is available.
pub const DEFAULT_FALLBACK: &[&str] = &[
    "600519.SH", // Kweichow Moutai
    "601318.SH", // Ping An
    "600036.SH", // China Merchants Bank
    "601398.SH", // ICBC
    "600900.SH", // Yangtze Power
    "000001.SZ", // Ping An Bank
    "000858.SZ", // Wuliangye
    "000333.SZ", // Midea
];

#[derive(Debug, Error)]
pub enum UniverseError {
    #[error("universe exhausted: no listing channel, cache or fallback yielded a symbol")]
    Exhausted,
}

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// A remote listing must yield strictly more symbols than this.
    pub min_viable: usize,
    pub fallback: Vec<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            min_viable: 1000,
            fallback: DEFAULT_FALLBACK.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Where a snapshot came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UniverseSource {
    /// A remote listing channel, by name.
    Remote(String),
    Cache,
    Fallback,
    /// Symbols given directly by the operator.
    Explicit,
}

impl fmt::Display for UniverseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote(name) => write!(f, "{name}"),
            Self::Cache => f.write_str("cache"),
            Self::Fallback => f.write_str("fallback"),
            Self::Explicit => f.write_str("explicit"),
        }
    }
}

/// The resolved, sorted and de-duplicated symbol set for one run.
#[derive(Debug, Clone, Serialize)]
pub struct UniverseSnapshot {
    symbols: Vec<TickerSymbol>,
    source: UniverseSource,
    fingerprint: String,
    resolved_at: DateTime<Utc>,
}

impl UniverseSnapshot {
    pub fn from_symbols(symbols: impl IntoIterator<Item = TickerSymbol>, source: UniverseSource) -> Self {
        let symbols: Vec<TickerSymbol> = symbols.into_iter().collect::<BTreeSet<_>>().into_iter().collect();
        Self {
            fingerprint: fingerprint(&symbols),
            symbols,
            source,
            resolved_at: Utc::now(),
        }
    }

    /// Strictly ascending.
    pub fn symbols(&self) -> &[TickerSymbol] {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn source(&self) -> &UniverseSource {
        &self.source
    }

    /// BLAKE3 over the newline-joined symbol list.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn resolved_at(&self) -> DateTime<Utc> {
        self.resolved_at
    }
}

fn fingerprint(symbols: &[TickerSymbol]) -> String {
    let mut hasher = blake3::Hasher::new();
    for sym in symbols {
        hasher.update(sym.to_string().as_bytes());
        hasher.update(b"\n");
    }
    hasher.finalize().to_hex().to_string()
}

/// Apply the main-board filter to raw listing codes.
///
/// Codes are zero-padded, anything outside `60`/`00` is discarded, missing
/// suffixes are derived, and entries whose suffix contradicts the code are
/// dropped.
pub fn normalize_listing<I, S>(raw: I) -> BTreeSet<TickerSymbol>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    raw.into_iter()
        .filter_map(|code| TickerSymbol::parse(code.as_ref()).ok())
        .collect()
}

pub struct UniverseResolver {
    channels: Vec<Box<dyn ListingChannel>>,
    cache: UniverseCache,
    config: ResolverConfig,
}

impl UniverseResolver {
    pub fn new(channels: Vec<Box<dyn ListingChannel>>, cache: UniverseCache, config: ResolverConfig) -> Self {
        Self {
            channels,
            cache,
            config,
        }
    }

    pub fn resolve(&self) -> Result<UniverseSnapshot, UniverseError> {
        for channel in &self.channels {
            let name = channel.name();
            let raw = match channel.list() {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(channel = name, error = %e, "listing channel failed");
                    continue;
                }
            };
            let symbols = normalize_listing(&raw);
            if symbols.len() <= self.config.min_viable {
                warn!(
                    channel = name,
                    raw = raw.len(),
                    kept = symbols.len(),
                    min_viable = self.config.min_viable,
                    "listing below minimum viable size, trying next channel"
                );
                continue;
            }

            if let Err(e) = self.cache.write(&symbols) {
                warn!(path = %self.cache.path().display(), error = %e, "failed to write universe cache");
            }
            info!(channel = name, raw = raw.len(), symbols = symbols.len(), "universe resolved");
            return Ok(UniverseSnapshot::from_symbols(symbols, UniverseSource::Remote(name.to_string())));
        }

        match self.cache.read() {
            Ok(symbols) if !symbols.is_empty() => {
                warn!(path = %self.cache.path().display(), symbols = symbols.len(), "remote listings failed, using cached universe");
                return Ok(UniverseSnapshot::from_symbols(symbols, UniverseSource::Cache));
            }
            Ok(_) => debug!(path = %self.cache.path().display(), "universe cache holds no valid symbols"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.cache.path().display(), "no universe cache")
            }
            Err(e) => warn!(path = %self.cache.path().display(), error = %e, "failed to read universe cache"),
        }

        let symbols = normalize_listing(&self.config.fallback);
        if symbols.is_empty() {
            return Err(UniverseError::Exhausted);
        }
        warn!(symbols = symbols.len(), "using fallback universe");
        Ok(UniverseSnapshot::from_symbols(symbols, UniverseSource::Fallback))
    }
}
