//! Source adapter trait and typed results.
//!
//! An adapter talks to exactly one upstream and normalizes its payload. It
//! never returns an error for "no data": every failure mode is folded into a
//! typed [`Unavailable`] reason so the waterfall can log it and move on.

use super::http::NetworkError;
use crate::domain::{PriceSeries, TickerSymbol};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Upstream payload did not have the expected shape.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("expected more than {expected} fields, got {got}")]
    FieldCount { expected: usize, got: usize },

    #[error("field '{field}' is not numeric: '{value}'")]
    NotNumeric { field: &'static str, value: String },

    #[error("invalid date '{0}'")]
    BadDate(String),

    #[error("upstream rejected request (code {code}): {message}")]
    Rejected { code: i64, message: String },
}

/// Why an adapter produced no series.
#[derive(Debug, Clone, Error)]
pub enum Unavailable {
    #[error("credential not configured")]
    MissingCredential,

    #[error("network: {0}")]
    Network(#[from] NetworkError),

    #[error("schema: {0}")]
    Schema(#[from] SchemaError),

    #[error("empty payload")]
    Empty,

    #[error("circuit breaker open")]
    CircuitOpen,

    #[error("source disabled")]
    Disabled,
}

/// Outcome of a single adapter invocation. Never partially normalized.
#[derive(Debug, Clone)]
pub enum SourceResult {
    Available(PriceSeries),
    Unavailable(Unavailable),
}

impl SourceResult {
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }
}

impl From<Result<PriceSeries, Unavailable>> for SourceResult {
    fn from(result: Result<PriceSeries, Unavailable>) -> Self {
        match result {
            Ok(series) => Self::Available(series),
            Err(reason) => Self::Unavailable(reason),
        }
    }
}

/// Which upstream supplied a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Eastmoney,
    Tushare,
    Sina,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Eastmoney => "eastmoney",
            Self::Tushare => "tushare",
            Self::Sina => "sina",
        };
        f.write_str(name)
    }
}

/// A winning series tagged with its source.
#[derive(Debug, Clone)]
pub struct SourcedSeries {
    pub series: PriceSeries,
    pub source: DataSource,
}

/// One upstream price source.
pub trait SourceAdapter: Send + Sync {
    fn source(&self) -> DataSource;

    /// Fetch up to `lookback_days` calendar days of history ending today.
    fn fetch(&self, symbol: &TickerSymbol, lookback_days: u32) -> SourceResult;
}

/// Parse a numeric field, reporting the field name on failure.
pub(crate) fn parse_num(field: &'static str, raw: &str) -> Result<f64, SchemaError> {
    raw.trim().parse::<f64>().map_err(|_| SchemaError::NotNumeric {
        field,
        value: raw.to_string(),
    })
}
