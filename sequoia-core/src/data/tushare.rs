//! Tushare Pro adapter (secondary source) and the shared API envelope.
//!
//! Tushare is token-gated. Without a token the adapter is permanently
//! unavailable and never touches the network. The `daily` endpoint returns
//! rows newest-first; they are reversed before canonicalization.

use super::http::{HttpRequest, ResilientClient};
use super::provider::{
    parse_num, DataSource, SchemaError, SourceAdapter, SourceResult, Unavailable,
};
use crate::clock;
use crate::domain::{PriceBar, PriceSeries, TickerSymbol};
use chrono::{Duration as ChronoDuration, NaiveDate};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

const API_URL: &str = "http://api.tushare.pro";
const DAILY_FIELDS: &str = "ts_code,trade_date,open,high,low,close,vol";

#[derive(Debug, Deserialize)]
struct Envelope {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
    data: Option<Table>,
}

/// Column-oriented result table.
#[derive(Debug, Deserialize)]
pub struct Table {
    pub fields: Vec<String>,
    #[serde(default)]
    pub items: Vec<Vec<Value>>,
}

impl Table {
    pub fn column(&self, name: &str) -> Result<usize, SchemaError> {
        self.fields
            .iter()
            .position(|f| f == name)
            .ok_or_else(|| SchemaError::Malformed(format!("missing column '{name}'")))
    }
}

/// Thin Tushare Pro HTTP API client.
pub struct TushareApi {
    client: Arc<ResilientClient>,
    token: Option<String>,
}

impl TushareApi {
    pub fn new(client: Arc<ResilientClient>, token: Option<String>) -> Self {
        let token = token.filter(|t| !t.trim().is_empty());
        Self { client, token }
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Call one API endpoint and unwrap the envelope.
    pub fn query(&self, api_name: &str, params: Value, fields: &str) -> Result<Table, Unavailable> {
        let token = self.token.as_deref().ok_or(Unavailable::MissingCredential)?;
        let request = HttpRequest::post(API_URL).json(json!({
            "api_name": api_name,
            "token": token,
            "params": params,
            "fields": fields,
        }));

        let resp = self.client.send(&request)?;
        if !resp.is_success() {
            return Err(SchemaError::Rejected {
                code: i64::from(resp.status),
                message: "non-success HTTP status".into(),
            }
            .into());
        }
        let envelope: Envelope = resp
            .json()
            .map_err(|e| SchemaError::Malformed(e.to_string()))?;
        unwrap_envelope(api_name, envelope)
    }
}

fn unwrap_envelope(api_name: &str, envelope: Envelope) -> Result<Table, Unavailable> {
    if envelope.code != 0 {
        let message = envelope.msg.unwrap_or_default();
        debug!(api = api_name, code = envelope.code, %message, "tushare rejected request");
        return Err(SchemaError::Rejected {
            code: envelope.code,
            message,
        }
        .into());
    }
    envelope
        .data
        .ok_or_else(|| SchemaError::Malformed("envelope has no data".into()).into())
}

/// Read a cell as f64. Tushare sends numbers, occasionally numeric strings.
pub(crate) fn cell_f64(field: &'static str, value: &Value) -> Result<f64, SchemaError> {
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| SchemaError::NotNumeric {
            field,
            value: n.to_string(),
        }),
        Value::String(s) => parse_num(field, s),
        other => Err(SchemaError::NotNumeric {
            field,
            value: other.to_string(),
        }),
    }
}

pub(crate) fn cell_str<'a>(field: &'static str, value: &'a Value) -> Result<&'a str, SchemaError> {
    value
        .as_str()
        .ok_or_else(|| SchemaError::Malformed(format!("column '{field}' is not a string")))
}

pub struct TushareAdapter {
    api: Arc<TushareApi>,
}

impl TushareAdapter {
    pub fn new(api: Arc<TushareApi>) -> Self {
        Self { api }
    }

    fn fetch_inner(&self, symbol: &TickerSymbol, lookback_days: u32) -> Result<PriceSeries, Unavailable> {
        if !self.api.has_token() {
            return Err(Unavailable::MissingCredential);
        }
        let end = clock::china_today();
        let start = end - ChronoDuration::days(i64::from(lookback_days));
        let table = self.api.query(
            "daily",
            json!({
                "ts_code": symbol.ts_code(),
                "start_date": clock::compact(start),
                "end_date": clock::compact(end),
            }),
            DAILY_FIELDS,
        )?;
        parse_daily(*symbol, &table)
    }
}

impl SourceAdapter for TushareAdapter {
    fn source(&self) -> DataSource {
        DataSource::Tushare
    }

    fn fetch(&self, symbol: &TickerSymbol, lookback_days: u32) -> SourceResult {
        self.fetch_inner(symbol, lookback_days).into()
    }
}

fn parse_daily(symbol: TickerSymbol, table: &Table) -> Result<PriceSeries, Unavailable> {
    if table.items.is_empty() {
        return Err(Unavailable::Empty);
    }
    let date_col = table.column("trade_date")?;
    let open_col = table.column("open")?;
    let high_col = table.column("high")?;
    let low_col = table.column("low")?;
    let close_col = table.column("close")?;
    let vol_col = table.column("vol")?;
    let width = table.fields.len();

    let mut bars = Vec::with_capacity(table.items.len());
    for row in &table.items {
        if row.len() < width {
            return Err(SchemaError::FieldCount {
                expected: width - 1,
                got: row.len(),
            }
            .into());
        }
        let raw_date = cell_str("trade_date", &row[date_col])?;
        let date = NaiveDate::parse_from_str(raw_date, "%Y%m%d")
            .map_err(|_| SchemaError::BadDate(raw_date.to_string()))?;
        bars.push(PriceBar {
            date,
            open: cell_f64("open", &row[open_col])?,
            high: cell_f64("high", &row[high_col])?,
            low: cell_f64("low", &row[low_col])?,
            close: cell_f64("close", &row[close_col])?,
            volume: cell_f64("vol", &row[vol_col])?,
        });
    }

    // newest-first upstream
    bars.reverse();
    PriceSeries::canonicalize(symbol, bars).ok_or(Unavailable::Empty)
}
