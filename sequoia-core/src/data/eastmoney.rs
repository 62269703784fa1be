//! Eastmoney daily k-line adapter (primary source).
//!
//! Forward-adjusted (`fqt=1`) daily bars (`klt=101`) from the `push2his`
//! history endpoint. Deepest history of the three sources, but aggressively
//! rate limited. No credential required.
//!
//! Each k-line row is a comma-joined string:
//! `date,open,close,high,low,volume,amount,amplitude,pct_chg,change,turnover`.
//! Note close comes before high/low.

use super::http::{HttpRequest, ResilientClient};
use super::provider::{parse_num, DataSource, SchemaError, SourceAdapter, SourceResult, Unavailable};
use crate::clock;
use crate::domain::{PriceBar, PriceSeries, TickerSymbol};
use chrono::{Duration as ChronoDuration, NaiveDate};
use serde::Deserialize;
use std::sync::Arc;

const KLINE_URL: &str = "https://push2his.eastmoney.com/api/qt/stock/kline/get";
const UT_TOKEN: &str = "7eea3edcaed734bea9cbfc24409ed989";
const MIN_FIELDS: usize = 6;

#[derive(Debug, Deserialize)]
struct KlineResponse {
    data: Option<KlineData>,
}

#[derive(Debug, Deserialize)]
struct KlineData {
    #[serde(default)]
    klines: Vec<String>,
}

pub struct EastmoneyAdapter {
    client: Arc<ResilientClient>,
}

impl EastmoneyAdapter {
    pub fn new(client: Arc<ResilientClient>) -> Self {
        Self { client }
    }

    fn request(symbol: &TickerSymbol, start: NaiveDate, end: NaiveDate) -> HttpRequest {
        HttpRequest::get(KLINE_URL)
            .query("secid", symbol.eastmoney_secid())
            .query("ut", UT_TOKEN)
            .query("fields1", "f1,f2,f3,f4,f5,f6")
            .query("fields2", "f51,f52,f53,f54,f55,f56,f57,f58,f59,f60,f61,f116")
            .query("klt", "101")
            .query("fqt", "1")
            .query("beg", clock::compact(start))
            .query("end", clock::compact(end))
    }

    fn fetch_inner(&self, symbol: &TickerSymbol, lookback_days: u32) -> Result<PriceSeries, Unavailable> {
        let end = clock::china_today();
        let start = end - ChronoDuration::days(i64::from(lookback_days));
        let resp = self.client.send(&Self::request(symbol, start, end))?;
        if !resp.is_success() {
            return Err(SchemaError::Rejected {
                code: i64::from(resp.status),
                message: "non-success HTTP status".into(),
            }
            .into());
        }
        let body: KlineResponse = resp
            .json()
            .map_err(|e| SchemaError::Malformed(e.to_string()))?;
        parse_klines(*symbol, body)
    }
}

impl SourceAdapter for EastmoneyAdapter {
    fn source(&self) -> DataSource {
        DataSource::Eastmoney
    }

    fn fetch(&self, symbol: &TickerSymbol, lookback_days: u32) -> SourceResult {
        self.fetch_inner(symbol, lookback_days).into()
    }
}

fn parse_klines(symbol: TickerSymbol, body: KlineResponse) -> Result<PriceSeries, Unavailable> {
    // `data: null` is how Eastmoney answers for unknown or delisted codes
    let klines = body.data.map(|d| d.klines).unwrap_or_default();
    if klines.is_empty() {
        return Err(Unavailable::Empty);
    }

    let bars = klines
        .iter()
        .map(|line| parse_row(line))
        .collect::<Result<Vec<_>, _>>()?;

    PriceSeries::canonicalize(symbol, bars).ok_or(Unavailable::Empty)
}

fn parse_row(line: &str) -> Result<PriceBar, SchemaError> {
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() < MIN_FIELDS {
        return Err(SchemaError::FieldCount {
            expected: MIN_FIELDS - 1,
            got: fields.len(),
        });
    }
    let date = NaiveDate::parse_from_str(fields[0].trim(), "%Y-%m-%d")
        .map_err(|_| SchemaError::BadDate(fields[0].to_string()))?;

    Ok(PriceBar {
        date,
        open: parse_num("open", fields[1])?,
        close: parse_num("close", fields[2])?,
        high: parse_num("high", fields[3])?,
        low: parse_num("low", fields[4])?,
        volume: parse_num("volume", fields[5])?,
    })
}
