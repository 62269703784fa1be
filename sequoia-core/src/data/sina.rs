//! Sina real-time quote adapter (tertiary source).
//!
//! Last resort: a single bar for the current trading day, no history. Useful
//! for signals that only look at today's price; anything needing a moving
//! average will report insufficient history on a series from here.
//!
//! Response shape (positional, comma-delimited):
//! `var hq_str_sz000001="name,open,prev_close,price,high,low,bid,ask,volume,amount,...,date,time,status";`

use super::http::{HttpRequest, ResilientClient};
use super::provider::{parse_num, DataSource, SchemaError, SourceAdapter, SourceResult, Unavailable};
use crate::clock;
use crate::domain::{PriceBar, PriceSeries, TickerSymbol};
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;

const QUOTE_URL: &str = "http://hq.sinajs.cn/";
const REFERER: &str = "https://finance.sina.com.cn";
/// Index of the trade date; the response must have more fields than this.
const DATE_FIELD: usize = 30;

pub struct SinaAdapter {
    client: Arc<ResilientClient>,
    timeout: Duration,
}

impl SinaAdapter {
    /// `timeout` is sent explicitly on every request so the client's long
    /// default never applies here.
    pub fn new(client: Arc<ResilientClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    fn fetch_inner(&self, symbol: &TickerSymbol) -> Result<PriceSeries, Unavailable> {
        let request = HttpRequest::get(QUOTE_URL)
            .query("list", symbol.sina_code())
            .header("Referer", REFERER)
            .timeout(self.timeout);
        let resp = self.client.send(&request)?;
        if !resp.is_success() {
            return Err(SchemaError::Rejected {
                code: i64::from(resp.status),
                message: "non-success HTTP status".into(),
            }
            .into());
        }
        parse_snapshot(*symbol, &resp.text(), clock::china_today())
    }
}

impl SourceAdapter for SinaAdapter {
    fn source(&self) -> DataSource {
        DataSource::Sina
    }

    /// The lookback window is ignored: this source only knows today.
    fn fetch(&self, symbol: &TickerSymbol, _lookback_days: u32) -> SourceResult {
        self.fetch_inner(symbol).into()
    }
}

fn parse_snapshot(symbol: TickerSymbol, text: &str, today: NaiveDate) -> Result<PriceSeries, Unavailable> {
    // unknown codes come back as `var hq_str_sz000000="";`
    if !text.contains(',') {
        return Err(Unavailable::Empty);
    }
    let fields: Vec<&str> = text.split(',').collect();
    if fields.len() <= DATE_FIELD {
        return Err(SchemaError::FieldCount {
            expected: DATE_FIELD,
            got: fields.len(),
        }
        .into());
    }

    let date = NaiveDate::parse_from_str(fields[DATE_FIELD].trim(), "%Y-%m-%d").unwrap_or(today);
    let bar = PriceBar {
        date,
        open: parse_num("open", fields[1])?,
        close: parse_num("close", fields[3])?,
        high: parse_num("high", fields[4])?,
        low: parse_num("low", fields[5])?,
        volume: parse_num("volume", fields[8])?,
    };

    // suspended stocks report zero prices and are dropped here
    PriceSeries::canonicalize(symbol, vec![bar]).ok_or(Unavailable::Empty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::http::testing::client;
    use crate::data::http::HttpResponse;

    fn sym() -> TickerSymbol {
        TickerSymbol::parse("000001.SZ").unwrap()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 6).unwrap()
    }

    fn quote(date: &str, open: &str) -> String {
        let mut fields = vec![
            "var hq_str_sz000001=\"PAYH".to_string(),
            open.to_string(),
            "11.09".into(),
            "11.20".into(),
            "11.25".into(),
            "11.05".into(),
            "11.19".into(),
            "11.20".into(),
            "81234567".into(),
            "907654321.000".into(),
        ];
        fields.extend((10..30).map(|i| format!("{i}")));
        fields.push(date.to_string());
        fields.push("15:00:00".into());
        fields.push("00\";".into());
        fields.join(",")
    }

    #[test]
    fn parses_positional_fields() {
        let series = parse_snapshot(sym(), &quote("2024-05-06", "11.10"), today()).unwrap();
        assert_eq!(series.len(), 1);
        let bar = series.last();
        assert_eq!(bar.open, 11.10);
        assert_eq!(bar.close, 11.20);
        assert_eq!(bar.high, 11.25);
        assert_eq!(bar.low, 11.05);
        assert_eq!(bar.volume, 81234567.0);
        assert_eq!(bar.date, today());
    }

    #[test]
    fn uses_quote_date_when_present() {
        let series = parse_snapshot(sym(), &quote("2024-05-03", "11.10"), today()).unwrap();
        assert_eq!(series.last().date, NaiveDate::from_ymd_opt(2024, 5, 3).unwrap());
    }

    #[test]
    fn falls_back_to_today_on_bad_date() {
        let series = parse_snapshot(sym(), &quote("n/a", "11.10"), today()).unwrap();
        assert_eq!(series.last().date, today());
    }

    #[test]
    fn short_response_is_field_count_error() {
        let text = "var hq_str_sz000001=\"PAYH,11.10,11.09,11.20\";";
        assert!(matches!(
            parse_snapshot(sym(), text, today()),
            Err(Unavailable::Schema(SchemaError::FieldCount { got: 4, .. }))
        ));
    }

    #[test]
    fn empty_quote_is_empty() {
        assert!(matches!(
            parse_snapshot(sym(), "var hq_str_sz000001=\"\";", today()),
            Err(Unavailable::Empty)
        ));
    }

    #[test]
    fn suspended_quote_is_empty() {
        assert!(matches!(
            parse_snapshot(sym(), &quote("2024-05-06", "0.000"), today()),
            Err(Unavailable::Empty)
        ));
    }

    #[test]
    fn request_has_short_timeout_and_referer() {
        let (transport, client) = client(vec![Ok(HttpResponse::new(200, quote("2024-05-06", "11.10")))]);
        let adapter = SinaAdapter::new(Arc::new(client), Duration::from_secs(5));
        assert!(adapter.fetch(&sym(), 365).is_available());

        let calls = transport.calls.lock();
        let (req, timeout) = &calls[0];
        assert_eq!(*timeout, Duration::from_secs(5));
        assert!(req.query.contains(&("list".to_string(), "sz000001".to_string())));
        assert!(req.headers.iter().any(|(k, _)| k == "Referer"));
    }
}
