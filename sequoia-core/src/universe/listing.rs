//! Remote listing channels for the universe resolver.
//!
//! A channel returns raw codes exactly as the upstream ships them: bare
//! (`600519`), unpadded (`1`) or suffixed (`600519.SH`). Board filtering and
//! suffix derivation happen in the resolver, uniformly for every channel.

use crate::data::http::{HttpRequest, ResilientClient};
use crate::data::provider::{SchemaError, Unavailable};
use crate::data::tushare::{cell_str, TushareApi};
use crate::data::NetworkError;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ListingError {
    #[error("network: {0}")]
    Network(#[from] NetworkError),

    #[error("schema: {0}")]
    Schema(#[from] SchemaError),

    #[error("{0}")]
    Source(#[from] Unavailable),
}

/// One source of the full-market code list.
pub trait ListingChannel: Send + Sync {
    fn name(&self) -> &str;

    fn list(&self) -> Result<Vec<String>, ListingError>;
}

const CLIST_URL: &str = "https://82.push2.eastmoney.com/api/qt/clist/get";
const CLIST_UT: &str = "bd1d9ddb04089700cf9c27f6f7426281";
/// Shanghai + Shenzhen A-share boards, as used by the spot listing.
const CLIST_FS: &str = "m:0 t:6,m:0 t:80,m:1 t:2,m:1 t:23,m:0 t:81 s:2048";

#[derive(Debug, Deserialize)]
struct ClistResponse {
    data: Option<ClistData>,
}

#[derive(Debug, Deserialize)]
struct ClistData {
    #[serde(default)]
    total: usize,
    #[serde(default)]
    diff: Vec<ClistRow>,
}

#[derive(Debug, Deserialize)]
struct ClistRow {
    f12: Value,
}

/// Eastmoney spot listing, paginated.
pub struct EastmoneyListing {
    client: Arc<ResilientClient>,
    page_size: usize,
    max_pages: usize,
}

impl EastmoneyListing {
    pub fn new(client: Arc<ResilientClient>) -> Self {
        Self {
            client,
            page_size: 100,
            max_pages: 200,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn page(&self, page: usize) -> Result<ClistData, ListingError> {
        let request = HttpRequest::get(CLIST_URL)
            .query("pn", page.to_string())
            .query("pz", self.page_size.to_string())
            .query("po", "1")
            .query("np", "1")
            .query("ut", CLIST_UT)
            .query("fltt", "2")
            .query("invt", "2")
            .query("fid", "f12")
            .query("fs", CLIST_FS)
            .query("fields", "f12");
        let resp = self.client.send(&request)?;
        if !resp.is_success() {
            return Err(SchemaError::Rejected {
                code: i64::from(resp.status),
                message: "non-success HTTP status".into(),
            }
            .into());
        }
        let body: ClistResponse = resp
            .json()
            .map_err(|e| SchemaError::Malformed(e.to_string()))?;
        body.data
            .ok_or_else(|| SchemaError::Malformed("listing has no data".into()).into())
    }
}

impl ListingChannel for EastmoneyListing {
    fn name(&self) -> &str {
        "eastmoney"
    }

    fn list(&self) -> Result<Vec<String>, ListingError> {
        let mut codes = Vec::new();
        for page in 1..=self.max_pages {
            let data = self.page(page)?;
            if data.diff.is_empty() {
                break;
            }
            codes.extend(data.diff.iter().filter_map(|row| match &row.f12 {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            }));
            if codes.len() >= data.total {
                break;
            }
        }
        debug!(channel = "eastmoney", raw = codes.len(), "listing fetched");
        Ok(codes)
    }
}

/// Tushare `stock_basic` listing. Needs the Tushare token.
pub struct TushareListing {
    api: Arc<TushareApi>,
}

impl TushareListing {
    pub fn new(api: Arc<TushareApi>) -> Self {
        Self { api }
    }
}

impl ListingChannel for TushareListing {
    fn name(&self) -> &str {
        "tushare"
    }

    fn list(&self) -> Result<Vec<String>, ListingError> {
        let table = self
            .api
            .query("stock_basic", json!({ "list_status": "L" }), "ts_code,symbol")?;
        let col = table.column("ts_code")?;
        let codes = table
            .items
            .iter()
            .filter_map(|row| row.get(col))
            .map(|v| cell_str("ts_code", v).map(str::to_string))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(channel = "tushare", raw = codes.len(), "listing fetched");
        Ok(codes)
    }
}
