//! Push notifications — best effort, never fails the run.
//!
//! Provider order: PushPlus when its token is set, else WxPusher when both
//! its token and a uid are set, else a log line.
//!
//! A push is sent at most once. POST is dropped from the retry methods, so a
//! timeout after the provider accepted the message cannot deliver it twice.

use sequoia_core::data::{HttpRequest, Method, ResilientClient};
use serde_json::json;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::PushConfig;
use crate::scan::ScanResult;
use crate::sink::NO_SELECTION;

const PUSHPLUS_URL: &str = "http://www.pushplus.plus/send";
const WXPUSHER_URL: &str = "https://wxpusher.zjiecode.com/api/send/message";

pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, content: &str);
}

/// The shared client with POST retries removed.
fn push_client(client: &ResilientClient) -> Arc<ResilientClient> {
    let mut policy = client.policy().clone();
    policy.retry_methods.retain(|m| *m != Method::Post);
    Arc::new(client.with_policy(policy))
}

fn post(client: &ResilientClient, provider: &str, request: HttpRequest) {
    match client.send(&request) {
        Ok(resp) if resp.is_success() => {
            info!(provider, "push delivered");
            debug!(provider, body = %resp.text(), "push response");
        }
        Ok(resp) => warn!(provider, status = resp.status, body = %resp.text(), "push rejected"),
        Err(e) => warn!(provider, error = %e, "push failed"),
    }
}

pub struct PushPlusNotifier {
    client: Arc<ResilientClient>,
    token: String,
}

impl PushPlusNotifier {
    pub fn new(client: Arc<ResilientClient>, token: impl Into<String>) -> Self {
        Self {
            client: push_client(&client),
            token: token.into(),
        }
    }
}

impl Notifier for PushPlusNotifier {
    fn notify(&self, title: &str, content: &str) {
        // html template: keep line breaks visible
        let request = HttpRequest::post(PUSHPLUS_URL).json(json!({
            "token": self.token,
            "title": title,
            "content": content.replace('\n', "<br>"),
            "template": "html",
        }));
        post(&self.client, "pushplus", request);
    }
}

pub struct WxPusherNotifier {
    client: Arc<ResilientClient>,
    app_token: String,
    uids: Vec<String>,
}

impl WxPusherNotifier {
    pub fn new(client: Arc<ResilientClient>, app_token: impl Into<String>, uid: impl Into<String>) -> Self {
        Self {
            client: push_client(&client),
            app_token: app_token.into(),
            uids: vec![uid.into()],
        }
    }
}

impl Notifier for WxPusherNotifier {
    fn notify(&self, title: &str, content: &str) {
        let request = HttpRequest::post(WXPUSHER_URL).json(json!({
            "appToken": self.app_token,
            "content": content,
            "summary": title,
            "contentType": 1,
            "uids": self.uids,
        }));
        post(&self.client, "wxpusher", request);
    }
}

/// No push provider configured.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, content: &str) {
        info!(title, "no push token configured, skipping push");
        debug!(%content, "unsent push content");
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

pub fn select_notifier(push: &PushConfig, client: Arc<ResilientClient>) -> Box<dyn Notifier> {
    if let Some(token) = non_blank(&push.pushplus_token) {
        return Box::new(PushPlusNotifier::new(client, token));
    }
    if let (Some(token), Some(uid)) = (non_blank(&push.wxpusher_token), non_blank(&push.wxpusher_uid)) {
        return Box::new(WxPusherNotifier::new(client, token, uid));
    }
    Box::new(LogNotifier)
}

/// Selected symbols, grouped by signal.
pub fn strategy_message(result: &ScanResult) -> String {
    if result.selected.is_empty() {
        return NO_SELECTION.to_string();
    }
    let mut out = String::new();
    for signal in &result.signals {
        let symbols: Vec<String> = result.hits_for(signal).map(|h| h.symbol.to_string()).collect();
        if symbols.is_empty() {
            continue;
        }
        let _ = writeln!(out, "**{signal}** ({})", symbols.len());
        for symbol in symbols {
            let _ = writeln!(out, "{symbol}");
        }
    }
    let _ = write!(out, "selected: {}", result.selected.len());
    out
}

/// Breadth counts for the run.
pub fn stats_message(result: &ScanResult) -> String {
    let s = &result.stats;
    let mut out = String::new();
    let _ = writeln!(out, "universe: {} ({})", result.universe_size, result.universe_source);
    let _ = writeln!(out, "fetched: {}", s.fetched);
    let _ = writeln!(out, "limit up: {}", s.limit_up);
    let _ = writeln!(out, "limit down: {}", s.limit_down);
    let _ = writeln!(out, "gainers: {}", s.gainers);
    let _ = writeln!(out, "losers: {}", s.losers);
    let _ = write!(out, "triggered: {}", s.triggered);
    if result.deadline_expired {
        let _ = write!(out, "\ndeadline expired, {} not scanned", result.deadline_skipped);
    }
    out
}
