//! Resilient HTTP client.
//!
//! Wraps a [`Transport`] with bounded retries, exponential backoff and a
//! default timeout. Every source adapter and listing channel is handed an
//! `Arc<ResilientClient>` at construction.
//!
//! Timeout rule: a request without an explicit timeout gets
//! [`RetryPolicy::default_timeout`]. An explicit timeout is used exactly as
//! given, which lets the snapshot adapter stay well below the default.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// HTTP method subset used by the adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Head,
    Options,
}

impl Method {
    fn as_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
            Self::Head => reqwest::Method::HEAD,
            Self::Options => reqwest::Method::OPTIONS,
        }
    }
}

/// An outbound request, independent of the wire library.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub json_body: Option<serde_json::Value>,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            json_body: None,
            timeout: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.json_body = Some(body);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A fully-read response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Body decoded lossily. Sina answers in GBK; only ASCII fields are read from it.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// `Retry-After` in delta-seconds form.
    pub fn retry_after(&self) -> Option<Duration> {
        self.header("retry-after")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    }
}

/// Failure below the HTTP layer.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request could not be sent: {0}")]
    Other(String),
}

impl TransportError {
    /// Timeouts and connection-level failures are worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Connect(_))
    }
}

/// The wire. Production uses [`ReqwestTransport`]; tests script responses.
pub trait Transport: Send + Sync {
    fn execute(&self, request: &HttpRequest, timeout: Duration) -> Result<HttpResponse, TransportError>;
}

/// Blocking `reqwest` transport.
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| TransportError::Other(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    fn execute(&self, request: &HttpRequest, timeout: Duration) -> Result<HttpResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method.as_reqwest(), &request.url)
            .query(&request.query)
            .timeout(timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.json_body {
            builder = builder.json(body);
        }

        let resp = builder.send().map_err(classify)?;
        let status = resp.status().as_u16();
        let headers = resp
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect();
        let body = resp.bytes().map_err(classify)?.to_vec();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn classify(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(e.to_string())
    } else if e.is_builder() {
        TransportError::Other(e.to_string())
    } else {
        // connect refused, reset mid-body, DNS: all transient from our side
        TransportError::Connect(e.to_string())
    }
}

/// Retry budget and backoff shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first (>= 1).
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub retry_statuses: Vec<u16>,
    pub retry_methods: Vec<Method>,
    pub default_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(120),
            retry_statuses: vec![429, 500, 502, 503, 504],
            retry_methods: vec![Method::Head, Method::Get, Method::Options, Method::Post],
            default_timeout: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based): `base * 2^(retry-1)`, capped.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    pub fn effective_timeout(&self, requested: Option<Duration>) -> Duration {
        requested.unwrap_or(self.default_timeout)
    }

    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retry_statuses.contains(&status)
    }

    pub fn is_retryable_method(&self, method: Method) -> bool {
        self.retry_methods.contains(&method)
    }
}

/// Retry budget exhausted, or a non-transient transport failure.
#[derive(Debug, Clone, Error)]
#[error("{url} failed after {attempts} attempt(s){}: {message}", status_suffix(.last_status))]
pub struct NetworkError {
    pub url: String,
    pub attempts: u32,
    pub last_status: Option<u16>,
    pub message: String,
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (last status {s})")).unwrap_or_default()
}

/// HTTP client with retry, backoff and default timeout.
pub struct ResilientClient {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
}

impl ResilientClient {
    pub fn new(transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    /// Client over a blocking `reqwest` transport.
    pub fn with_reqwest(policy: RetryPolicy) -> Result<Self, TransportError> {
        Ok(Self::new(Arc::new(ReqwestTransport::new()?), policy))
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Same transport, different retry budget.
    pub fn with_policy(&self, policy: RetryPolicy) -> Self {
        Self::new(self.transport.clone(), policy)
    }

    /// Send with retries.
    ///
    /// Non-retryable statuses are returned as responses; the caller decides
    /// what a 404 means. Retryable statuses and transient transport failures
    /// are retried until the budget runs out.
    pub fn send(&self, request: &HttpRequest) -> Result<HttpResponse, NetworkError> {
        let timeout = self.policy.effective_timeout(request.timeout);
        let max_attempts = if self.policy.is_retryable_method(request.method) {
            self.policy.max_attempts.max(1)
        } else {
            1
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            let (status, message, hinted) = match self.transport.execute(request, timeout) {
                Ok(resp) if self.policy.is_retryable_status(resp.status) => (
                    Some(resp.status),
                    format!("HTTP {}", resp.status),
                    resp.retry_after(),
                ),
                Ok(resp) => return Ok(resp),
                Err(e) if e.is_transient() => (None, e.to_string(), None),
                Err(e) => {
                    return Err(NetworkError {
                        url: request.url.clone(),
                        attempts: attempt,
                        last_status: None,
                        message: e.to_string(),
                    })
                }
            };

            if attempt >= max_attempts {
                return Err(NetworkError {
                    url: request.url.clone(),
                    attempts: attempt,
                    last_status: status,
                    message,
                });
            }

            let delay = hinted
                .map(|d| d.min(self.policy.max_delay))
                .unwrap_or_else(|| self.policy.backoff(attempt));
            warn!(
                url = %request.url,
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                reason = %message,
                "retrying request"
            );
            std::thread::sleep(delay);
        }
    }
}
