//! Downstream business API transport
//!
//! [`Downstream`] is the seam between the gateway and the network: one
//! request in, one decoded JSON body (or a classified failure) out. The
//! production implementation is [`HttpDownstream`] over a shared `reqwest`
//! client; tests substitute in-process stubs.

use std::error::Error as StdError;
use std::time::Duration;

use async_trait::async_trait;
use bizmcp_utils::{BridgeError, Result};
use reqwest::{Method, Url};
use serde_json::Value;
use tracing::debug;

/// One call against the business API
#[derive(Debug, Clone, PartialEq)]
pub struct DownstreamRequest {
    pub method: Method,
    /// Absolute path, resolved against the base URL
    pub path: &'static str,
    pub query: Vec<(&'static str, String)>,
    pub body: Option<Value>,
}

impl DownstreamRequest {
    pub fn get(path: &'static str) -> Self {
        Self {
            method: Method::GET,
            path,
            query: Vec::new(),
            body: None,
        }
    }

    pub fn post(path: &'static str, body: Value) -> Self {
        Self {
            method: Method::POST,
            path,
            query: Vec::new(),
            body: Some(body),
        }
    }

    pub fn with_query(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.query.push((key, value.into()));
        self
    }
}

/// Why a downstream call produced no usable body
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DownstreamError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("business server unreachable: {0}")]
    Unreachable(String),

    #[error("HTTP {status}: {}", .detail.as_deref().unwrap_or("no detail"))]
    Status { status: u16, detail: Option<String> },

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("request failed: {0}")]
    Request(String),
}

impl DownstreamError {
    /// HTTP status of a non-2xx reply
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Transport used by the gateway
#[async_trait]
pub trait Downstream: Send + Sync {
    /// Issue exactly one request; never retried
    async fn send(&self, request: DownstreamRequest) -> std::result::Result<Value, DownstreamError>;
}

/// `reqwest`-backed transport with a bounded per-request timeout
#[derive(Debug, Clone)]
pub struct HttpDownstream {
    client: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

impl HttpDownstream {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| BridgeError::config(format!("invalid downstream base_url '{}': {}", base_url, e)))?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BridgeError::internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn classify(&self, err: reqwest::Error) -> DownstreamError {
        if err.is_timeout() {
            DownstreamError::Timeout(self.timeout)
        } else if err.is_connect() {
            DownstreamError::Unreachable(error_chain(&err))
        } else if err.is_decode() {
            DownstreamError::Decode(error_chain(&err))
        } else {
            DownstreamError::Request(error_chain(&err))
        }
    }
}

#[async_trait]
impl Downstream for HttpDownstream {
    async fn send(&self, request: DownstreamRequest) -> std::result::Result<Value, DownstreamError> {
        let url = self
            .base_url
            .join(request.path)
            .map_err(|e| DownstreamError::Request(format!("bad path '{}': {}", request.path, e)))?;

        debug!(method = %request.method, %url, "Calling business server");

        let mut builder = self.client.request(request.method, url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| self.classify(e))?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DownstreamError::Status {
                status: status.as_u16(),
                detail: error_detail(&body),
            });
        }

        let text = response.text().await.map_err(|e| self.classify(e))?;
        serde_json::from_str(&text).map_err(|e| DownstreamError::Decode(e.to_string()))
    }
}

/// Pull a human-readable detail out of an error body
///
/// Understands `{"detail": "..."}`; otherwise falls back to the raw text.
fn error_detail(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }

    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => match map.get("detail") {
            Some(Value::String(detail)) => Some(detail.clone()),
            Some(other) => Some(other.to_string()),
            None => Some(body.to_string()),
        },
        _ => Some(body.chars().take(200).collect()),
    }
}

/// Render an error with all of its sources
fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
