use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

/// Represents a target for the load test
///
/// A target is never mutated by an attack; the same value is shared by every
/// dispatch that cycles onto it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// The HTTP method (GET, POST, etc.)
    pub method: String,
    /// The URL to request
    pub url: Url,
    /// HTTP headers to include in the request. A name may appear more than once.
    #[serde(default)]
    pub headers: Vec<Header>,
    /// Request body, sent verbatim
    #[serde(default)]
    pub body: Bytes,
}

impl Target {
    /// Create a target with no headers and an empty body
    pub fn new(method: &str, url: &str) -> std::result::Result<Self, url::ParseError> {
        Ok(Self {
            method: method.to_string(),
            url: Url::parse(url)?,
            headers: Vec::new(),
            body: Bytes::new(),
        })
    }

    /// Create a GET target
    pub fn get(url: &str) -> std::result::Result<Self, url::ParseError> {
        Self::new("GET", url)
    }

    /// Create a POST target carrying `body`
    pub fn post(url: &str, body: impl Into<Bytes>) -> std::result::Result<Self, url::ParseError> {
        Ok(Self::new("POST", url)?.with_body(body))
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push(Header {
            name: name.to_string(),
            value: value.to_string(),
        });
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }
}

/// Represents an HTTP header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Header name
    pub name: String,
    /// Header value
    pub value: String,
}

/// Represents the result of a single dispatch
///
/// Exactly one of `status_code != 0` and `error.is_some()` holds. A non-2xx
/// response is still a transport-level success and leaves `error` empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Result {
    /// Sequence number of the tick that triggered this dispatch
    pub seq: u64,
    /// When the request was started
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// How long the request took, redirects and body read included
    pub latency: Duration,
    /// HTTP status code, 0 if no response was received
    pub status_code: u16,
    /// Error message if the request failed
    pub error: Option<String>,
    /// Method of the target that was requested
    pub method: String,
    /// URL of the last request made for this dispatch
    pub url: String,
    /// Size of the response body in bytes
    pub bytes_in: u64,
    /// Size of the request body in bytes
    pub bytes_out: u64,
}

impl Result {
    /// Whether the dispatch received a response without a transport or policy error
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.status_code != 0
    }
}

/// Represents metrics from a load test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metrics {
    /// Total number of requests
    pub requests: usize,
    /// Number of successful requests (2xx status)
    pub success: usize,
    /// Time between the earliest and latest request start
    pub duration: Duration,
    /// Minimum latency observed
    pub min: Duration,
    /// Maximum latency observed
    pub max: Duration,
    /// Mean latency
    pub mean: Duration,
    /// 50th percentile latency
    pub p50: Duration,
    /// 90th percentile latency
    pub p90: Duration,
    /// 95th percentile latency
    pub p95: Duration,
    /// 99th percentile latency
    pub p99: Duration,
    /// Requests per second
    pub rate: f64,
    /// Total bytes received
    pub bytes_in: u64,
    /// Total bytes sent
    pub bytes_out: u64,
    /// Success rate (0.0 - 1.0)
    pub success_rate: f64,
    /// Number of results per status code (0 = no response)
    pub status_codes: BTreeMap<u16, usize>,
    /// Number of results per distinct error message
    pub errors: BTreeMap<String, usize>,
}
