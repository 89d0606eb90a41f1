//! Request dispatch: one target in, one result out.

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, LOCATION};
use reqwest::{Client, Method, Response, StatusCode};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;
use url::Url;

use crate::error::{AttackError, DispatchError};
use crate::models::{Header, Result as AttackResult, Target};

/// Largest redirect body read before following the redirect
const MAX_REDIRECT_BODY: u64 = 64 * 1024;

/// Redirect handling for a dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RedirectPolicy {
    /// Follow every redirect
    #[default]
    Unlimited,
    /// Follow at most this many redirects, failing on the next one
    Limited(usize),
    /// Record the redirect response itself as the result
    NoFollow,
}

/// Per-dispatch policy, captured once when the dispatch is spawned
#[derive(Debug, Clone, Default)]
pub struct DispatchPolicy {
    /// Maximum wait for response headers, per request hop. `None` or zero waits forever.
    pub timeout: Option<Duration>,
    pub redirects: RedirectPolicy,
}

/// A target checked and converted into request parts ahead of the attack
#[derive(Debug, Clone)]
pub(crate) struct PreparedTarget {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl PreparedTarget {
    pub fn new(index: usize, target: &Target) -> Result<Self, AttackError> {
        let method = Method::from_bytes(target.method.as_bytes()).map_err(|_| {
            AttackError::InvalidMethod {
                index,
                method: target.method.clone(),
            }
        })?;

        if !matches!(target.url.scheme(), "http" | "https") || !target.url.has_host() {
            return Err(AttackError::UnsupportedScheme {
                index,
                url: target.url.to_string(),
            });
        }

        Ok(Self {
            method,
            url: target.url.clone(),
            headers: header_map(&target.headers)?,
            body: target.body.clone(),
        })
    }
}

/// Validate every target, failing on the first malformed one
pub(crate) fn prepare_targets(targets: &[Target]) -> Result<Vec<PreparedTarget>, AttackError> {
    if targets.is_empty() {
        return Err(AttackError::NoTargets);
    }

    targets
        .iter()
        .enumerate()
        .map(|(index, target)| PreparedTarget::new(index, target))
        .collect()
}

pub(crate) fn header_map(headers: &[Header]) -> Result<HeaderMap, AttackError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for header in headers {
        let invalid = || AttackError::InvalidHeader {
            name: header.name.clone(),
        };
        let name = HeaderName::from_bytes(header.name.as_bytes()).map_err(|_| invalid())?;
        let value = HeaderValue::from_str(&header.value).map_err(|_| invalid())?;
        map.append(name, value);
    }
    Ok(map)
}

/// Make a single logical request, following redirects as `policy` allows.
///
/// Never fails: every error ends up in the returned result.
pub(crate) async fn make_request(
    client: &Client,
    seq: u64,
    target: &PreparedTarget,
    policy: &DispatchPolicy,
) -> AttackResult {
    let start_time = Instant::now();
    let timestamp = chrono::Utc::now();
    let bytes_out = target.body.len() as u64;

    let mut url = target.url.clone();
    let outcome = follow(client, target, policy, &mut url).await;

    let latency = start_time.elapsed();
    let (status_code, bytes_in, error) = match outcome {
        Ok((status_code, bytes_in)) => (status_code, bytes_in, None),
        Err(err) => (0, 0, Some(err.to_string())),
    };

    debug!(
        seq,
        method = %target.method,
        url = %url,
        status_code,
        latency_ms = latency.as_millis() as u64,
        bytes_in,
        bytes_out,
        error = error.as_deref().unwrap_or(""),
        "request completed"
    );

    AttackResult {
        seq,
        timestamp,
        latency,
        status_code,
        error,
        method: target.method.to_string(),
        url: url.to_string(),
        bytes_in,
        bytes_out,
    }
}

/// Run the request/redirect cycle, leaving the last requested URL in `url`.
/// Returns the final status code and body size.
async fn follow(
    client: &Client,
    target: &PreparedTarget,
    policy: &DispatchPolicy,
    url: &mut Url,
) -> Result<(u16, u64), DispatchError> {
    let mut method = target.method.clone();
    let mut body = target.body.clone();
    let mut redirects = 0usize;

    loop {
        let response = send(client, &method, url, &target.headers, &body, policy).await?;

        let Some(location) = redirect_location(&response, policy) else {
            let status_code = response.status().as_u16();
            let bytes_in = drain(response).await.map_err(DispatchError::Body)?;
            return Ok((status_code, bytes_in));
        };

        if let RedirectPolicy::Limited(limit) = policy.redirects {
            if redirects >= limit {
                return Err(DispatchError::RedirectLimit(limit));
            }
        }

        let next = url
            .join(&location)
            .map_err(|source| DispatchError::InvalidLocation { location, source })?;

        if rewrites_to_get(response.status(), &method) {
            method = Method::GET;
            body = Bytes::new();
        }

        release(response, policy).await;

        redirects += 1;
        *url = next;
    }
}

/// Send one hop and wait for its response headers
async fn send(
    client: &Client,
    method: &Method,
    url: &Url,
    headers: &HeaderMap,
    body: &Bytes,
    policy: &DispatchPolicy,
) -> Result<Response, DispatchError> {
    let mut request = client.request(method.clone(), url.clone()).headers(headers.clone());
    if !body.is_empty() {
        request = request.body(body.clone());
    }

    let pending = request.send();
    let response = match policy.timeout {
        Some(limit) if !limit.is_zero() => tokio::time::timeout(limit, pending)
            .await
            .map_err(|_| DispatchError::Timeout(limit))?,
        _ => pending.await,
    };

    response.map_err(DispatchError::Transport)
}

/// The `Location` to follow, if `response` is a redirect the policy follows
fn redirect_location(response: &Response, policy: &DispatchPolicy) -> Option<String> {
    if policy.redirects == RedirectPolicy::NoFollow {
        return None;
    }

    match response.status() {
        StatusCode::MOVED_PERMANENTLY
        | StatusCode::FOUND
        | StatusCode::SEE_OTHER
        | StatusCode::TEMPORARY_REDIRECT
        | StatusCode::PERMANENT_REDIRECT => {}
        _ => return None,
    }

    // A redirect without a usable Location is the final response.
    let location = response.headers().get(LOCATION)?.to_str().ok()?;
    Some(location.to_string())
}

/// 301, 302 and 303 turn into a bodiless GET, except for HEAD.
/// 307 and 308 replay the original method and body.
fn rewrites_to_get(status: StatusCode, method: &Method) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND | StatusCode::SEE_OTHER
    ) && *method != Method::HEAD
}

/// Read a redirect body so its connection can go back to the pool.
///
/// Only bodies of a known, small length are read, and never for longer than
/// the hop timeout. Anything else is dropped with its connection.
async fn release(response: Response, policy: &DispatchPolicy) {
    if !response
        .content_length()
        .is_some_and(|len| len <= MAX_REDIRECT_BODY)
    {
        return;
    }

    match policy.timeout {
        Some(limit) if !limit.is_zero() => {
            let _ = tokio::time::timeout(limit, drain(response)).await;
        }
        _ => {
            let _ = drain(response).await;
        }
    }
}

/// Read the body to the end, counting its bytes
async fn drain(mut response: Response) -> Result<u64, reqwest::Error> {
    let mut total = 0u64;
    while let Some(chunk) = response.chunk().await? {
        total += chunk.len() as u64;
    }
    Ok(total)
}
