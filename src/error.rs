use std::time::Duration;
use thiserror::Error;

/// Errors returned by an attack as a whole.
///
/// These are only raised before the first request is sent; once the attack
/// is running, every failure is isolated into its own result.
#[derive(Debug, Error)]
pub enum AttackError {
    #[error("no targets specified")]
    NoTargets,

    #[error("invalid rate {0}: must be a finite, non-negative number of requests per second")]
    InvalidRate(f64),

    #[error("target #{index}: invalid HTTP method {method:?}")]
    InvalidMethod { index: usize, method: String },

    #[error("target #{index}: unsupported URL scheme in {url}")]
    UnsupportedScheme { index: usize, url: String },

    #[error("invalid header {name:?}")]
    InvalidHeader { name: String },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("result collector stopped unexpectedly: {0}")]
    Collector(#[from] tokio::task::JoinError),
}

/// Failure of a single dispatch, recorded in the result's `error` field.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("timeout awaiting response headers after {}", format_limit(.0))]
    Timeout(Duration),

    #[error("stopped after {0} redirects")]
    RedirectLimit(usize),

    #[error("invalid redirect location {location:?}: {source}")]
    InvalidLocation {
        location: String,
        #[source]
        source: url::ParseError,
    },

    #[error("request failed: {}", error_chain(.0))]
    Transport(#[source] reqwest::Error),

    #[error("failed to read response body: {}", error_chain(.0))]
    Body(#[source] reqwest::Error),
}

fn format_limit(limit: &Duration) -> humantime::FormattedDuration {
    humantime::format_duration(*limit)
}

/// Render an error followed by each of its sources, `: `-separated.
///
/// reqwest keeps the interesting part (refused, reset, certificate) in the
/// source chain rather than in its own message.
fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let message = cause.to_string();
        if !rendered.contains(&message) {
            rendered.push_str(": ");
            rendered.push_str(&message);
        }
        source = cause.source();
    }
    rendered
}
