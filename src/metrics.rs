use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::models::{Metrics, Result as AttackResult};

/// Live counters shared by every dispatch of an attacker
///
/// Dispatches finish concurrently on different worker threads, so every
/// update is a single atomic add.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    requests: AtomicU64,
    in_flight: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    bytes_in: AtomicU64,
    bytes_out: AtomicU64,
}

impl Counters {
    pub fn dispatched(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.in_flight.fetch_add(1, Ordering::Relaxed);
    }

    pub fn completed(&self, result: &AttackResult) {
        if result.is_success() {
            self.successes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        self.bytes_in.fetch_add(result.bytes_in, Ordering::Relaxed);
        self.bytes_out.fetch_add(result.bytes_out, Ordering::Relaxed);
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> AttackStats {
        AttackStats {
            requests: self.requests.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            bytes_in: self.bytes_in.load(Ordering::Relaxed),
            bytes_out: self.bytes_out.load(Ordering::Relaxed),
        }
    }
}

/// Cumulative counters of an attacker, across all of its attacks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackStats {
    /// Dispatches started
    pub requests: u64,
    /// Dispatches started but not yet completed
    pub in_flight: u64,
    /// Dispatches that received a response
    pub successes: u64,
    /// Dispatches that ended with an error
    pub failures: u64,
    /// Response body bytes received
    pub bytes_in: u64,
    /// Request body bytes sent
    pub bytes_out: u64,
}

/// Calculate metrics from attack results
///
/// Results may be in any order. Returns `None` for an empty slice.
pub fn calculate_metrics(results: &[AttackResult]) -> Option<Metrics> {
    let first_timestamp = results.iter().map(|r| r.timestamp).min()?;
    let last_timestamp = results.iter().map(|r| r.timestamp).max()?;

    let requests = results.len();
    let success = results
        .iter()
        .filter(|r| (200..300).contains(&r.status_code))
        .count();
    let success_rate = success as f64 / requests as f64;

    let duration = (last_timestamp - first_timestamp)
        .to_std()
        .unwrap_or(Duration::ZERO);

    // Calculate latency statistics
    let mut latencies: Vec<Duration> = results.iter().map(|r| r.latency).collect();
    latencies.sort();

    let min = latencies.first().copied().unwrap_or_default();
    let max = latencies.last().copied().unwrap_or_default();
    let sum: Duration = latencies.iter().sum();
    let mean = sum / latencies.len() as u32;

    let rate = if duration > Duration::ZERO {
        requests as f64 / duration.as_secs_f64()
    } else {
        0.0
    };

    let mut status_codes = BTreeMap::new();
    let mut errors = BTreeMap::new();
    for result in results {
        *status_codes.entry(result.status_code).or_insert(0) += 1;
        if let Some(error) = &result.error {
            *errors.entry(error.clone()).or_insert(0) += 1;
        }
    }

    Some(Metrics {
        requests,
        success,
        duration,
        min,
        max,
        mean,
        p50: percentile(&latencies, 0.5),
        p90: percentile(&latencies, 0.9),
        p95: percentile(&latencies, 0.95),
        p99: percentile(&latencies, 0.99),
        rate,
        bytes_in: results.iter().map(|r| r.bytes_in).sum(),
        bytes_out: results.iter().map(|r| r.bytes_out).sum(),
        success_rate,
        status_codes,
        errors,
    })
}

/// Nearest-rank percentile of an ascending list of durations
fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }

    let rank = (sorted.len() as f64 * p).ceil() as usize;
    sorted[rank.saturating_sub(1).min(sorted.len() - 1)]
}
