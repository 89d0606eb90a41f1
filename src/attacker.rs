//! The attacker: HTTP client, dispatch policy and attack orchestration.

use arc_swap::ArcSwap;
use reqwest::Client;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::attack::{self, DispatchPolicy, RedirectPolicy, header_map};
use crate::error::AttackError;
use crate::metrics::{AttackStats, Counters};
use crate::models::{Header, Result as AttackResult, Target};
use crate::pacer::Pacer;

/// Lateness of a tick past which the scheduler reports it cannot keep up
const MAX_TICK_LAG: Duration = Duration::from_millis(100);

/// Results the collector reserves room for up front; beyond this it grows
const MAX_PREALLOCATED_RESULTS: u64 = 64 * 1024;

fn header_timeout(timeout: Duration) -> Option<Duration> {
    (!timeout.is_zero()).then_some(timeout)
}

fn initial_capacity(hits: u64) -> usize {
    hits.min(MAX_PREALLOCATED_RESULTS) as usize
}

/// Builder for configuring an [`Attacker`]
///
/// Client-level settings (TLS trust, connection reuse, protocol, headers) are
/// fixed once the attacker is built. The dispatch policy (timeout, redirects)
/// can still be changed afterwards through the attacker's setters.
pub struct AttackerBuilder {
    timeout: Option<Duration>,
    redirects: RedirectPolicy,
    insecure: bool,
    keepalive: bool,
    connections: usize,
    http2: bool,
    compression: bool,
    local_address: Option<IpAddr>,
    headers: Vec<Header>,
}

impl Default for AttackerBuilder {
    fn default() -> Self {
        Self {
            timeout: None,
            redirects: RedirectPolicy::Unlimited,
            insecure: true,
            keepalive: true,
            connections: 10000,
            http2: true,
            compression: false,
            local_address: None,
            headers: Vec::new(),
        }
    }
}

impl AttackerBuilder {
    /// Create a new AttackerBuilder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum wait for response headers. Zero means no timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = header_timeout(timeout);
        self
    }

    /// Set the number of redirects to follow before failing
    pub fn max_redirects(mut self, max_redirects: usize) -> Self {
        self.redirects = RedirectPolicy::Limited(max_redirects);
        self
    }

    pub fn redirects(mut self, redirects: RedirectPolicy) -> Self {
        self.redirects = redirects;
        self
    }

    /// Set whether to accept any server certificate, self-signed included
    pub fn insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    /// Set whether to reuse connections between requests
    pub fn keepalive(mut self, keepalive: bool) -> Self {
        self.keepalive = keepalive;
        self
    }

    /// Set the maximum number of idle connections per host
    pub fn connections(mut self, connections: usize) -> Self {
        self.connections = connections;
        self
    }

    /// Set whether HTTP/2 may be negotiated. When false, only HTTP/1.1 is used.
    pub fn http2(mut self, http2: bool) -> Self {
        self.http2 = http2;
        self
    }

    /// Set whether to request and transparently decode compressed bodies
    pub fn compression(mut self, compression: bool) -> Self {
        self.compression = compression;
        self
    }

    /// Set the local address outgoing connections are bound to
    pub fn local_address(mut self, addr: IpAddr) -> Self {
        self.local_address = Some(addr);
        self
    }

    /// Set the headers sent with every request
    pub fn headers(mut self, headers: Vec<Header>) -> Self {
        self.headers = headers;
        self
    }

    /// Add a single header sent with every request
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push(Header {
            name: name.to_string(),
            value: value.to_string(),
        });
        self
    }

    pub fn build(self) -> Result<Attacker, AttackError> {
        // Redirects are followed by the dispatcher so hops can be counted
        // against the policy snapshot of each dispatch.
        let mut client_builder = Client::builder()
            .use_rustls_tls()
            .redirect(reqwest::redirect::Policy::none())
            .danger_accept_invalid_certs(self.insecure)
            .default_headers(header_map(&self.headers)?)
            .gzip(self.compression)
            .brotli(self.compression)
            .deflate(self.compression);

        client_builder = if self.keepalive {
            client_builder.pool_max_idle_per_host(self.connections)
        } else {
            client_builder.pool_max_idle_per_host(0)
        };

        if !self.http2 {
            client_builder = client_builder.http1_only();
        }

        if let Some(addr) = self.local_address {
            client_builder = client_builder.local_address(addr);
        }

        let client = client_builder.build().map_err(AttackError::Client)?;

        Ok(Attacker {
            client,
            policy: Arc::new(ArcSwap::from_pointee(DispatchPolicy {
                timeout: self.timeout,
                redirects: self.redirects,
            })),
            counters: Arc::new(Counters::default()),
        })
    }
}

/// Fires requests at a target rate and collects their results
///
/// The attacker owns one HTTP client whose connection pool is shared by all
/// of its dispatches. Policy setters take `&self` and may be called at any
/// time; every dispatch loads the policy once, when its tick fires, and keeps
/// that snapshot until it completes. A change made during an attack therefore
/// applies to ticks that fire after it and never to requests already in
/// flight.
#[derive(Clone)]
pub struct Attacker {
    client: Client,
    policy: Arc<ArcSwap<DispatchPolicy>>,
    counters: Arc<Counters>,
}

impl std::fmt::Debug for Attacker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attacker")
            .field("policy", &self.policy())
            .field("stats", &self.counters.snapshot())
            .finish()
    }
}

impl Attacker {
    /// Create an attacker with the default configuration: any certificate is
    /// trusted, no timeout and no redirect limit.
    pub fn new() -> Result<Self, AttackError> {
        AttackerBuilder::new().build()
    }

    pub fn builder() -> AttackerBuilder {
        AttackerBuilder::new()
    }

    /// Replace the response header timeout of subsequent dispatches.
    /// Zero removes it.
    pub fn set_timeout(&self, timeout: Duration) {
        let timeout = header_timeout(timeout);
        self.policy.rcu(|policy| DispatchPolicy {
            timeout,
            ..DispatchPolicy::clone(policy)
        });
    }

    /// Remove the response header timeout of subsequent dispatches
    pub fn clear_timeout(&self) {
        self.policy.rcu(|policy| DispatchPolicy {
            timeout: None,
            ..DispatchPolicy::clone(policy)
        });
    }

    /// Limit subsequent dispatches to `max_redirects` redirect hops
    pub fn set_max_redirects(&self, max_redirects: usize) {
        self.set_redirect_policy(RedirectPolicy::Limited(max_redirects));
    }

    pub fn set_redirect_policy(&self, redirects: RedirectPolicy) {
        self.policy.rcu(|policy| DispatchPolicy {
            redirects,
            ..DispatchPolicy::clone(policy)
        });
    }

    /// The policy the next dispatch would capture
    pub fn policy(&self) -> DispatchPolicy {
        DispatchPolicy::clone(&self.policy.load())
    }

    /// Snapshot of the cumulative counters of this attacker
    pub fn stats(&self) -> AttackStats {
        self.counters.snapshot()
    }

    /// Attack `targets` at `rate` requests per second for `duration`.
    ///
    /// Targets are used round-robin, one per tick. Every tick spawns its own
    /// dispatch task and the schedule never waits for a dispatch to finish, so
    /// slow or hanging responses do not lower the rate. The number of requests
    /// in flight is therefore unbounded: it grows with the latency of the
    /// target.
    ///
    /// Returns once the schedule has run out and every dispatch has completed,
    /// with exactly `round(rate × duration)` results in no particular order.
    /// Malformed targets or an invalid rate are rejected before anything is
    /// sent; failures of individual requests are recorded in their results.
    pub async fn attack(
        &self,
        targets: &[Target],
        rate: f64,
        duration: Duration,
    ) -> Result<Vec<AttackResult>, AttackError> {
        let targets: Arc<[attack::PreparedTarget]> = attack::prepare_targets(targets)?.into();
        let mut pacer = Pacer::new(rate, duration)?;
        let hits = pacer.hits();
        let interval = pacer.interval();

        info!(
            event = "attack_started",
            rate,
            duration_ms = duration.as_millis() as u64,
            hits,
            targets_count = targets.len(),
            "starting attack"
        );

        let (tx, mut rx) = mpsc::channel::<AttackResult>(1000);

        let collector = tokio::spawn(async move {
            let mut collected_results = Vec::with_capacity(initial_capacity(hits));
            while let Some(result) = rx.recv().await {
                collected_results.push(result);
            }
            collected_results
        });

        let started = Instant::now();
        let lag_threshold = interval.max(MAX_TICK_LAG);
        let mut behind = false;

        while let Some(tick) = pacer.tick().await {
            let lag = tick.due.elapsed();
            if lag > lag_threshold && !behind {
                behind = true;
                warn!(
                    seq = tick.seq,
                    lag_ms = lag.as_millis() as u64,
                    "scheduler is falling behind the requested rate"
                );
            }

            // Get the next target (round-robin)
            let target_index = (tick.seq % targets.len() as u64) as usize;
            let targets = targets.clone();
            let client = self.client.clone();
            let policy = self.policy.load_full();
            let counters = self.counters.clone();
            let tx = tx.clone();

            counters.dispatched();
            tokio::spawn(async move {
                let result =
                    attack::make_request(&client, tick.seq, &targets[target_index], &policy).await;
                counters.completed(&result);
                let _ = tx.send(result).await;
            });
        }

        // The channel closes once the last dispatch drops its sender.
        drop(tx);
        let results = collector.await?;

        let successes = results.iter().filter(|r| r.is_success()).count();
        info!(
            event = "attack_completed",
            requests = results.len(),
            successes,
            failures = results.len() - successes,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "attack completed"
        );

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    fn test_default_policy() {
        let attacker = Attacker::new().unwrap();
        let policy = attacker.policy();
        assert_eq!(policy.timeout, None);
        assert_eq!(policy.redirects, RedirectPolicy::Unlimited);
    }

    #[test]
    fn test_setters_replace_policy() {
        let attacker = Attacker::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();

        attacker.set_max_redirects(2);
        attacker.set_timeout(Duration::from_millis(500));

        let policy = attacker.policy();
        assert_eq!(policy.timeout, Some(Duration::from_millis(500)));
        assert_eq!(policy.redirects, RedirectPolicy::Limited(2));

        attacker.clear_timeout();
        attacker.set_redirect_policy(RedirectPolicy::NoFollow);

        let policy = attacker.policy();
        assert_eq!(policy.timeout, None);
        assert_eq!(policy.redirects, RedirectPolicy::NoFollow);
    }

    #[test]
    fn test_zero_timeout_means_none() {
        let attacker = Attacker::builder()
            .timeout(Duration::ZERO)
            .build()
            .unwrap();
        assert_eq!(attacker.policy().timeout, None);

        attacker.set_timeout(Duration::from_secs(1));
        attacker.set_timeout(Duration::ZERO);
        assert_eq!(attacker.policy().timeout, None);
    }

    #[test]
    fn test_result_preallocation_is_capped() {
        assert_eq!(initial_capacity(0), 0);
        assert_eq!(initial_capacity(1500), 1500);
        assert_eq!(initial_capacity(36_000_000), MAX_PREALLOCATED_RESULTS as usize);
        assert_eq!(initial_capacity(u64::MAX), MAX_PREALLOCATED_RESULTS as usize);
    }

    #[test]
    fn test_clones_share_policy_and_counters() {
        let attacker = Attacker::new().unwrap();
        let clone = attacker.clone();

        clone.set_max_redirects(7);
        assert_eq!(attacker.policy().redirects, RedirectPolicy::Limited(7));
        assert_eq!(attacker.stats(), clone.stats());
    }

    #[test]
    fn test_invalid_default_header() {
        let err = Attacker::builder()
            .header("Bad Header", "value")
            .build()
            .unwrap_err();
        assert!(matches!(err, AttackError::InvalidHeader { .. }));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_zero_rate_returns_immediately() {
        let attacker = Attacker::new().unwrap();
        let target = Target::get("http://127.0.0.1:1/").unwrap();

        let results = attacker
            .attack(&[target], 0.0, Duration::from_secs(60))
            .await
            .unwrap();

        assert!(results.is_empty());
        assert_eq!(attacker.stats().requests, 0);
        assert!(logs_contain("attack completed"));
    }

    #[tokio::test]
    async fn test_rejects_malformed_arguments() {
        let attacker = Attacker::new().unwrap();
        let target = Target::get("http://127.0.0.1:1/").unwrap();

        assert!(matches!(
            attacker.attack(&[], 10.0, Duration::from_secs(1)).await,
            Err(AttackError::NoTargets)
        ));
        assert!(matches!(
            attacker
                .attack(&[target], -5.0, Duration::from_secs(1))
                .await,
            Err(AttackError::InvalidRate(_))
        ));
        assert_eq!(attacker.stats().requests, 0);
    }
}
