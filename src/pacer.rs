//! Constant-rate tick scheduling.
//!
//! A [`Pacer`] hands out exactly `round(rate × duration)` ticks. Tick `n` is
//! due at `start + n / rate`; each deadline is computed from the start instant
//! rather than from the previous tick, so timer lateness never accumulates.
//! When the caller falls behind, overdue ticks are released immediately, in a
//! burst, until the schedule is caught up.
//!
//! The pacer never waits on anything but the clock. Whatever the caller does
//! with a tick (spawning a dispatch, typically) has no influence on when the
//! next one is released.

use std::time::Duration;
use tokio::time::Instant;

use crate::error::AttackError;

/// A scheduled instant at which the next request should be initiated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// Zero-based position of this tick in the attack
    pub seq: u64,
    /// When the tick was due
    pub due: Instant,
}

#[derive(Debug)]
pub struct Pacer {
    rate: f64,
    hits: u64,
    sent: u64,
    start: Option<Instant>,
}

impl Pacer {
    /// Create a pacer releasing `rate` ticks per second for `duration`
    pub fn new(rate: f64, duration: Duration) -> Result<Self, AttackError> {
        if !rate.is_finite() || rate < 0.0 {
            return Err(AttackError::InvalidRate(rate));
        }

        let hits = (rate * duration.as_secs_f64()).round() as u64;

        Ok(Self {
            rate,
            hits,
            sent: 0,
            start: None,
        })
    }

    /// Total number of ticks this pacer will release
    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// Number of ticks released so far
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Spacing between two consecutive ticks
    pub fn interval(&self) -> Duration {
        if self.rate > 0.0 {
            Duration::from_secs_f64(1.0 / self.rate)
        } else {
            Duration::ZERO
        }
    }

    /// Offset from the start of the attack at which tick `seq` is due
    pub fn offset(&self, seq: u64) -> Duration {
        if self.rate > 0.0 {
            Duration::from_secs_f64(seq as f64 / self.rate)
        } else {
            Duration::ZERO
        }
    }

    /// Wait for the next tick to become due.
    ///
    /// The first call fixes the start of the schedule. Returns `None` once all
    /// ticks have been released.
    pub async fn tick(&mut self) -> Option<Tick> {
        if self.sent >= self.hits {
            return None;
        }

        let start = *self.start.get_or_insert_with(Instant::now);
        let due = start + self.offset(self.sent);

        if due > Instant::now() {
            tokio::time::sleep_until(due).await;
        }

        let tick = Tick {
            seq: self.sent,
            due,
        };
        self.sent += 1;
        Some(tick)
    }
}
