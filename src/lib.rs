//! Barrage - A programmable HTTP load generation engine
//!
//! Barrage fires HTTP requests at a fixed rate for a fixed duration and
//! records the outcome of every single one of them. Request pacing runs on
//! the wall clock only: a slow or unresponsive server keeps receiving
//! requests at the configured rate, each request being cut off by its own
//! timeout rather than holding back the next one.
//!
//! # Example
//!
//! ```rust,no_run
//! use barrage::{Attacker, Target};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let target = Target::get("https://example.com")?
//!         .with_header("User-Agent", "barrage");
//!
//!     let attacker = Attacker::builder()
//!         .timeout(Duration::from_secs(5))
//!         .max_redirects(3)
//!         .build()?;
//!
//!     // 50 requests per second for 30 seconds: 1500 results
//!     let results = attacker
//!         .attack(&[target], 50.0, Duration::from_secs(30))
//!         .await?;
//!
//!     println!("Attack completed with {} results", results.len());
//!     Ok(())
//! }
//! ```

mod attack;
mod attacker;
pub mod encode;
mod error;
mod metrics;
mod models;
mod pacer;

// Re-export the main types for library users
pub use attack::{DispatchPolicy, RedirectPolicy};
pub use attacker::{Attacker, AttackerBuilder};
pub use error::{AttackError, DispatchError};
pub use metrics::{AttackStats, calculate_metrics};
pub use models::{Header, Metrics, Result as AttackResult, Target};
pub use pacer::{Pacer, Tick};

use std::time::Duration;

/// Attack `targets` at `rate` requests per second for `duration` with a
/// default [`Attacker`].
///
/// A fresh attacker is built for every call: it trusts any certificate, has
/// no timeout and follows redirects without limit. Use [`Attacker`] directly
/// to change these or to reuse connections across attacks.
pub async fn attack(
    targets: &[Target],
    rate: f64,
    duration: Duration,
) -> Result<Vec<AttackResult>, AttackError> {
    Attacker::new()?.attack(targets, rate, duration).await
}
