// src/fetch/retry.rs
//! Bounded retry with exponential backoff for fallible async operations.
//!
//! Only errors whose `FetchError::is_retryable()` is true are retried. Terminal kinds
//! (missing credentials, not found, rejected auth, malformed upstream data) return
//! after the first attempt.

use std::future::Future;
use std::time::Duration;

use metrics::counter;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::fetch::types::FetchError;

fn default_max_attempts() -> u32 {
    3
}
fn default_initial_delay_ms() -> u64 {
    500
}
fn default_backoff_multiplier() -> f64 {
    2.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// Scale each delay by a random factor in 0.75..=1.25.
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: false,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration, backoff_multiplier: f64) -> Self {
        Self {
            max_attempts,
            initial_delay_ms: initial_delay.as_millis() as u64,
            backoff_multiplier,
            jitter: false,
        }
        .sanitized()
    }

    /// Single attempt, no sleeping.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO, 1.0)
    }

    pub fn with_jitter(mut self, on: bool) -> Self {
        self.jitter = on;
        self
    }

    /// Clamp to `max_attempts >= 1` and `backoff_multiplier >= 1`.
    pub fn sanitized(mut self) -> Self {
        self.max_attempts = self.max_attempts.max(1);
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            self.backoff_multiplier = 1.0;
        }
        self
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    /// Un-jittered sleeps between attempts: `initial, initial*m, initial*m^2, ...`
    /// (`max_attempts - 1` entries). Produced lazily; nothing is allocated up front.
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        let p = self.clone().sanitized();
        let mult = p.backoff_multiplier;
        std::iter::successors(Some(p.initial_delay_ms as f64), move |ms| Some(ms * mult))
            .take(p.max_attempts.saturating_sub(1) as usize)
            .map(|ms| Duration::from_millis(ms.round() as u64))
    }

    fn jittered(&self, d: Duration) -> Duration {
        if !self.jitter || d.is_zero() {
            return d;
        }
        let factor: f64 = rand::rng().random_range(0.75..=1.25);
        Duration::from_millis((d.as_millis() as f64 * factor).max(1.0) as u64)
    }
}

/// Run `op` until it succeeds, fails terminally, or `max_attempts` is exhausted.
/// The last error is returned on exhaustion.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let policy = policy.clone().sanitized();
    let mut delays = policy.delays();
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if !e.is_retryable() => {
                tracing::debug!(op = label, attempt, error = %e, kind = e.kind(), "terminal failure, not retrying");
                return Err(e);
            }
            Err(e) => {
                let Some(delay) = delays.next() else {
                    tracing::warn!(op = label, attempts = attempt, error = %e, "retries exhausted");
                    return Err(e);
                };
                let delay = policy.jittered(delay);
                tracing::warn!(
                    op = label,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "transient failure, backing off"
                );
                counter!("fetch_retries_total").increment(1);
                tokio::time::sleep(delay).await;
            }
        }
    }
}
