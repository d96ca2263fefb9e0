//! Reconnect backoff used when the collector stays unreachable.

use std::time::{Duration, Instant};

use rand::{Rng, SeedableRng, rngs::StdRng};

use super::config::BackoffPolicy;

const MIN_DELAY_MS: u64 = 10;

/// Tracks consecutive connect failures and defers the next attempt by a
/// jittered, exponentially growing delay.
pub(crate) struct BackoffState {
    policy: BackoffPolicy,
    current: Duration,
    next_attempt: Option<Instant>,
    failures: u32,
    rng: StdRng,
}

impl BackoffState {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            current: policy.base,
            next_attempt: None,
            failures: 0,
            rng: StdRng::from_entropy(),
            policy,
        }
    }

    /// Whether a connect attempt may be made at `now`.
    pub fn attempt_due(&self, now: Instant) -> bool {
        self.next_attempt.is_none_or(|at| now >= at)
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Reset after a successful connect.
    pub fn record_success(&mut self) {
        self.current = self.policy.base;
        self.next_attempt = None;
        self.failures = 0;
    }

    /// Record a failed connect at `now` and return the chosen delay.
    pub fn record_failure(&mut self, now: Instant) -> Duration {
        if self.failures > 0 {
            self.current = self.current.saturating_mul(2).min(self.policy.cap);
        }
        self.failures = self.failures.saturating_add(1);
        let delay = self.jittered();
        self.next_attempt = Some(now + delay);
        delay
    }

    fn jittered(&mut self) -> Duration {
        let max_ms = self.current.as_millis().min(u128::from(u64::MAX)) as u64;
        let delay_ms = match max_ms {
            0 => MIN_DELAY_MS,
            1..=MIN_DELAY_MS => max_ms,
            _ => self.rng.gen_range(MIN_DELAY_MS..=max_ms),
        };
        Duration::from_millis(delay_ms)
    }
}
