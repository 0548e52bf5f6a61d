//! Retry policy for the transaction runner.
//!
//! A conflicting transaction is re-run after a backoff that doubles from
//! [`RetryPolicy::base_delay`] up to [`RetryPolicy::max_delay`]. Jitter
//! spreads each delay by a random factor around its nominal value, so
//! transactions that collided on one key do not wake up together. The run
//! stops when either the attempt limit or the optional time budget is used.

use rand::Rng;
use std::time::Duration;

/// Jitter factor applied by [`RetryPolicy::with_jitter`].
pub const DEFAULT_JITTER: f64 = 0.25;

/// How [`KvStore::transact`](crate::KvStore::transact) retries conflicts.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,
    /// Backoff before the first retry.
    pub base_delay: Duration,
    /// Upper bound for the nominal backoff.
    pub max_delay: Duration,
    /// Jitter factor in `[0, 1]`. A delay `d` becomes a random value in
    /// `[d * (1 - jitter), d * (1 + jitter)]`.
    pub jitter: f64,
    /// Budget for the whole run, measured from the first attempt.
    pub timeout: Option<Duration>,
}

impl RetryPolicy {
    /// Creates a policy allowing `max_attempts` attempts.
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(250),
            jitter: DEFAULT_JITTER,
            timeout: None,
        }
    }

    /// Creates a policy that gives up on the first conflict.
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: 0.0,
            timeout: None,
        }
    }

    /// Sets the backoff before the first retry.
    #[must_use]
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Sets the cap on the nominal backoff.
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Turns jitter on ([`DEFAULT_JITTER`]) or off.
    #[must_use]
    pub fn with_jitter(mut self, enabled: bool) -> Self {
        self.jitter = if enabled { DEFAULT_JITTER } else { 0.0 };
        self
    }

    /// Sets the jitter factor, clamped to `[0, 1]`.
    #[must_use]
    pub fn with_jitter_factor(mut self, factor: f64) -> Self {
        self.jitter = factor.clamp(0.0, 1.0);
        self
    }

    /// Bounds the total time spent on one unit of work.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Nominal backoff before retry number `retry` (1-based), without jitter.
    #[must_use]
    pub fn nominal_delay(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        1u32.checked_shl(retry - 1)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Backoff to sleep before retry number `retry`, with jitter applied.
    #[must_use]
    pub fn backoff(&self, retry: u32) -> Duration {
        apply_jitter(self.nominal_delay(retry), self.jitter)
    }

    /// Returns true if another attempt may start after `attempts` attempts
    /// have failed and `elapsed` will have passed by the time it starts.
    #[must_use]
    pub fn permits(&self, attempts: u32, elapsed: Duration) -> bool {
        attempts < self.max_attempts.max(1) && self.timeout.map_or(true, |limit| elapsed <= limit)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(20)
    }
}

fn apply_jitter(delay: Duration, factor: f64) -> Duration {
    if factor <= 0.0 || delay.is_zero() {
        return delay;
    }
    let factor = factor.min(1.0);
    let nominal = delay.as_secs_f64();
    let jittered = rand::thread_rng().gen_range(nominal * (1.0 - factor)..=nominal * (1.0 + factor));
    Duration::from_secs_f64(jittered)
}
