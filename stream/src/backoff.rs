//! Reconnection backoff policy.
//!
//! Failed connection attempts are retried on an exponential schedule: the
//! base delay doubles per attempt, a uniform random jitter is added on top,
//! and the pre-jitter delay is capped. After the configured maximum number
//! of attempts the client gives up and emits a terminal signal instead of
//! retrying forever.

use rand::Rng;
use std::time::Duration;

/// Backoff configuration for the reconnecting stream client.
///
/// # Default Values
///
/// - `base_delay`: 1 second
/// - `max_delay`: 30 seconds (pre-jitter cap)
/// - `max_jitter`: 1 second
/// - `max_attempts`: 10
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Delay before the first reconnection attempt.
    pub base_delay: Duration,
    /// Cap for the exponential schedule, before jitter.
    pub max_delay: Duration,
    /// Upper bound (exclusive) of the uniform random jitter added per attempt.
    pub max_jitter: Duration,
    /// Attempts after which the client gives up.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_jitter: Duration::from_secs(1),
            max_attempts: 10,
        }
    }
}

impl ReconnectPolicy {
    /// Create a new policy builder.
    #[must_use]
    pub fn builder() -> ReconnectPolicyBuilder {
        ReconnectPolicyBuilder::default()
    }

    /// Deterministic (pre-jitter) delay for a given attempt number.
    ///
    /// Attempts are 1-based: attempt 1 waits `base_delay`, and each further
    /// attempt doubles the previous delay, capped at `max_delay`. The
    /// resulting schedule is non-decreasing.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let delay = self
            .base_delay
            .saturating_mul(2_u32.saturating_pow(exponent));
        delay.min(self.max_delay)
    }

    /// Delay for an attempt with the random jitter applied.
    #[must_use]
    pub fn delay_with_jitter(&self, attempt: u32) -> Duration {
        let jitter_ms = self.max_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::thread_rng().gen_range(0..jitter_ms))
        };
        self.delay_for_attempt(attempt) + jitter
    }
}

/// Builder for [`ReconnectPolicy`].
#[derive(Debug, Clone, Default)]
pub struct ReconnectPolicyBuilder {
    base_delay: Option<Duration>,
    max_delay: Option<Duration>,
    max_jitter: Option<Duration>,
    max_attempts: Option<u32>,
}

impl ReconnectPolicyBuilder {
    /// Set the delay before the first reconnection attempt.
    #[must_use]
    pub const fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = Some(delay);
        self
    }

    /// Set the pre-jitter cap for the exponential schedule.
    #[must_use]
    pub const fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = Some(delay);
        self
    }

    /// Set the upper bound of the per-attempt random jitter.
    #[must_use]
    pub const fn max_jitter(mut self, jitter: Duration) -> Self {
        self.max_jitter = Some(jitter);
        self
    }

    /// Set the attempt count after which the client gives up.
    #[must_use]
    pub const fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Build the [`ReconnectPolicy`].
    #[must_use]
    pub fn build(self) -> ReconnectPolicy {
        let defaults = ReconnectPolicy::default();
        ReconnectPolicy {
            base_delay: self.base_delay.unwrap_or(defaults.base_delay),
            max_delay: self.max_delay.unwrap_or(defaults.max_delay),
            max_jitter: self.max_jitter.unwrap_or(defaults.max_jitter),
            max_attempts: self.max_attempts.unwrap_or(defaults.max_attempts),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_delay_doubles_per_attempt() {
        let policy = ReconnectPolicy::builder()
            .base_delay(Duration::from_millis(100))
            .max_delay(Duration::from_secs(10))
            .build();

        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(800));
    }

    #[test]
    fn test_delay_caps_at_max() {
        let policy = ReconnectPolicy::builder()
            .base_delay(Duration::from_secs(1))
            .max_delay(Duration::from_secs(30))
            .build();

        // 1s * 2^9 = 512s, capped at 30s.
        assert_eq!(policy.delay_for_attempt(10), Duration::from_secs(30));
        // Huge attempt numbers must not overflow.
        assert_eq!(policy.delay_for_attempt(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn test_jitter_stays_under_bound() {
        let policy = ReconnectPolicy::builder()
            .base_delay(Duration::from_millis(10))
            .max_jitter(Duration::from_millis(50))
            .build();

        for _ in 0..100 {
            let jittered = policy.delay_with_jitter(1);
            assert!(jittered >= Duration::from_millis(10));
            assert!(jittered < Duration::from_millis(60));
        }
    }

    proptest! {
        #[test]
        fn delays_are_nondecreasing_and_capped(attempt in 1u32..64) {
            let policy = ReconnectPolicy::default();
            let current = policy.delay_for_attempt(attempt);
            let next = policy.delay_for_attempt(attempt + 1);
            prop_assert!(next >= current);
            prop_assert!(current <= Duration::from_millis(30_000));
        }
    }
}
