//! Bounded retry policy for transient store failures.
//!
//! Sleeping and jitter sit behind traits so services can be driven in tests
//! without waiting on real timers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Attempt budget and exponential backoff bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Policy with `max_attempts` and default backoff bounds. Zero is
    /// treated as one attempt.
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Attempt budget, never below one.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Exponential base delay before retrying after `attempt` failed.
    ///
    /// # Examples
    /// ```
    /// use std::time::Duration;
    /// use learning_platform::domain::RetryPolicy;
    ///
    /// let policy = RetryPolicy::default();
    /// assert_eq!(policy.base_delay(1), Duration::from_millis(50));
    /// assert_eq!(policy.base_delay(2), Duration::from_millis(100));
    /// ```
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let factor = 1_u32 << exponent;
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

/// Async sleeping abstraction for retries.
#[async_trait]
pub trait RetrySleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Retry backoff jitter abstraction.
pub trait BackoffJitter: Send + Sync {
    /// Return a jittered delay derived from `base`.
    fn jittered_delay(&self, base: Duration, attempt: u32, now: DateTime<Utc>) -> Duration;
}

/// Tokio-based sleeper.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl RetrySleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Adds up to a quarter of the base delay, seeded from the clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttemptJitter;

impl BackoffJitter for AttemptJitter {
    fn jittered_delay(&self, base: Duration, attempt: u32, now: DateTime<Utc>) -> Duration {
        let base_ms = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
        let max_extra = (base_ms / 4).max(1);
        let seed = u64::from(now.timestamp_subsec_nanos()) ^ u64::from(attempt);
        let extra = seed % max_extra.saturating_add(1);
        Duration::from_millis(base_ms.saturating_add(extra))
    }
}

/// Sleeper and jitter bundle injected into services that retry.
#[derive(Clone)]
pub struct RetryRuntime {
    pub sleeper: Arc<dyn RetrySleeper>,
    pub jitter: Arc<dyn BackoffJitter>,
}

impl Default for RetryRuntime {
    fn default() -> Self {
        Self {
            sleeper: Arc::new(TokioSleeper),
            jitter: Arc::new(AttemptJitter),
        }
    }
}


#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(1, 50)]
    #[case(2, 100)]
    #[case(3, 200)]
    #[case(10, 1_000)]
    #[case(40, 1_000)]
    fn base_delay_doubles_and_caps(#[case] attempt: u32, #[case] millis: u64) {
        let policy = RetryPolicy::default();
        assert_eq!(policy.base_delay(attempt), Duration::from_millis(millis));
    }

    #[rstest]
    fn zero_attempts_still_runs_once() {
        assert_eq!(RetryPolicy::with_max_attempts(0).attempts(), 1);
    }

    #[rstest]
    fn jitter_stays_within_a_quarter() {
        let now = Utc
            .with_ymd_and_hms(2026, 2, 26, 12, 0, 0)
            .single()
            .expect("valid time");
        let base = Duration::from_millis(100);
        let delay = AttemptJitter.jittered_delay(base, 2, now);
        assert!(delay >= base);
        assert!(delay <= base + Duration::from_millis(25));
    }
}
