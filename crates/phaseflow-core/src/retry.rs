//! Retry policy for phase executors.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Retry policy applied to transient executor failures.
///
/// Attempts are 1-based: attempt `1` is the first invocation. The delay
/// waited after a failed attempt `n` is
/// `min(initial_delay * backoff_multiplier^(n-1), max_delay)`.
///
/// # Examples
///
/// ```
/// use phaseflow_core::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::new(
///     5,
///     Duration::from_secs(2),
///     2.0,
///     Duration::from_secs(30),
/// )?;
///
/// let delays: Vec<u64> = (1..=5).map(|n| policy.next_delay(n).as_secs()).collect();
/// assert_eq!(delays, vec![2, 4, 8, 16, 30]);
///
/// assert!(policy.should_retry(4));
/// assert!(!policy.should_retry(5));
/// # Ok::<(), phaseflow_core::RetryPolicyError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RetryPolicyRepr", into = "RetryPolicyRepr")]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
    backoff_multiplier: f64,
    max_delay: Duration,
}

const NANOS_PER_SEC: f64 = 1_000_000_000.0;

/// Error returned when [`RetryPolicy`] configuration is invalid.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct RetryPolicyError(pub &'static str);

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

impl RetryPolicy {
    /// Creates a validated retry policy.
    ///
    /// # Errors
    ///
    /// Returns [`RetryPolicyError`] if:
    /// - `max_attempts` is 0
    /// - `backoff_multiplier` is not a finite number `>= 1.0`
    /// - `max_delay` is less than `initial_delay`
    pub fn new(
        max_attempts: u32,
        initial_delay: Duration,
        backoff_multiplier: f64,
        max_delay: Duration,
    ) -> Result<Self, RetryPolicyError> {
        if max_attempts == 0 {
            return Err(RetryPolicyError("max_attempts must be at least 1"));
        }
        if !backoff_multiplier.is_finite() || backoff_multiplier < 1.0 {
            return Err(RetryPolicyError(
                "backoff_multiplier must be a finite number >= 1.0",
            ));
        }
        if max_delay < initial_delay {
            return Err(RetryPolicyError("max_delay must be >= initial_delay"));
        }
        Ok(Self {
            max_attempts,
            initial_delay,
            backoff_multiplier,
            max_delay,
        })
    }

    /// A single attempt, no retry.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            max_delay: Duration::ZERO,
        }
    }

    /// Up to `max_attempts` attempts with a constant `delay` between them.
    ///
    /// `max_attempts` is clamped to at least 1.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay: delay,
            backoff_multiplier: 1.0,
            max_delay: delay,
        }
    }

    /// Exponential backoff doubling from `initial_delay`, capped at 60s.
    ///
    /// ```
    /// use phaseflow_core::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::exponential(4, Duration::from_millis(100));
    /// assert_eq!(policy.next_delay(1), Duration::from_millis(100));
    /// assert_eq!(policy.next_delay(3), Duration::from_millis(400));
    /// ```
    pub fn exponential(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            backoff_multiplier: 2.0,
            max_delay: initial_delay.max(Duration::from_secs(60)),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn backoff_multiplier(&self) -> f64 {
        self.backoff_multiplier
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Delay to wait after the failed attempt `attempt` (1-based).
    ///
    /// Saturates at `max_delay` instead of overflowing.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        if self.initial_delay.is_zero() {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let scaled = self.initial_delay.as_nanos() as f64 * self.backoff_multiplier.powi(exponent);
        if !scaled.is_finite() || scaled >= self.max_delay.as_nanos() as f64 {
            return self.max_delay;
        }
        // Split into whole seconds so delays beyond u64 nanoseconds stay exact.
        let secs = (scaled / NANOS_PER_SEC).floor();
        let nanos = (scaled - secs * NANOS_PER_SEC).round();
        Duration::from_secs(secs as u64)
            .saturating_add(Duration::from_nanos(nanos as u64))
            .min(self.max_delay)
    }

    /// Returns `true` iff another attempt is allowed after `attempt`.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RetryPolicyRepr {
    max_attempts: u32,
    #[serde(default)]
    initial_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    backoff_multiplier: f64,
    #[serde(default)]
    max_delay_ms: Option<u64>,
}

fn default_multiplier() -> f64 {
    1.0
}

impl TryFrom<RetryPolicyRepr> for RetryPolicy {
    type Error = RetryPolicyError;

    fn try_from(repr: RetryPolicyRepr) -> Result<Self, Self::Error> {
        let initial_delay = Duration::from_millis(repr.initial_delay_ms);
        let max_delay = repr
            .max_delay_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| initial_delay.max(Duration::from_secs(60)));
        RetryPolicy::new(
            repr.max_attempts,
            initial_delay,
            repr.backoff_multiplier,
            max_delay,
        )
    }
}

impl From<RetryPolicy> for RetryPolicyRepr {
    fn from(policy: RetryPolicy) -> Self {
        Self {
            max_attempts: policy.max_attempts,
            initial_delay_ms: u64::try_from(policy.initial_delay.as_millis()).unwrap_or(u64::MAX),
            backoff_multiplier: policy.backoff_multiplier,
            max_delay_ms: Some(u64::try_from(policy.max_delay.as_millis()).unwrap_or(u64::MAX)),
        }
    }
}
