//! Retry logic with pluggable backoff for handling transient failures.
//!
//! A [`RetryPolicy`] bounds the number of attempts, the time spent on each
//! attempt and on the whole loop, and decides which classified errors are
//! worth another try.
//!
//! # Example
//!
//! ```rust
//! use beverage_inventor_resilience::retry::{Backoff, RetryPolicy, retry_with_policy};
//! use beverage_inventor_core::InventorError;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), InventorError> {
//! let policy = RetryPolicy::builder()
//!     .max_attempts(3)
//!     .backoff(Backoff::exponential(Duration::from_millis(100), Duration::from_secs(5)))
//!     .build();
//!
//! let result = retry_with_policy(&policy, "repository.save", None, |_attempt| async {
//!     Ok::<_, InventorError>(42)
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

use crate::metrics::RetryMetrics;
use crate::timeout;
use beverage_inventor_core::{ErrorKind, InventorError, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, sleep};

/// Delay schedule between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum Backoff {
    /// Same delay every time
    Fixed {
        /// Delay
        #[serde(with = "millis")]
        delay: Duration,
    },
    /// `base + step·n`, capped
    Linear {
        /// First delay
        #[serde(with = "millis")]
        base: Duration,
        /// Added per retry
        #[serde(with = "millis")]
        step: Duration,
        /// Upper bound
        #[serde(with = "millis")]
        cap: Duration,
    },
    /// `base · multiplier^n ± jitter`, capped
    Exponential {
        /// First delay
        #[serde(with = "millis")]
        base: Duration,
        /// Upper bound
        #[serde(with = "millis")]
        cap: Duration,
        /// Growth factor
        multiplier: f64,
        /// Proportional jitter (0.1 = ±10 %)
        jitter: f64,
    },
    /// Uniform in `[base, min(cap, previous·3)]`
    DecorrelatedJitter {
        /// Lower bound
        #[serde(with = "millis")]
        base: Duration,
        /// Upper bound
        #[serde(with = "millis")]
        cap: Duration,
    },
}

impl Backoff {
    /// Exponential doubling with 10 % jitter.
    #[must_use]
    pub const fn exponential(base: Duration, cap: Duration) -> Self {
        Self::Exponential {
            base,
            cap,
            multiplier: 2.0,
            jitter: 0.1,
        }
    }

    /// Upper bound on any delay this schedule produces.
    #[must_use]
    pub const fn cap(&self) -> Duration {
        match *self {
            Self::Fixed { delay } => delay,
            Self::Linear { cap, .. } | Self::Exponential { cap, .. } | Self::DecorrelatedJitter { cap, .. } => cap,
        }
    }

    /// Delay before retry number `retry` (0 for the first retry).
    ///
    /// `previous` is the last delay slept, used by decorrelated jitter.
    #[must_use]
    #[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
    pub fn delay(&self, retry: u32, previous: Duration, rng: &mut impl Rng) -> Duration {
        match *self {
            Self::Fixed { delay } => delay,
            Self::Linear { base, step, cap } => base.saturating_add(step.saturating_mul(retry)).min(cap),
            Self::Exponential {
                base,
                cap,
                multiplier,
                jitter,
            } => {
                let raw = base.as_secs_f64() * multiplier.powi(retry.min(64) as i32);
                let capped = raw.min(cap.as_secs_f64());
                let spread = capped * jitter.clamp(0.0, 1.0);
                let jittered = if spread > 0.0 {
                    capped + rng.gen_range(-spread..=spread)
                } else {
                    capped
                };
                Duration::from_secs_f64(jittered.clamp(0.0, cap.as_secs_f64())).min(cap)
            }
            Self::DecorrelatedJitter { base, cap } => {
                let upper = cap.min(previous.max(base).saturating_mul(3));
                if upper <= base {
                    return upper;
                }
                Duration::from_secs_f64(rng.gen_range(base.as_secs_f64()..=upper.as_secs_f64())).min(upper)
            }
        }
    }
}

/// Decide whether an error is worth another attempt, given the next delay.
pub type RetryPredicate = Arc<dyn Fn(&InventorError, Duration) -> bool + Send + Sync>;

/// Default classification.
///
/// `timeout`, `transient_io` and `rate_limited` retry. `circuit_open` retries
/// only when the breaker admits a probe within `next_delay`.
#[must_use]
pub fn default_predicate(err: &InventorError, next_delay: Duration) -> bool {
    match err.kind {
        ErrorKind::CircuitOpen => err.retry_after.is_some_and(|after| after <= next_delay),
        kind => kind.is_retryable(),
    }
}

/// Retry policy.
#[derive(Clone)]
pub struct RetryPolicy {
    /// Total attempts, the first included
    pub max_attempts: u32,
    /// Bound on each attempt
    pub per_attempt_timeout: Option<Duration>,
    /// Bound on the whole loop, sleeps included
    pub overall_deadline: Option<Duration>,
    /// Delay schedule
    pub backoff: Backoff,
    predicate: Option<RetryPredicate>,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("per_attempt_timeout", &self.per_attempt_timeout)
            .field("overall_deadline", &self.overall_deadline)
            .field("backoff", &self.backoff)
            .field("custom_predicate", &self.predicate.is_some())
            .finish()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RetryPolicy {
    /// Create a new policy builder.
    #[must_use]
    pub const fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder {
            max_attempts: None,
            per_attempt_timeout: None,
            overall_deadline: None,
            backoff: None,
            predicate: None,
        }
    }

    /// Single attempt, no retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self::builder().max_attempts(1).build()
    }

    /// Whether `err` should be retried before sleeping `next_delay`.
    #[must_use]
    pub fn should_retry(&self, err: &InventorError, next_delay: Duration) -> bool {
        self.predicate
            .as_ref()
            .map_or_else(|| default_predicate(err, next_delay), |p| p(err, next_delay))
    }
}

/// Builder for [`RetryPolicy`].
#[derive(Clone)]
pub struct RetryPolicyBuilder {
    max_attempts: Option<u32>,
    per_attempt_timeout: Option<Duration>,
    overall_deadline: Option<Duration>,
    backoff: Option<Backoff>,
    predicate: Option<RetryPredicate>,
}

impl RetryPolicyBuilder {
    /// Set total attempts (at least 1).
    #[must_use]
    pub const fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Bound each attempt.
    #[must_use]
    pub const fn per_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.per_attempt_timeout = Some(timeout);
        self
    }

    /// Bound the whole loop.
    #[must_use]
    pub const fn overall_deadline(mut self, deadline: Duration) -> Self {
        self.overall_deadline = Some(deadline);
        self
    }

    /// Set the delay schedule.
    #[must_use]
    pub const fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = Some(backoff);
        self
    }

    /// Replace the default retry predicate.
    #[must_use]
    pub fn predicate<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&InventorError, Duration) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    /// Build the [`RetryPolicy`].
    #[must_use]
    pub fn build(self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.unwrap_or(3).max(1),
            per_attempt_timeout: self.per_attempt_timeout,
            overall_deadline: self.overall_deadline,
            backoff: self
                .backoff
                .unwrap_or_else(|| Backoff::exponential(Duration::from_millis(100), Duration::from_secs(5))),
            predicate: self.predicate,
        }
    }
}

/// One attempt handed to the retried operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    /// 1-based attempt number
    pub number: u32,
    /// Deadline for this attempt
    pub deadline: Option<Instant>,
}

/// Retry an async operation under `policy`.
///
/// `parent` is the caller's deadline; the loop never runs past it or past the
/// policy's overall deadline. Each attempt is bounded by the earliest of those
/// and the per-attempt timeout.
///
/// # Errors
///
/// Returns the first non-retryable error, or the last error once attempts or
/// time run out.
pub async fn retry_with_policy<F, Fut, T>(
    policy: &RetryPolicy,
    operation: &str,
    parent: Option<Instant>,
    mut attempt_fn: F,
) -> Result<T>
where
    F: FnMut(Attempt) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let loop_deadline = timeout::earliest(parent, policy.overall_deadline.map(|d| Instant::now() + d));
    let mut previous_delay = Duration::ZERO;
    let mut number = 1;

    loop {
        let attempt_deadline = timeout::earliest(
            loop_deadline,
            policy.per_attempt_timeout.map(|t| Instant::now() + t),
        );
        let attempt = Attempt {
            number,
            deadline: attempt_deadline,
        };
        let outcome = match attempt_deadline {
            Some(deadline) => timeout::run_until(operation, deadline, attempt_fn(attempt)).await,
            None => attempt_fn(attempt).await,
        };

        let err = match outcome {
            Ok(value) => {
                if number > 1 {
                    RetryMetrics::record_success(operation);
                    tracing::info!(operation, attempt = number, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        let delay = policy
            .backoff
            .delay(number - 1, previous_delay, &mut rand::thread_rng());

        if !policy.should_retry(&err, delay) {
            tracing::debug!(operation, attempt = number, error = %err, "Error is not retryable, failing immediately");
            return Err(err);
        }

        if number >= policy.max_attempts {
            RetryMetrics::record_exhausted(operation);
            tracing::error!(operation, attempt = number, error = %err, "Operation failed after max attempts");
            return Err(err);
        }

        if loop_deadline.is_some_and(|d| Instant::now() + delay >= d) {
            RetryMetrics::record_exhausted(operation);
            tracing::error!(operation, attempt = number, error = %err, "Retry deadline reached");
            return Err(err);
        }

        tracing::warn!(
            operation,
            attempt = number,
            delay_ms = delay.as_millis(),
            error = %err,
            "Operation failed, retrying..."
        );
        RetryMetrics::record_attempt(operation);

        sleep(delay).await;
        previous_delay = delay;
        number += 1;
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    #[allow(clippy::cast_possible_truncation)]
    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
