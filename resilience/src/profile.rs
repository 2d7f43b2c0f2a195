//! Resilience profiles per dependency kind.
//!
//! A profile bundles the breaker, retry, timeout and rate-limit settings that
//! apply to every call to one kind of dependency.

use crate::circuit_breaker::CircuitBreakerConfig;
use crate::rate_limiter::{Algorithm, RateLimitConfig};
use crate::retry::{Backoff, RetryPolicy};
use beverage_inventor_core::DependencyKind;
use serde::Deserialize;
use std::time::Duration;

const MINUTE: Duration = Duration::from_secs(60);

/// Breaker, retry, timeout and rate-limit settings for one dependency kind.
#[derive(Debug, Clone)]
pub struct ResilienceProfile {
    /// Breaker thresholds
    pub breaker: CircuitBreakerConfig,
    /// Retry policy
    pub retry: RetryPolicy,
    /// Per-call timeout
    pub timeout: Duration,
    /// Rate limit
    pub rate_limit: RateLimitConfig,
}

impl ResilienceProfile {
    /// Built-in profile for `kind`.
    #[must_use]
    pub fn for_kind(kind: DependencyKind) -> Self {
        let breaker = CircuitBreakerConfig::builder()
            .max_failures(5)
            .reset_timeout(Duration::from_secs(60))
            .success_threshold(3)
            .build();
        let retry = |attempts: u32, base_ms: u64, cap_secs: u64, jitter: f64| {
            RetryPolicy::builder()
                .max_attempts(attempts)
                .backoff(Backoff::Exponential {
                    base: Duration::from_millis(base_ms),
                    cap: Duration::from_secs(cap_secs),
                    multiplier: 2.0,
                    jitter,
                })
                .build()
        };

        match kind {
            DependencyKind::Database => Self {
                breaker,
                retry: retry(3, 100, 5, 0.1),
                timeout: Duration::from_secs(5),
                rate_limit: RateLimitConfig::sliding_window(1000, MINUTE),
            },
            DependencyKind::EventBus => Self {
                breaker,
                retry: retry(5, 200, 10, 0.2),
                timeout: Duration::from_secs(3),
                rate_limit: RateLimitConfig::token_bucket(500, MINUTE, 50),
            },
            DependencyKind::AiProvider => Self {
                breaker,
                retry: retry(3, 1_000, 30, 0.1),
                timeout: Duration::from_secs(30),
                rate_limit: RateLimitConfig::token_bucket(60, MINUTE, 10)
                    .with_max_wait(Duration::from_secs(10)),
            },
            DependencyKind::ExternalApi => Self {
                breaker,
                retry: retry(3, 500, 15, 0.1),
                timeout: Duration::from_secs(15),
                rate_limit: RateLimitConfig::token_bucket(100, MINUTE, 20)
                    .with_max_wait(Duration::from_secs(5)),
            },
        }
    }

    /// Apply configured overrides on top of this profile.
    #[must_use]
    pub fn with_overrides(mut self, overrides: &ProfileOverride) -> Self {
        let breaker = &mut self.breaker;
        if let Some(v) = overrides.max_failures {
            breaker.max_failures = v;
        }
        if let Some(v) = overrides.failure_threshold {
            breaker.failure_threshold = v;
        }
        if let Some(v) = overrides.min_request_threshold {
            breaker.min_request_threshold = v;
        }
        if let Some(ms) = overrides.reset_timeout_ms {
            breaker.reset_timeout = Duration::from_millis(ms);
        }
        if let Some(v) = overrides.success_threshold {
            breaker.success_threshold = v;
        }
        if let Some(v) = overrides.half_open_max_calls {
            breaker.half_open_max_calls = v;
        }
        if let Some(v) = overrides.max_attempts {
            self.retry.max_attempts = v;
        }
        if let Some(backoff) = overrides.backoff {
            self.retry.backoff = backoff;
        }
        if let Some(ms) = overrides.timeout_ms {
            self.timeout = Duration::from_millis(ms);
        }
        let limit = &mut self.rate_limit;
        if let Some(algorithm) = overrides.rate_algorithm {
            limit.algorithm = algorithm;
        }
        if let Some(v) = overrides.rate {
            limit.rate = v;
        }
        if let Some(ms) = overrides.rate_window_ms {
            limit.window = Duration::from_millis(ms);
        }
        if let Some(v) = overrides.burst_size {
            limit.burst_size = v;
        }
        if let Some(ms) = overrides.max_wait_ms {
            limit.max_wait = Duration::from_millis(ms);
        }
        self
    }

    /// Check every component.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid setting.
    pub fn validate(&self) -> Result<(), String> {
        self.breaker.validate().map_err(|e| format!("breaker: {e}"))?;
        if self.retry.max_attempts == 0 {
            return Err("retry: max_attempts must be >= 1".into());
        }
        if self.timeout.is_zero() {
            return Err("timeout must be > 0".into());
        }
        self.rate_limit.validate().map_err(|e| format!("rate_limit: {e}"))
    }
}

/// Optional per-field overrides, as read from configuration.
///
/// Durations are in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProfileOverride {
    /// Consecutive failures that open the breaker
    pub max_failures: Option<u32>,
    /// Window failure ratio that opens the breaker
    pub failure_threshold: Option<f64>,
    /// Outcomes needed before the ratio applies
    pub min_request_threshold: Option<u32>,
    /// Open duration
    pub reset_timeout_ms: Option<u64>,
    /// Half-open successes that close the breaker
    pub success_threshold: Option<u32>,
    /// Concurrent half-open probes
    pub half_open_max_calls: Option<u32>,
    /// Total attempts
    pub max_attempts: Option<u32>,
    /// Delay schedule
    pub backoff: Option<Backoff>,
    /// Per-call timeout
    pub timeout_ms: Option<u64>,
    /// Limiter algorithm
    pub rate_algorithm: Option<Algorithm>,
    /// Calls per window
    pub rate: Option<u32>,
    /// Limiter window
    pub rate_window_ms: Option<u64>,
    /// Bucket capacity
    pub burst_size: Option<u32>,
    /// Longest acquire wait
    pub max_wait_ms: Option<u64>,
}
