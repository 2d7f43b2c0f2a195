//! Rate limiting per dependency.
//!
//! ## Algorithms
//!
//! ```text
//! Token bucket (capacity = burst_size, refill = rate / window)
//! ├─ Tokens refill continuously, fractionally, on every acquire
//! ├─ Each call consumes one token
//! └─ Empty bucket → wait for the next token, or reject
//!
//! Sliding window (at most `rate` calls in any `window`)
//! ├─ Ordered log of admission timestamps
//! ├─ Entries older than `window` are pruned on every acquire
//! └─ Full log → wait for the oldest entry to expire, or reject
//! ```
//!
//! Callers never queue past `max_wait`: if the projected delay is longer the
//! acquire fails fast with `rate_limited`.

use crate::metrics::LimiterMetrics;
use beverage_inventor_core::{InventorError, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Limiting algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    /// Continuous refill, bursts up to `burst_size`
    TokenBucket,
    /// Exact count over a trailing window
    SlidingWindow,
}

/// Rate limiter configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Algorithm
    pub algorithm: Algorithm,
    /// Calls admitted per `window`
    pub rate: u32,
    /// Window length
    pub window: Duration,
    /// Bucket capacity (token bucket only)
    pub burst_size: u32,
    /// Longest an acquire may wait
    pub max_wait: Duration,
}

impl RateLimitConfig {
    /// Token bucket with `rate` per `window` and the given burst.
    #[must_use]
    pub const fn token_bucket(rate: u32, window: Duration, burst_size: u32) -> Self {
        Self {
            algorithm: Algorithm::TokenBucket,
            rate,
            window,
            burst_size,
            max_wait: Duration::from_secs(1),
        }
    }

    /// Sliding window of `rate` per `window`.
    #[must_use]
    pub const fn sliding_window(rate: u32, window: Duration) -> Self {
        Self {
            algorithm: Algorithm::SlidingWindow,
            rate,
            window,
            burst_size: rate,
            max_wait: Duration::from_secs(1),
        }
    }

    /// Set the longest an acquire may wait.
    #[must_use]
    pub const fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    fn refill_per_sec(&self) -> f64 {
        f64::from(self.rate) / self.window.as_secs_f64().max(f64::EPSILON)
    }

    /// Check that the limiter can admit anything at all.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.rate == 0 {
            return Err("rate must be > 0".into());
        }
        if self.window.is_zero() {
            return Err("window must be > 0".into());
        }
        if self.algorithm == Algorithm::TokenBucket && self.burst_size == 0 {
            return Err("burst_size must be > 0".into());
        }
        Ok(())
    }
}

#[derive(Debug)]
enum LimiterState {
    Bucket { tokens: f64, last_refill: Instant },
    Window { log: VecDeque<Instant> },
}

/// Point-in-time limiter metrics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RateLimiterMetrics {
    /// Resolved acquires (allowed + rejected)
    pub total: u64,
    /// Admitted
    pub allowed: u64,
    /// Rejected
    pub rejected: u64,
    /// Currently waiting
    pub waiting: u64,
    /// Tokens left (free slots for the sliding window)
    pub current_tokens: f64,
    /// Time since the last refill or prune
    pub since_last_refill: Duration,
}

/// A thread-safe rate limiter.
#[derive(Debug)]
pub struct RateLimiter {
    name: String,
    config: RateLimitConfig,
    state: Mutex<LimiterState>,
    last_refill: Mutex<Instant>,
    total: AtomicU64,
    allowed: AtomicU64,
    rejected: AtomicU64,
    waiting: AtomicU64,
}

impl RateLimiter {
    /// Create a limiter; a token bucket starts full.
    #[must_use]
    pub fn new(name: impl Into<String>, config: RateLimitConfig) -> Self {
        let now = Instant::now();
        let state = match config.algorithm {
            Algorithm::TokenBucket => LimiterState::Bucket {
                tokens: f64::from(config.burst_size),
                last_refill: now,
            },
            Algorithm::SlidingWindow => LimiterState::Window {
                log: VecDeque::with_capacity(config.rate as usize),
            },
        };
        Self {
            name: name.into(),
            config,
            state: Mutex::new(state),
            last_refill: Mutex::new(now),
            total: AtomicU64::new(0),
            allowed: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            waiting: AtomicU64::new(0),
        }
    }

    /// Limiter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configuration in force.
    #[must_use]
    pub const fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, LimiterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn touch(&self, now: Instant) {
        *self.last_refill.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    /// Bring state up to `now` and return the delay until one permit is free.
    fn advance(&self, state: &mut LimiterState, now: Instant) -> Duration {
        match state {
            LimiterState::Bucket { tokens, last_refill } => {
                let elapsed = now.saturating_duration_since(*last_refill).as_secs_f64();
                *tokens = (*tokens + elapsed * self.config.refill_per_sec())
                    .min(f64::from(self.config.burst_size));
                *last_refill = now;
                self.touch(now);
                if *tokens >= 1.0 {
                    Duration::ZERO
                } else {
                    Duration::from_secs_f64((1.0 - *tokens) / self.config.refill_per_sec())
                }
            }
            LimiterState::Window { log } => {
                while log
                    .front()
                    .is_some_and(|t| now.saturating_duration_since(*t) >= self.config.window)
                {
                    log.pop_front();
                }
                self.touch(now);
                if log.len() < self.config.rate as usize {
                    Duration::ZERO
                } else {
                    log.front()
                        .map_or(Duration::ZERO, |oldest| (*oldest + self.config.window).saturating_duration_since(now))
                }
            }
        }
    }

    fn take(state: &mut LimiterState, now: Instant) {
        match state {
            LimiterState::Bucket { tokens, .. } => *tokens -= 1.0,
            LimiterState::Window { log } => log.push_back(now),
        }
    }

    fn allow_at(&self, now: Instant) -> bool {
        let mut state = self.lock();
        if self.advance(&mut state, now).is_zero() {
            Self::take(&mut state, now);
            drop(state);
            self.record_allowed();
            true
        } else {
            drop(state);
            self.record_rejected();
            false
        }
    }

    /// Take a permit if one is free right now.
    #[must_use]
    pub fn allow(&self) -> bool {
        self.allow_at(Instant::now())
    }

    /// Projected wait for one permit, without taking it.
    ///
    /// Returns `(ok, delay)` where `ok` is false if `delay` exceeds `max_wait`.
    #[must_use]
    pub fn reserve(&self) -> (bool, Duration) {
        let mut state = self.lock();
        let delay = self.advance(&mut state, Instant::now());
        (delay <= self.config.max_wait, delay)
    }

    /// Take a permit, waiting up to `max_wait` for one.
    ///
    /// # Errors
    ///
    /// `rate_limited` when the projected delay exceeds `max_wait`.
    pub async fn wait(&self, operation: &str) -> Result<()> {
        let started = Instant::now();

        loop {
            let now = Instant::now();
            let delay = {
                let mut state = self.lock();
                let delay = self.advance(&mut state, now);
                if delay.is_zero() {
                    Self::take(&mut state, now);
                }
                delay
            };

            if delay.is_zero() {
                self.record_allowed();
                return Ok(());
            }

            let waited = now.saturating_duration_since(started);
            if waited + delay > self.config.max_wait {
                self.record_rejected();
                tracing::warn!(
                    limiter = %self.name,
                    operation,
                    delay_ms = delay.as_millis(),
                    max_wait_ms = self.config.max_wait.as_millis(),
                    "Rate limit exceeded"
                );
                return Err(InventorError::rate_limited(
                    operation,
                    format!(
                        "projected delay {}ms exceeds max wait {}ms",
                        delay.as_millis(),
                        self.config.max_wait.as_millis()
                    ),
                ));
            }

            let _waiting = WaitingGuard::enter(self);
            tokio::time::sleep(delay).await;
        }
    }

    // Cancelled waits count in none of total, allowed or rejected.
    fn record_allowed(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
        self.allowed.fetch_add(1, Ordering::Relaxed);
        LimiterMetrics::record_allowed(&self.name);
    }

    fn record_rejected(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
        self.rejected.fetch_add(1, Ordering::Relaxed);
        LimiterMetrics::record_rejected(&self.name);
    }

    /// Current metrics.
    #[must_use]
    pub fn metrics(&self) -> RateLimiterMetrics {
        let now = Instant::now();
        let current_tokens = match &*self.lock() {
            LimiterState::Bucket { tokens, .. } => *tokens,
            LimiterState::Window { log } => {
                let live = log
                    .iter()
                    .filter(|t| now.saturating_duration_since(**t) < self.config.window)
                    .count();
                f64::from(self.config.rate) - f64::from(u32::try_from(live).unwrap_or(u32::MAX))
            }
        };
        let last = *self.last_refill.lock().unwrap_or_else(PoisonError::into_inner);
        RateLimiterMetrics {
            total: self.total.load(Ordering::Relaxed),
            allowed: self.allowed.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            waiting: self.waiting.load(Ordering::Relaxed),
            current_tokens,
            since_last_refill: now.saturating_duration_since(last),
        }
    }
}

/// Holds one slot of the waiting gauge; released on drop so a cancelled
/// `wait` does not leave it raised.
struct WaitingGuard<'a> {
    limiter: &'a RateLimiter,
}

impl<'a> WaitingGuard<'a> {
    fn enter(limiter: &'a RateLimiter) -> Self {
        let waiting = limiter.waiting.fetch_add(1, Ordering::Relaxed) + 1;
        LimiterMetrics::record_waiting(&limiter.name, waiting);
        Self { limiter }
    }
}

impl Drop for WaitingGuard<'_> {
    fn drop(&mut self) {
        let waiting = self.limiter.waiting.fetch_sub(1, Ordering::Relaxed).saturating_sub(1);
        LimiterMetrics::record_waiting(&self.limiter.name, waiting);
    }
}
