//! Circuit breaker pattern for preventing cascading failures.
//!
//! A circuit breaker monitors calls to one dependency and "opens" (stops
//! admitting calls) when failures pile up, so a struggling dependency is not
//! hammered by retries from every pipeline run.
//!
//! # States
//!
//! - **Closed**: Normal operation. Outcomes are recorded in a sliding window.
//! - **Open**: Calls are rejected with `circuit_open` until `next_attempt`.
//! - **HalfOpen**: A bounded number of probes test recovery.
//!
//! # Tripping
//!
//! Closed -> Open when either `max_failures` consecutive failures occur, or at
//! least `min_request_threshold` outcomes sit in the window and the window's
//! failure ratio reaches `failure_threshold`.
//!
//! # Example
//!
//! ```rust
//! use beverage_inventor_resilience::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
//! use beverage_inventor_core::InventorError;
//! use std::time::Duration;
//!
//! # async fn example() {
//! let config = CircuitBreakerConfig::builder()
//!     .max_failures(5)
//!     .reset_timeout(Duration::from_secs(60))
//!     .success_threshold(3)
//!     .build();
//!
//! let breaker = CircuitBreaker::new("task_manager", config);
//!
//! match breaker.call(|| async { Ok::<_, InventorError>(42) }).await {
//!     Ok(result) => println!("Success: {result}"),
//!     Err(e) => println!("Failed: {e}"),
//! }
//! # }
//! ```

use crate::metrics::BreakerMetrics;
use beverage_inventor_core::{InventorError, Result};
use serde::Serialize;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Circuit breaker configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit
    pub max_failures: u32,
    /// Window failure ratio (0-1) that opens the circuit
    pub failure_threshold: f64,
    /// Outcomes required in the window before the ratio is considered
    pub min_request_threshold: u32,
    /// Time spent open before admitting probes
    pub reset_timeout: Duration,
    /// Consecutive half-open successes that close the circuit
    pub success_threshold: u32,
    /// Concurrent probes admitted while half-open
    pub half_open_max_calls: u32,
    /// Number of outcomes kept in the sliding window
    pub window_size: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl CircuitBreakerConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub const fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder {
            max_failures: None,
            failure_threshold: None,
            min_request_threshold: None,
            reset_timeout: None,
            success_threshold: None,
            half_open_max_calls: None,
            window_size: None,
        }
    }

    /// Check that every threshold is usable.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.max_failures == 0 {
            return Err("max_failures must be > 0".into());
        }
        if !(self.failure_threshold > 0.0 && self.failure_threshold <= 1.0) {
            return Err("failure_threshold must be in (0, 1]".into());
        }
        if self.success_threshold == 0 {
            return Err("success_threshold must be > 0".into());
        }
        if self.half_open_max_calls == 0 {
            return Err("half_open_max_calls must be > 0".into());
        }
        if self.window_size == 0 {
            return Err("window_size must be > 0".into());
        }
        Ok(())
    }
}

/// Builder for [`CircuitBreakerConfig`].
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfigBuilder {
    max_failures: Option<u32>,
    failure_threshold: Option<f64>,
    min_request_threshold: Option<u32>,
    reset_timeout: Option<Duration>,
    success_threshold: Option<u32>,
    half_open_max_calls: Option<u32>,
    window_size: Option<usize>,
}

impl CircuitBreakerConfigBuilder {
    /// Set the consecutive-failure limit.
    #[must_use]
    pub const fn max_failures(mut self, failures: u32) -> Self {
        self.max_failures = Some(failures);
        self
    }

    /// Set the window failure ratio.
    #[must_use]
    pub const fn failure_threshold(mut self, ratio: f64) -> Self {
        self.failure_threshold = Some(ratio);
        self
    }

    /// Set the minimum number of windowed outcomes before the ratio applies.
    #[must_use]
    pub const fn min_request_threshold(mut self, requests: u32) -> Self {
        self.min_request_threshold = Some(requests);
        self
    }

    /// Set how long the circuit stays open.
    #[must_use]
    pub const fn reset_timeout(mut self, duration: Duration) -> Self {
        self.reset_timeout = Some(duration);
        self
    }

    /// Set the half-open success threshold.
    #[must_use]
    pub const fn success_threshold(mut self, successes: u32) -> Self {
        self.success_threshold = Some(successes);
        self
    }

    /// Set the half-open probe limit.
    #[must_use]
    pub const fn half_open_max_calls(mut self, calls: u32) -> Self {
        self.half_open_max_calls = Some(calls);
        self
    }

    /// Set the sliding window length.
    #[must_use]
    pub const fn window_size(mut self, size: usize) -> Self {
        self.window_size = Some(size);
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            max_failures: self.max_failures.unwrap_or(5),
            failure_threshold: self.failure_threshold.unwrap_or(0.5),
            min_request_threshold: self.min_request_threshold.unwrap_or(20),
            reset_timeout: self.reset_timeout.unwrap_or(Duration::from_secs(60)),
            success_threshold: self.success_threshold.unwrap_or(3),
            half_open_max_calls: self.half_open_max_calls.unwrap_or(3),
            window_size: self.window_size.unwrap_or(100),
        }
    }
}

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    /// Circuit is closed, requests pass through normally
    Closed,
    /// Circuit is open, requests fail immediately
    Open,
    /// Circuit is half-open, testing if service recovered
    HalfOpen,
}

impl State {
    /// Gauge encoding: 0 = closed, 1 = half-open, 2 = open.
    #[must_use]
    pub const fn as_gauge(self) -> f64 {
        match self {
            Self::Closed => 0.0,
            Self::HalfOpen => 1.0,
            Self::Open => 2.0,
        }
    }
}

/// Internal state of the circuit breaker.
#[derive(Debug)]
struct BreakerState {
    state: State,
    consecutive_failures: u32,
    half_open_successes: u32,
    half_open_in_flight: u32,
    /// `true` marks a failure
    window: VecDeque<bool>,
    window_failures: usize,
    opened_at: Option<Instant>,
    next_attempt: Option<Instant>,
}

impl BreakerState {
    fn new(window_size: usize) -> Self {
        Self {
            state: State::Closed,
            consecutive_failures: 0,
            half_open_successes: 0,
            half_open_in_flight: 0,
            window: VecDeque::with_capacity(window_size),
            window_failures: 0,
            opened_at: None,
            next_attempt: None,
        }
    }

    fn observe(&mut self, failed: bool, window_size: usize) {
        if self.window.len() == window_size && self.window.pop_front() == Some(true) {
            self.window_failures -= 1;
        }
        self.window.push_back(failed);
        if failed {
            self.window_failures += 1;
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn failure_ratio(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        self.window_failures as f64 / self.window.len() as f64
    }
}

/// Proof of admission. Record the outcome with [`Permit::success`] or
/// [`Permit::failure`]; dropping it unrecorded only frees the probe slot.
#[derive(Debug)]
pub struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    probe: bool,
    settled: bool,
}

impl Permit<'_> {
    /// Record a successful call.
    pub fn success(mut self) {
        self.settled = true;
        self.breaker.on_success(self.probe);
    }

    /// Record a failed call.
    pub fn failure(mut self) {
        self.settled = true;
        self.breaker.on_failure(self.probe);
    }

    /// Record `outcome`, ignoring errors that do not count against the breaker.
    pub fn record<T>(self, outcome: &Result<T>) {
        match outcome {
            Ok(_) => self.success(),
            Err(err) if err.kind.counts_as_failure() => self.failure(),
            Err(_) => drop(self),
        }
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.settled && self.probe {
            self.breaker.release_probe();
        }
    }
}

/// Circuit breaker for one named dependency.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    name: Arc<str>,
    config: Arc<CircuitBreakerConfig>,
    state: Arc<Mutex<BreakerState>>,
    // Metrics
    total_calls: Arc<AtomicU64>,
    total_successes: Arc<AtomicU64>,
    total_failures: Arc<AtomicU64>,
    total_rejections: Arc<AtomicU64>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given configuration.
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>, config: CircuitBreakerConfig) -> Self {
        let window = config.window_size;
        Self {
            name: name.into(),
            config: Arc::new(config),
            state: Arc::new(Mutex::new(BreakerState::new(window))),
            total_calls: Arc::new(AtomicU64::new(0)),
            total_successes: Arc::new(AtomicU64::new(0)),
            total_failures: Arc::new(AtomicU64::new(0)),
            total_rejections: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Breaker name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configuration in force.
    #[must_use]
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get the current state of the circuit breaker.
    #[must_use]
    pub fn state(&self) -> State {
        self.lock().state
    }

    /// When an open circuit will admit its first probe.
    #[must_use]
    pub fn next_attempt(&self) -> Option<Instant> {
        self.lock().next_attempt
    }

    /// Ask for admission.
    ///
    /// # Errors
    ///
    /// `circuit_open` when the circuit is open, or half-open with every probe
    /// slot taken. `retry_after` tells when a probe may be admitted.
    pub fn try_acquire(&self) -> Result<Permit<'_>> {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        BreakerMetrics::record_call(&self.name);

        let now = Instant::now();
        let mut state = self.lock();

        if state.state == State::Open {
            match state.next_attempt {
                Some(next) if now >= next => {
                    tracing::info!(breaker = %self.name, "Circuit breaker transitioning OPEN -> HALF_OPEN");
                    state.state = State::HalfOpen;
                    state.half_open_successes = 0;
                    state.half_open_in_flight = 0;
                    BreakerMetrics::record_state(&self.name, State::HalfOpen);
                }
                next => {
                    let retry_after = next.map_or(self.config.reset_timeout, |n| n - now);
                    drop(state);
                    return Err(self.reject(retry_after));
                }
            }
        }

        let probe = state.state == State::HalfOpen;
        if probe {
            if state.half_open_in_flight >= self.config.half_open_max_calls {
                drop(state);
                return Err(self.reject(Duration::ZERO));
            }
            state.half_open_in_flight += 1;
        }

        Ok(Permit {
            breaker: self,
            probe,
            settled: false,
        })
    }

    /// Fast admission check that takes no probe slot.
    ///
    /// # Errors
    ///
    /// `circuit_open` if the circuit is open and `next_attempt` has not passed.
    pub fn check(&self) -> Result<()> {
        let now = Instant::now();
        let state = self.lock();
        match (state.state, state.next_attempt) {
            (State::Open, Some(next)) if now < next => {
                drop(state);
                Err(InventorError::circuit_open(self.name.to_string(), next - now))
            }
            _ => Ok(()),
        }
    }

    fn reject(&self, retry_after: Duration) -> InventorError {
        self.total_rejections.fetch_add(1, Ordering::Relaxed);
        BreakerMetrics::record_rejection(&self.name);
        tracing::warn!(breaker = %self.name, retry_after_ms = retry_after.as_millis(), "Circuit breaker is OPEN, rejecting request");
        InventorError::circuit_open(self.name.to_string(), retry_after)
    }

    /// Call an operation through the circuit breaker.
    ///
    /// # Errors
    ///
    /// Returns `circuit_open` if the circuit rejects the call, otherwise the
    /// operation's own error.
    pub async fn call<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let permit = self.try_acquire()?;
        let outcome = operation().await;
        permit.record(&outcome);
        outcome
    }

    /// Handle successful operation.
    fn on_success(&self, probe: bool) {
        self.total_successes.fetch_add(1, Ordering::Relaxed);
        BreakerMetrics::record_success(&self.name);

        let mut state = self.lock();
        state.observe(false, self.config.window_size);

        match state.state {
            State::Closed => {
                // Reset failure count on success
                state.consecutive_failures = 0;
            }
            State::HalfOpen => {
                if probe {
                    state.half_open_in_flight = state.half_open_in_flight.saturating_sub(1);
                }
                state.half_open_successes += 1;
                if state.half_open_successes >= self.config.success_threshold {
                    tracing::info!(
                        breaker = %self.name,
                        successes = state.half_open_successes,
                        "Circuit breaker transitioning HALF_OPEN -> CLOSED"
                    );
                    *state = BreakerState::new(self.config.window_size);
                    BreakerMetrics::record_state(&self.name, State::Closed);
                }
            }
            State::Open => {
                // Late result of a call admitted before the circuit opened
            }
        }
    }

    /// Handle failed operation.
    fn on_failure(&self, probe: bool) {
        self.total_failures.fetch_add(1, Ordering::Relaxed);
        BreakerMetrics::record_failure(&self.name);

        let mut state = self.lock();
        state.observe(true, self.config.window_size);
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);

        match state.state {
            State::Closed => {
                let consecutive = state.consecutive_failures >= self.config.max_failures;
                let ratio = state.window.len() >= self.config.min_request_threshold as usize
                    && state.failure_ratio() >= self.config.failure_threshold;
                if consecutive || ratio {
                    tracing::warn!(
                        breaker = %self.name,
                        failures = state.consecutive_failures,
                        failure_ratio = state.failure_ratio(),
                        threshold = self.config.max_failures,
                        "Circuit breaker transitioning CLOSED -> OPEN"
                    );
                    self.open(&mut state);
                }
            }
            State::HalfOpen => {
                if probe {
                    state.half_open_in_flight = state.half_open_in_flight.saturating_sub(1);
                }
                tracing::warn!(breaker = %self.name, "Circuit breaker transitioning HALF_OPEN -> OPEN (recovery failed)");
                self.open(&mut state);
            }
            State::Open => {}
        }
    }

    fn open(&self, state: &mut BreakerState) {
        let now = Instant::now();
        state.state = State::Open;
        state.opened_at = Some(now);
        state.next_attempt = Some(now + self.config.reset_timeout);
        state.half_open_successes = 0;
        state.half_open_in_flight = 0;
        BreakerMetrics::record_state(&self.name, State::Open);
    }

    fn release_probe(&self) {
        let mut state = self.lock();
        if state.state == State::HalfOpen {
            state.half_open_in_flight = state.half_open_in_flight.saturating_sub(1);
        }
    }

    /// Get circuit breaker metrics.
    #[must_use]
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let state = self.lock();
        CircuitBreakerMetrics {
            state: state.state,
            consecutive_failures: state.consecutive_failures,
            window_failure_ratio: state.failure_ratio(),
            total_calls: self.total_calls.load(Ordering::Relaxed),
            total_successes: self.total_successes.load(Ordering::Relaxed),
            total_failures: self.total_failures.load(Ordering::Relaxed),
            total_rejections: self.total_rejections.load(Ordering::Relaxed),
        }
    }

    /// Reset the circuit breaker to closed state.
    ///
    /// Useful for testing or manual intervention.
    pub fn reset(&self) {
        tracing::info!(breaker = %self.name, "Circuit breaker manually reset to CLOSED");
        *self.lock() = BreakerState::new(self.config.window_size);
        BreakerMetrics::record_state(&self.name, State::Closed);
    }
}

/// Metrics for circuit breaker monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CircuitBreakerMetrics {
    /// Current state
    pub state: State,
    /// Current run of failures
    pub consecutive_failures: u32,
    /// Failure ratio over the sliding window
    pub window_failure_ratio: f64,
    /// Total number of admission checks
    pub total_calls: u64,
    /// Total number of successful calls
    pub total_successes: u64,
    /// Total number of failed calls
    pub total_failures: u64,
    /// Total number of rejected calls (circuit open)
    pub total_rejections: u64,
}

impl CircuitBreakerMetrics {
    /// Calculate success rate (0.0 to 1.0).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> f64 {
        if self.total_calls == 0 {
            return 1.0;
        }
        self.total_successes as f64 / self.total_calls as f64
    }

    /// Calculate rejection rate (0.0 to 1.0).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn rejection_rate(&self) -> f64 {
        if self.total_calls == 0 {
            return 0.0;
        }
        self.total_rejections as f64 / self.total_calls as f64
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code
mod tests {
    use super::*;
    use beverage_inventor_core::ErrorKind;
    use proptest::prelude::*;
    use std::sync::atomic::AtomicUsize;

    fn failing() -> Result<i32> {
        Err(InventorError::transient_io("test", "boom"))
    }

    async fn fail(breaker: &CircuitBreaker, times: usize) {
        for _ in 0..times {
            let _ = breaker.call(|| async { failing() }).await;
        }
    }

    #[tokio::test]
    async fn test_circuit_breaker_closed_on_success() {
        let breaker = CircuitBreaker::new("svc", CircuitBreakerConfig::default());

        let result = breaker.call(|| async { Ok::<_, InventorError>(42) }).await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(breaker.state(), State::Closed);
    }

    #[tokio::test]
    async fn test_circuit_breaker_opens_after_consecutive_failures() {
        let config = CircuitBreakerConfig::builder().max_failures(3).build();
        let breaker = CircuitBreaker::new("svc", config);

        fail(&breaker, 3).await;

        assert_eq!(breaker.state(), State::Open);
    }

    #[tokio::test]
    async fn test_circuit_breaker_opens_on_failure_ratio() {
        let config = CircuitBreakerConfig::builder()
            .max_failures(100)
            .min_request_threshold(10)
            .failure_threshold(0.5)
            .build();
        let breaker = CircuitBreaker::new("svc", config);

        // Alternate so the consecutive counter never reaches its limit
        for _ in 0..4 {
            let _ = breaker.call(|| async { Ok::<_, InventorError>(()) }).await;
            fail(&breaker, 1).await;
        }
        assert_eq!(breaker.state(), State::Closed);

        // 10th outcome: 5 failures out of 10
        let _ = breaker.call(|| async { Ok::<_, InventorError>(()) }).await;
        fail(&breaker, 1).await;
        assert_eq!(breaker.state(), State::Open);
    }

    #[tokio::test]
    async fn test_circuit_breaker_rejects_with_circuit_open() {
        let config = CircuitBreakerConfig::builder().max_failures(2).build();
        let breaker = CircuitBreaker::new("svc", config);

        fail(&breaker, 2).await;

        let err = breaker.call(|| async { Ok::<_, InventorError>(42) }).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::CircuitOpen);
        assert!(err.retry_after.is_some());
        assert_eq!(breaker.metrics().total_rejections, 1);
    }

    #[tokio::test]
    async fn test_non_counting_errors_do_not_trip() {
        let config = CircuitBreakerConfig::builder().max_failures(2).build();
        let breaker = CircuitBreaker::new("svc", config);

        for _ in 0..5 {
            let _ = breaker
                .call(|| async { Err::<(), _>(InventorError::not_found("svc", "missing")) })
                .await;
        }

        assert_eq!(breaker.state(), State::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_circuit_breaker_transitions_to_half_open() {
        let config = CircuitBreakerConfig::builder()
            .max_failures(2)
            .reset_timeout(Duration::from_millis(100))
            .build();
        let breaker = CircuitBreaker::new("svc", config);

        fail(&breaker, 2).await;
        assert_eq!(breaker.state(), State::Open);

        tokio::time::sleep(Duration::from_millis(150)).await;

        let _ = breaker.call(|| async { Ok::<_, InventorError>(42) }).await;
        assert_eq!(breaker.state(), State::HalfOpen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_circuit_breaker_closes_after_success_threshold() {
        let config = CircuitBreakerConfig::builder()
            .max_failures(2)
            .reset_timeout(Duration::from_millis(100))
            .success_threshold(2)
            .build();
        let breaker = CircuitBreaker::new("svc", config);

        fail(&breaker, 2).await;
        tokio::time::sleep(Duration::from_millis(150)).await;

        for _ in 0..2 {
            let _ = breaker.call(|| async { Ok::<_, InventorError>(42) }).await;
        }

        assert_eq!(breaker.state(), State::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_circuit_breaker_reopens_on_half_open_failure() {
        let config = CircuitBreakerConfig::builder()
            .max_failures(2)
            .reset_timeout(Duration::from_millis(100))
            .build();
        let breaker = CircuitBreaker::new("svc", config);

        fail(&breaker, 2).await;
        tokio::time::sleep(Duration::from_millis(150)).await;
        fail(&breaker, 1).await;

        assert_eq!(breaker.state(), State::Open);
        let next = breaker.next_attempt().unwrap();
        assert!(next > Instant::now());
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_caps_concurrent_probes() {
        let config = CircuitBreakerConfig::builder()
            .max_failures(1)
            .reset_timeout(Duration::from_millis(10))
            .half_open_max_calls(2)
            .build();
        let breaker = CircuitBreaker::new("svc", config);

        fail(&breaker, 1).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let first = breaker.try_acquire().unwrap();
        let second = breaker.try_acquire().unwrap();
        let third = breaker.try_acquire().unwrap_err();
        assert_eq!(third.kind, ErrorKind::CircuitOpen);

        // Dropping an unrecorded probe frees its slot
        drop(first);
        let fourth = breaker.try_acquire();
        assert!(fourth.is_ok());
        drop(second);
    }

    #[tokio::test]
    async fn test_circuit_breaker_metrics() {
        let breaker = CircuitBreaker::new("svc", CircuitBreakerConfig::default());

        for _ in 0..3 {
            let _ = breaker.call(|| async { Ok::<_, InventorError>(42) }).await;
        }
        fail(&breaker, 2).await;

        let metrics = breaker.metrics();
        assert_eq!(metrics.total_calls, 5);
        assert_eq!(metrics.total_successes, 3);
        assert_eq!(metrics.total_failures, 2);
        assert!((metrics.success_rate() - 0.6).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_circuit_breaker_reset() {
        let config = CircuitBreakerConfig::builder().max_failures(2).build();
        let breaker = CircuitBreaker::new("svc", config);

        fail(&breaker, 2).await;
        assert_eq!(breaker.state(), State::Open);

        breaker.reset();

        assert_eq!(breaker.state(), State::Closed);
    }

    #[tokio::test]
    async fn test_circuit_breaker_concurrent_calls() {
        let breaker = Arc::new(CircuitBreaker::new("svc", CircuitBreakerConfig::default()));

        let counter = Arc::new(AtomicUsize::new(0));
        let mut handles = vec![];

        for _ in 0..100 {
            let breaker_clone = Arc::clone(&breaker);
            let counter_clone = Arc::clone(&counter);

            let handle = tokio::spawn(async move {
                let _ = breaker_clone
                    .call(|| async {
                        counter_clone.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, InventorError>(())
                    })
                    .await;
            });

            handles.push(handle);
        }

        for handle in handles {
            handle.await.ok();
        }

        let metrics = breaker.metrics();
        assert_eq!(metrics.total_calls, 100);
        assert_eq!(metrics.total_successes, 100);
        assert_eq!(counter.load(Ordering::SeqCst), 100);
    }

    proptest! {
        #[test]
        fn prop_max_consecutive_failures_trip(
            max_failures in 1u32..20,
            successes_before in 0usize..10,
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            runtime.block_on(async {
                let config = CircuitBreakerConfig::builder()
                    .max_failures(max_failures)
                    .min_request_threshold(u32::MAX)
                    .build();
                let breaker = CircuitBreaker::new("prop", config);
                for _ in 0..successes_before {
                    let _ = breaker.call(|| async { Ok::<_, InventorError>(()) }).await;
                }
                fail(&breaker, max_failures as usize).await;
                let next = breaker.try_acquire();
                prop_assert_eq!(next.map(|_| ()).unwrap_err().kind, ErrorKind::CircuitOpen);
                Ok(())
            })?;
        }
    }
}
