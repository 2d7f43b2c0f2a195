//! Composed resilience executor.
//!
//! Every collaborator call goes through [`Executor::execute_call`], which
//! layers, in order:
//!
//! 1. rate-limit acquire for the dependency kind,
//! 2. breaker gate (fast reject while open),
//! 3. timeout scope,
//! 4. retry loop, where each attempt takes a breaker permit and runs under
//!    `min(loop deadline, now + timeout)`.
//!
//! Every layer returns either a classified error or the thunk's own error.

use crate::registry::{ResilienceRegistry, breaker_key};
use crate::retry::retry_with_policy;
use crate::timeout;
use beverage_inventor_core::{CallContext, DependencyKind, InventorError, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Description of one guarded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSpec {
    /// Operation name, e.g. `repository.save`
    pub operation: String,
    /// Dependency kind
    pub dependency: DependencyKind,
    /// Explicit timeout, overriding the tables
    pub timeout: Option<Duration>,
    /// Caller deadline
    pub deadline: Option<Instant>,
    /// Correlation id forwarded to the collaborator
    pub correlation_id: String,
    /// Breaker name; defaults to the operation prefix
    pub breaker: Option<String>,
    /// Limiter name; defaults to the dependency kind's shared limiter
    pub limiter: Option<String>,
}

impl CallSpec {
    /// Spec for `operation` against `dependency`.
    #[must_use]
    pub fn new(operation: impl Into<String>, dependency: DependencyKind) -> Self {
        Self {
            operation: operation.into(),
            dependency,
            timeout: None,
            deadline: None,
            correlation_id: String::new(),
            breaker: None,
            limiter: None,
        }
    }

    /// Set an explicit timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Bound the call by a caller deadline.
    #[must_use]
    pub const fn deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Attach a correlation id.
    #[must_use]
    pub fn correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = id.into();
        self
    }

    /// Use a specific breaker.
    #[must_use]
    pub fn breaker(mut self, name: impl Into<String>) -> Self {
        self.breaker = Some(name.into());
        self
    }

    /// Draw from a limiter of its own instead of the kind's shared one.
    #[must_use]
    pub fn limiter(mut self, name: impl Into<String>) -> Self {
        self.limiter = Some(name.into());
        self
    }

    fn breaker_name(&self) -> &str {
        self.breaker
            .as_deref()
            .unwrap_or_else(|| breaker_key(&self.operation))
    }
}

/// Result of a call that may have fallen back.
#[derive(Debug, Clone, PartialEq)]
pub enum FallbackOutcome<T> {
    /// The primary succeeded
    Primary(T),
    /// The primary failed with `cause` and the fallback produced `value`
    Fallback {
        /// Fallback result
        value: T,
        /// Why the primary was abandoned
        cause: InventorError,
    },
}

impl<T> FallbackOutcome<T> {
    /// The value, wherever it came from.
    pub fn into_inner(self) -> T {
        match self {
            Self::Primary(value) | Self::Fallback { value, .. } => value,
        }
    }

    /// Whether the fallback ran.
    #[must_use]
    pub const fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }
}

/// Whether the default fallback trigger fires for `err`: an open circuit or
/// a retryable error left over after the retry loop.
#[must_use]
pub const fn should_fall_back(err: &InventorError) -> bool {
    err.kind.is_retryable()
}

/// Runs collaborator calls under the registry's resilience profiles.
#[derive(Debug, Clone)]
pub struct Executor {
    registry: Arc<ResilienceRegistry>,
}

impl Executor {
    /// Executor over `registry`.
    #[must_use]
    pub const fn new(registry: Arc<ResilienceRegistry>) -> Self {
        Self { registry }
    }

    /// Executor over the process-wide registry, installing a default one if
    /// none exists yet.
    #[must_use]
    pub fn global() -> Self {
        let registry = crate::registry::global()
            .unwrap_or_else(|| crate::registry::init_global(ResilienceRegistry::new()));
        Self { registry }
    }

    /// The registry this executor uses.
    #[must_use]
    pub const fn registry(&self) -> &Arc<ResilienceRegistry> {
        &self.registry
    }

    /// Run `thunk` as `operation` against `dependency`.
    ///
    /// # Errors
    ///
    /// See [`Executor::execute_call`].
    pub async fn execute<T, F, Fut>(&self, operation: &str, dependency: DependencyKind, thunk: F) -> Result<T>
    where
        F: FnMut(CallContext) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.execute_call(CallSpec::new(operation, dependency), thunk).await
    }

    /// Run `thunk` under the full resilience stack described by `spec`.
    ///
    /// The thunk is called once per attempt with a [`CallContext`] carrying
    /// the attempt's deadline.
    ///
    /// # Errors
    ///
    /// - `rate_limited` if the limiter's projected delay exceeds its max wait
    /// - `circuit_open` if the breaker rejects the call
    /// - `timeout` if an attempt misses its deadline
    /// - otherwise the thunk's last error
    pub async fn execute_call<T, F, Fut>(&self, spec: CallSpec, mut thunk: F) -> Result<T>
    where
        F: FnMut(CallContext) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let operation = spec.operation.as_str();
        let kind = spec.dependency;
        let profile = self.registry.profile(kind);

        let limiter = match spec.limiter.as_deref() {
            Some(name) => self.registry.limiter_named(name, kind),
            None => self.registry.limiter(kind),
        };
        limiter.wait(operation).await?;

        let breaker = self.registry.breaker(spec.breaker_name(), kind);
        breaker.check()?;

        let op_timeout = self.registry.resolve_timeout(spec.timeout, operation, kind);
        let breaker = &*breaker;
        let correlation_id = spec.correlation_id.as_str();

        retry_with_policy(&profile.retry, operation, spec.deadline, |attempt| {
            let deadline = timeout::scope(attempt.deadline, op_timeout);
            let ctx = CallContext {
                operation: operation.to_owned(),
                dependency: kind,
                correlation_id: correlation_id.to_owned(),
                deadline: Some(deadline),
                attempt: attempt.number,
            };
            let admitted = breaker.try_acquire().map(|permit| (permit, thunk(ctx)));
            async move {
                let (permit, call) = admitted?;
                let outcome = timeout::run_until(operation, deadline, call).await;
                permit.record(&outcome);
                outcome
            }
        })
        .await
    }

    /// Run `primary`, and `fallback` if the primary fails with an open
    /// circuit or a retryable error after exhaustion.
    ///
    /// # Errors
    ///
    /// The primary's error when it does not trigger the fallback, otherwise
    /// the fallback's error.
    pub async fn execute_with_fallback<T, F, Fut, G, GFut>(
        &self,
        spec: CallSpec,
        primary: F,
        fallback: G,
    ) -> Result<FallbackOutcome<T>>
    where
        F: FnMut(CallContext) -> Fut,
        Fut: Future<Output = Result<T>>,
        G: FnOnce(InventorError) -> GFut,
        GFut: Future<Output = Result<T>>,
    {
        self.execute_with_fallback_on(spec, should_fall_back, primary, fallback)
            .await
    }

    /// Like [`Executor::execute_with_fallback`] with a custom trigger.
    ///
    /// # Errors
    ///
    /// The primary's error when `trigger` rejects it, otherwise the
    /// fallback's error.
    pub async fn execute_with_fallback_on<T, P, F, Fut, G, GFut>(
        &self,
        spec: CallSpec,
        trigger: P,
        primary: F,
        fallback: G,
    ) -> Result<FallbackOutcome<T>>
    where
        P: FnOnce(&InventorError) -> bool,
        F: FnMut(CallContext) -> Fut,
        Fut: Future<Output = Result<T>>,
        G: FnOnce(InventorError) -> GFut,
        GFut: Future<Output = Result<T>>,
    {
        let operation = spec.operation.clone();
        match self.execute_call(spec, primary).await {
            Ok(value) => Ok(FallbackOutcome::Primary(value)),
            Err(cause) if trigger(&cause) => {
                tracing::warn!(operation = %operation, error = %cause, "Primary failed, running fallback");
                let value = fallback(cause.clone()).await?;
                Ok(FallbackOutcome::Fallback { value, cause })
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code
mod tests {
    use super::*;
    use crate::circuit_breaker::State;
    use crate::profile::{ProfileOverride, ResilienceProfile};
    use crate::retry::Backoff;
    use beverage_inventor_core::ErrorKind;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn executor_with(kind: DependencyKind, overrides: &ProfileOverride) -> Executor {
        let mut profile = ResilienceProfile::for_kind(kind).with_overrides(overrides);
        profile.retry.backoff = Backoff::Fixed {
            delay: Duration::from_millis(10),
        };
        Executor::new(Arc::new(ResilienceRegistry::with_profiles([(kind, profile)])))
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_passes_context() {
        let executor = executor_with(DependencyKind::Database, &ProfileOverride::default());

        let spec = CallSpec::new("repository.save", DependencyKind::Database).correlation_id("req-1");
        let ctx = executor
            .execute_call(spec, |ctx| async move { Ok(ctx) })
            .await
            .unwrap();

        assert_eq!(ctx.operation, "repository.save");
        assert_eq!(ctx.correlation_id, "req-1");
        assert_eq!(ctx.attempt, 1);
        assert_eq!(ctx.remaining(), Some(Duration::from_secs(10)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_retries_transient_errors() {
        let executor = executor_with(DependencyKind::Database, &ProfileOverride::default());
        let calls = AtomicU32::new(0);

        let result: Result<()> = executor
            .execute("repository.save", DependencyKind::Database, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(InventorError::transient_io("repository.save", "connection reset")) }
            })
            .await;

        assert_eq!(result.unwrap_err().kind, ErrorKind::TransientIo);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_trip_the_breaker_then_fast_reject() {
        let overrides = ProfileOverride {
            max_failures: Some(5),
            max_attempts: Some(1),
            ..ProfileOverride::default()
        };
        let executor = executor_with(DependencyKind::ExternalApi, &overrides);
        let calls = AtomicU32::new(0);

        for _ in 0..5 {
            let _: Result<()> = executor
                .execute("task_manager.create_task", DependencyKind::ExternalApi, |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(InventorError::transient_io("task_manager.create_task", "503")) }
                })
                .await;
        }
        let sixth: Result<()> = executor
            .execute("task_manager.create_task", DependencyKind::ExternalApi, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            })
            .await;

        assert_eq!(sixth.unwrap_err().kind, ErrorKind::CircuitOpen);
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert_eq!(
            executor.registry().breaker("task_manager", DependencyKind::ExternalApi).state(),
            State::Open
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_against_breaker() {
        let overrides = ProfileOverride {
            max_failures: Some(1),
            max_attempts: Some(1),
            ..ProfileOverride::default()
        };
        let executor = executor_with(DependencyKind::EventBus, &overrides);

        let spec = CallSpec::new("producer.publish", DependencyKind::EventBus).timeout(Duration::from_millis(20));
        let result: Result<()> = executor
            .execute_call(spec, |_| async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok(())
            })
            .await;

        assert_eq!(result.unwrap_err().kind, ErrorKind::Timeout);
        assert_eq!(
            executor.registry().breaker("producer", DependencyKind::EventBus).state(),
            State::Open
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_caller_deadline_bounds_attempt() {
        let executor = executor_with(DependencyKind::AiProvider, &ProfileOverride::default());
        let deadline = Instant::now() + Duration::from_millis(100);

        let spec = CallSpec::new("ai.generate_recipe", DependencyKind::AiProvider).deadline(Some(deadline));
        let seen = executor
            .execute_call(spec, |ctx| async move { Ok(ctx.deadline) })
            .await
            .unwrap();

        assert_eq!(seen, Some(deadline));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_fails_fast() {
        let overrides = ProfileOverride {
            rate: Some(1),
            burst_size: Some(1),
            max_wait_ms: Some(0),
            ..ProfileOverride::default()
        };
        let executor = executor_with(DependencyKind::ExternalApi, &overrides);

        let first: Result<()> = executor
            .execute("notifier.send_message", DependencyKind::ExternalApi, |_| async { Ok(()) })
            .await;
        let second: Result<()> = executor
            .execute("notifier.send_message", DependencyKind::ExternalApi, |_| async { Ok(()) })
            .await;

        assert!(first.is_ok());
        assert_eq!(second.unwrap_err().kind, ErrorKind::RateLimited);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_on_open_circuit() {
        let executor = executor_with(DependencyKind::AiProvider, &ProfileOverride::default());
        let breaker = executor.registry().breaker("ai", DependencyKind::AiProvider);
        for _ in 0..5 {
            let _ = breaker
                .call(|| async { Err::<(), _>(InventorError::transient_io("ai", "down")) })
                .await;
        }

        let outcome = executor
            .execute_with_fallback(
                CallSpec::new("ai.generate_recipe", DependencyKind::AiProvider),
                |_| async { Ok("ai") },
                |_| async { Ok("rules") },
            )
            .await
            .unwrap();

        assert!(outcome.is_fallback());
        match outcome {
            FallbackOutcome::Fallback { value, cause } => {
                assert_eq!(value, "rules");
                assert_eq!(cause.kind, ErrorKind::CircuitOpen);
            }
            FallbackOutcome::Primary(_) => unreachable!(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_fallback_on_terminal_error() {
        let executor = executor_with(DependencyKind::AiProvider, &ProfileOverride::default());

        let result = executor
            .execute_with_fallback(
                CallSpec::new("ai.generate_recipe", DependencyKind::AiProvider),
                |_| async { Err::<&str, _>(InventorError::invalid_request("ai.generate_recipe", "bad prompt")) },
                |_| async { Ok("rules") },
            )
            .await;

        assert_eq!(result.unwrap_err().kind, ErrorKind::InvalidRequest);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_trigger() {
        let executor = executor_with(DependencyKind::AiProvider, &ProfileOverride::default());

        let outcome = executor
            .execute_with_fallback_on(
                CallSpec::new("ai.generate_recipe", DependencyKind::AiProvider),
                |_| true,
                |_| async { Err::<&str, _>(InventorError::ai_failed("ai.generate_recipe", "empty completion")) },
                |_| async { Ok("rules") },
            )
            .await
            .unwrap();

        assert_eq!(outcome.into_inner(), "rules");
    }
}
