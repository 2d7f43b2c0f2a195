//! # Beverage Inventor Resilience
//!
//! The kernel every collaborator call runs through.
//!
//! ## Components
//!
//! - **Circuit breaker**: sliding-window breaker with bounded half-open probes
//! - **Retry**: attempt budget, deadlines and fixed/linear/exponential/decorrelated backoff
//! - **Timeout**: deadline scoping with an operation and dependency lookup table
//! - **Rate limiter**: token bucket and sliding window, fail-fast past `max_wait`
//! - **Registry**: process-wide breakers, limiters and profiles
//! - **Executor**: the composition of all of the above
//!
//! ## Example
//!
//! ```
//! use beverage_inventor_core::{DependencyKind, InventorError};
//! use beverage_inventor_resilience::{Executor, ResilienceRegistry};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), InventorError> {
//! let executor = Executor::new(Arc::new(ResilienceRegistry::new()));
//!
//! let id = executor
//!     .execute("task_manager.create_task", DependencyKind::ExternalApi, |ctx| async move {
//!         // ctx.deadline bounds this attempt
//!         Ok::<_, InventorError>(format!("task-{}", ctx.attempt))
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

/// Circuit breaker pattern for preventing cascading failures
pub mod circuit_breaker;

/// Composed executor
pub mod executor;

/// Prometheus metrics for observability
pub mod metrics;

/// Resilience profiles per dependency kind
pub mod profile;

/// Rate limiting per dependency
pub mod rate_limiter;

/// Process-wide registry
pub mod registry;

/// Retry logic with pluggable backoff
pub mod retry;

/// Deadline scoping
pub mod timeout;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, State as BreakerState};
pub use executor::{CallSpec, Executor, FallbackOutcome};
pub use profile::{ProfileOverride, ResilienceProfile};
pub use rate_limiter::{RateLimitConfig, RateLimiter};
pub use registry::ResilienceRegistry;
pub use retry::{Backoff, RetryPolicy};
pub use timeout::TimeoutManager;
