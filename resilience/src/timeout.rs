//! Timeout scopes.
//!
//! A call's deadline is `min(parent, now + timeout)`. The timeout comes from,
//! in order: an explicit argument, the operation table, the dependency table,
//! then the manager default.

use beverage_inventor_core::{DependencyKind, InventorError, Result};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Default when nothing more specific is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout lookup tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutManager {
    default: Duration,
    by_dependency: HashMap<DependencyKind, Duration>,
    by_operation: HashMap<String, Duration>,
}

impl Default for TimeoutManager {
    fn default() -> Self {
        let by_dependency = HashMap::from([
            (DependencyKind::Database, Duration::from_secs(5)),
            (DependencyKind::EventBus, Duration::from_secs(3)),
            (DependencyKind::AiProvider, Duration::from_secs(30)),
            (DependencyKind::ExternalApi, Duration::from_secs(15)),
        ]);
        let by_operation = HashMap::from([
            ("repository.save".to_owned(), Duration::from_secs(10)),
            ("ai.generate_recipe".to_owned(), Duration::from_secs(90)),
        ]);
        Self {
            default: DEFAULT_TIMEOUT,
            by_dependency,
            by_operation,
        }
    }
}

impl TimeoutManager {
    /// Empty tables with the given default.
    #[must_use]
    pub fn with_default(default: Duration) -> Self {
        Self {
            default,
            by_dependency: HashMap::new(),
            by_operation: HashMap::new(),
        }
    }

    /// Set the timeout for every call to `kind`.
    pub fn set_dependency(&mut self, kind: DependencyKind, timeout: Duration) {
        self.by_dependency.insert(kind, timeout);
    }

    /// Set the timeout for one operation.
    pub fn set_operation(&mut self, operation: impl Into<String>, timeout: Duration) {
        self.by_operation.insert(operation.into(), timeout);
    }

    /// Resolve the timeout for a call.
    #[must_use]
    pub fn resolve(&self, explicit: Option<Duration>, operation: &str, kind: DependencyKind) -> Duration {
        explicit
            .or_else(|| self.by_operation.get(operation).copied())
            .or_else(|| self.by_dependency.get(&kind).copied())
            .unwrap_or(self.default)
    }
}

/// Child deadline: `min(parent, now + timeout)`.
#[must_use]
pub fn scope(parent: Option<Instant>, timeout: Duration) -> Instant {
    let own = Instant::now() + timeout;
    parent.map_or(own, |p| p.min(own))
}

/// Earlier of two optional deadlines.
#[must_use]
pub fn earliest(a: Option<Instant>, b: Option<Instant>) -> Option<Instant> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// Run `future` until `deadline`.
///
/// A result that arrives after the deadline is discarded in favour of the
/// deadline error.
///
/// # Errors
///
/// `timeout` if the deadline fires first, otherwise the future's own error.
pub async fn run_until<T, Fut>(operation: &str, deadline: Instant, future: Fut) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    let started = Instant::now();
    let expired = || {
        InventorError::timeout(
            operation,
            format!("deadline exceeded after {}ms", started.elapsed().as_millis()),
        )
    };
    match tokio::time::timeout_at(deadline, future).await {
        Ok(_) if Instant::now() > deadline => Err(expired()),
        Ok(outcome) => outcome,
        Err(_) => Err(expired()),
    }
}
