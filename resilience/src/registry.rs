//! Process-wide breaker, limiter and timeout registry.
//!
//! Breakers are keyed by name so that every call site talking to the same
//! collaborator shares one breaker. Limiters are keyed by name too: the
//! dependency kind's name for the shared budget, or an operation name for
//! calls that must not draw from it.
//! Each entry has its own lock; the maps themselves sit behind read-heavy
//! `RwLock`s that are never held across an await.

use crate::circuit_breaker::{CircuitBreaker, State};
use crate::profile::ResilienceProfile;
use crate::rate_limiter::RateLimiter;
use crate::timeout::TimeoutManager;
use beverage_inventor_core::DependencyKind;
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

static GLOBAL: OnceCell<Arc<ResilienceRegistry>> = OnceCell::new();

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Breaker name for an operation: the part before the first `.`.
#[must_use]
pub fn breaker_key(operation: &str) -> &str {
    operation.split('.').next().unwrap_or(operation)
}

#[derive(Debug)]
struct LimiterEntry {
    kind: DependencyKind,
    limiter: Arc<RateLimiter>,
}

#[derive(Debug)]
struct BreakerEntry {
    kind: DependencyKind,
    breaker: Arc<CircuitBreaker>,
}

/// Registry of resilience state.
#[derive(Debug)]
pub struct ResilienceRegistry {
    profiles: RwLock<HashMap<DependencyKind, ResilienceProfile>>,
    breakers: RwLock<HashMap<String, BreakerEntry>>,
    limiters: RwLock<HashMap<String, LimiterEntry>>,
    timeouts: RwLock<TimeoutManager>,
}

impl Default for ResilienceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ResilienceRegistry {
    /// Registry with the built-in profile for every kind.
    #[must_use]
    pub fn new() -> Self {
        Self::with_profiles(
            DependencyKind::ALL
                .into_iter()
                .map(|kind| (kind, ResilienceProfile::for_kind(kind))),
        )
    }

    /// Registry with explicit profiles; kinds left out get the built-in one.
    pub fn with_profiles(profiles: impl IntoIterator<Item = (DependencyKind, ResilienceProfile)>) -> Self {
        let mut table: HashMap<_, _> = DependencyKind::ALL
            .into_iter()
            .map(|kind| (kind, ResilienceProfile::for_kind(kind)))
            .collect();
        table.extend(profiles);

        let mut timeouts = TimeoutManager::default();
        for (kind, profile) in &table {
            timeouts.set_dependency(*kind, profile.timeout);
        }

        Self {
            profiles: RwLock::new(table),
            breakers: RwLock::new(HashMap::new()),
            limiters: RwLock::new(HashMap::new()),
            timeouts: RwLock::new(timeouts),
        }
    }

    /// Current profile for `kind`.
    #[must_use]
    pub fn profile(&self, kind: DependencyKind) -> ResilienceProfile {
        read(&self.profiles)
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| ResilienceProfile::for_kind(kind))
    }

    /// The breaker called `name`, created from `kind`'s profile on first use.
    #[must_use]
    pub fn breaker(&self, name: &str, kind: DependencyKind) -> Arc<CircuitBreaker> {
        if let Some(entry) = read(&self.breakers).get(name) {
            return Arc::clone(&entry.breaker);
        }
        let config = self.profile(kind).breaker;
        let mut breakers = write(&self.breakers);
        let entry = breakers.entry(name.to_owned()).or_insert_with(|| {
            tracing::debug!(breaker = name, dependency = %kind, "Creating circuit breaker");
            BreakerEntry {
                kind,
                breaker: Arc::new(CircuitBreaker::new(name, config)),
            }
        });
        Arc::clone(&entry.breaker)
    }

    /// The shared limiter for `kind`, created on first use.
    #[must_use]
    pub fn limiter(&self, kind: DependencyKind) -> Arc<RateLimiter> {
        self.limiter_named(kind.as_str(), kind)
    }

    /// The limiter called `name`, created from `kind`'s profile on first use.
    #[must_use]
    pub fn limiter_named(&self, name: &str, kind: DependencyKind) -> Arc<RateLimiter> {
        if let Some(entry) = read(&self.limiters).get(name) {
            return Arc::clone(&entry.limiter);
        }
        let config = self.profile(kind).rate_limit;
        let mut limiters = write(&self.limiters);
        let entry = limiters.entry(name.to_owned()).or_insert_with(|| {
            tracing::debug!(limiter = name, dependency = %kind, "Creating rate limiter");
            LimiterEntry {
                kind,
                limiter: Arc::new(RateLimiter::new(name, config)),
            }
        });
        Arc::clone(&entry.limiter)
    }

    /// Resolve the timeout for a call.
    #[must_use]
    pub fn resolve_timeout(&self, explicit: Option<Duration>, operation: &str, kind: DependencyKind) -> Duration {
        read(&self.timeouts).resolve(explicit, operation, kind)
    }

    /// Set the timeout for one operation.
    pub fn set_operation_timeout(&self, operation: impl Into<String>, timeout: Duration) {
        write(&self.timeouts).set_operation(operation, timeout);
    }

    /// Replace `kind`'s profile at runtime.
    ///
    /// Breakers and limiters of that kind are replaced so the next call
    /// picks up the new settings; their accumulated state is discarded.
    pub fn update_profile(&self, kind: DependencyKind, profile: ResilienceProfile) {
        tracing::info!(dependency = %kind, "Updating resilience profile");
        write(&self.timeouts).set_dependency(kind, profile.timeout);
        {
            let mut limiters = write(&self.limiters);
            for (name, entry) in limiters.iter_mut().filter(|(_, e)| e.kind == kind) {
                entry.limiter = Arc::new(RateLimiter::new(name.as_str(), profile.rate_limit));
            }
        }
        {
            let mut breakers = write(&self.breakers);
            for (name, entry) in breakers.iter_mut().filter(|(_, e)| e.kind == kind) {
                entry.breaker = Arc::new(CircuitBreaker::new(name.as_str(), profile.breaker.clone()));
            }
        }
        write(&self.profiles).insert(kind, profile);
    }

    /// Name and state of every breaker, sorted by name.
    #[must_use]
    pub fn breaker_states(&self) -> Vec<(String, State)> {
        let mut states: Vec<_> = read(&self.breakers)
            .iter()
            .map(|(name, entry)| (name.clone(), entry.breaker.state()))
            .collect();
        states.sort_by(|a, b| a.0.cmp(&b.0));
        states
    }

    /// Whether the registry can be locked (readiness probe).
    #[must_use]
    pub fn is_reachable(&self) -> bool {
        !self.breakers.is_poisoned() && !self.limiters.is_poisoned()
    }

    /// Drop every breaker and limiter.
    pub fn clear(&self) {
        write(&self.breakers).clear();
        write(&self.limiters).clear();
    }
}

/// Install the process-wide registry. The first call wins; later calls
/// return the registry already installed.
pub fn init_global(registry: ResilienceRegistry) -> Arc<ResilienceRegistry> {
    Arc::clone(GLOBAL.get_or_init(|| Arc::new(registry)))
}

/// The process-wide registry, if installed.
#[must_use]
pub fn global() -> Option<Arc<ResilienceRegistry>> {
    GLOBAL.get().cloned()
}

/// Clear the process-wide registry's breakers and limiters on shutdown.
pub fn teardown() {
    if let Some(registry) = GLOBAL.get() {
        tracing::info!("Tearing down resilience registry");
        registry.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code
mod tests {
    use super::*;

    #[test]
    fn test_breaker_key() {
        assert_eq!(breaker_key("task_manager.create_task"), "task_manager");
        assert_eq!(breaker_key("repository"), "repository");
    }

    #[test]
    fn test_same_name_shares_breaker() {
        let registry = ResilienceRegistry::new();

        let a = registry.breaker("task_manager", DependencyKind::ExternalApi);
        let b = registry.breaker("task_manager", DependencyKind::ExternalApi);
        let c = registry.breaker("notifier", DependencyKind::ExternalApi);

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn test_limiter_per_kind() {
        let registry = ResilienceRegistry::new();

        let a = registry.limiter(DependencyKind::Database);
        let b = registry.limiter(DependencyKind::Database);

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.name(), "database");
    }

    #[test]
    fn test_named_limiter_is_separate_from_shared_budget() {
        let registry = ResilienceRegistry::new();

        let shared = registry.limiter(DependencyKind::ExternalApi);
        let own = registry.limiter_named("nutrition.analyze", DependencyKind::ExternalApi);

        assert!(!Arc::ptr_eq(&shared, &own));
        assert_eq!(own.config(), shared.config());
        assert!(own.allow());
        assert_eq!(shared.metrics().allowed, 0);
    }

    #[test]
    fn test_update_profile_replaces_entries() {
        let registry = ResilienceRegistry::new();
        let before = registry.breaker("repository", DependencyKind::Database);
        let limiter_before = registry.limiter(DependencyKind::Database);

        let mut profile = ResilienceProfile::for_kind(DependencyKind::Database);
        profile.breaker.max_failures = 1;
        profile.timeout = Duration::from_millis(750);
        registry.update_profile(DependencyKind::Database, profile);

        let after = registry.breaker("repository", DependencyKind::Database);
        assert!(!Arc::ptr_eq(&before, &after));
        assert!(!Arc::ptr_eq(&limiter_before, &registry.limiter(DependencyKind::Database)));
        assert_eq!(after.config().max_failures, 1);
        assert_eq!(
            registry.resolve_timeout(None, "repository.find_by_id", DependencyKind::Database),
            Duration::from_millis(750)
        );
    }

    #[test]
    fn test_operation_timeout_wins_over_dependency() {
        let registry = ResilienceRegistry::new();
        registry.set_operation_timeout("ai.describe", Duration::from_secs(45));

        assert_eq!(
            registry.resolve_timeout(None, "ai.describe", DependencyKind::AiProvider),
            Duration::from_secs(45)
        );
        assert_eq!(
            registry.resolve_timeout(None, "ai.generate_recipe", DependencyKind::AiProvider),
            Duration::from_secs(90)
        );
    }

    #[test]
    fn test_breaker_states_and_clear() {
        let registry = ResilienceRegistry::new();
        let _ = registry.breaker("b", DependencyKind::EventBus);
        let _ = registry.breaker("a", DependencyKind::Database);

        let states = registry.breaker_states();
        assert_eq!(states[0], ("a".to_owned(), State::Closed));
        assert_eq!(states.len(), 2);
        assert!(registry.is_reachable());

        registry.clear();
        assert!(registry.breaker_states().is_empty());
    }
}
