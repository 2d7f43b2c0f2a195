//! Requests, beverages and resilience registries for tests.

use crate::mocks::test_clock;
use beverage_inventor_core::environment::Clock;
use beverage_inventor_core::{Beverage, DependencyKind, Ingredient, Request};
use beverage_inventor_resilience::{Backoff, ProfileOverride, ResilienceProfile, ResilienceRegistry};
use std::sync::Arc;
use std::time::Duration;

/// `{ingredients: [espresso, whole milk], theme: comfort, use_ai: false, created_by: u1}`
#[must_use]
pub fn minimal_request() -> Request {
    Request::builder()
        .ingredients(["espresso", "whole milk"])
        .theme("comfort")
        .use_ai(false)
        .created_by("u1")
        .correlation_id("test-correlation")
        .build()
}

/// A latte-style draft whose metadata cost is `estimated_cost`.
#[must_use]
pub fn beverage_with_cost(estimated_cost: f64) -> Beverage {
    let mut beverage = Beverage::draft(
        "Test Latte",
        "Espresso with steamed milk",
        "comfort",
        vec![
            Ingredient::new("espresso", 2.0, "shots"),
            Ingredient::new("whole milk", 200.0, "ml"),
        ],
        test_clock().now(),
    );
    beverage.created_by = "u1".to_string();
    beverage.metadata.estimated_cost = estimated_cost;
    beverage.metadata.preparation_time = 5;
    beverage.metadata.difficulty = "easy".to_string();
    beverage
}

/// Overrides for tests: `max_attempts` with a 1 ms fixed backoff, and rate
/// limits high enough never to throttle.
#[must_use]
pub fn fast_profile(max_attempts: u32) -> ProfileOverride {
    ProfileOverride {
        max_attempts: Some(max_attempts),
        backoff: Some(Backoff::Fixed {
            delay: Duration::from_millis(1),
        }),
        rate: Some(100_000),
        burst_size: Some(100_000),
        ..ProfileOverride::default()
    }
}

/// Registry with the default profiles under [`fast_profile`].
#[must_use]
pub fn fast_registry() -> Arc<ResilienceRegistry> {
    registry_with(&[])
}

/// [`fast_registry`] plus `overrides` per kind.
#[must_use]
pub fn registry_with(overrides: &[(DependencyKind, ProfileOverride)]) -> Arc<ResilienceRegistry> {
    let profiles = DependencyKind::ALL.iter().map(|&kind| {
        let mut profile = ResilienceProfile::for_kind(kind).with_overrides(&fast_profile(3));
        for (_, extra) in overrides.iter().filter(|(k, _)| *k == kind) {
            profile = profile.with_overrides(extra);
        }
        (kind, profile)
    });
    Arc::new(ResilienceRegistry::with_profiles(profiles))
}
