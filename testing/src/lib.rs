//! # Beverage Inventor Testing
//!
//! Test doubles and fixtures for the beverage inventor crates.
//!
//! This crate provides:
//! - A fixed [`Clock`] for deterministic timestamps
//! - Recording, flaky and failing collaborator doubles in [`doubles`]
//! - Request and beverage fixtures plus fast resilience registries in [`fixtures`]
//! - proptest strategies in [`properties`]
//!
//! ## Example
//!
//! ```
//! use beverage_inventor_testing::{fixtures, RecordingPublisher};
//!
//! let request = fixtures::minimal_request();
//! assert_eq!(request.ingredients, vec!["espresso", "whole milk"]);
//!
//! let publisher = RecordingPublisher::new();
//! assert!(publisher.events().is_empty());
//! ```

use beverage_inventor_core::environment::Clock;
use chrono::{DateTime, Utc};

pub mod doubles;
pub mod fixtures;

/// Mock implementations of environment traits.
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use beverage_inventor_testing::mocks::FixedClock;
    /// use beverage_inventor_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// proptest strategies for domain values.
pub mod properties {
    use beverage_inventor_core::request::ObjectiveWeights;
    use proptest::prelude::*;

    /// Ingredient names drawn from the standard catalogue.
    pub fn catalogued_ingredient() -> impl Strategy<Value = String> {
        prop::sample::select(vec![
            "espresso",
            "whole milk",
            "oat milk",
            "vanilla",
            "green tea",
            "honey",
            "cinnamon",
            "mint",
        ])
        .prop_map(str::to_string)
    }

    /// Objective weights whose sum lies within `1.0 ± 0.01`.
    pub fn valid_weights() -> impl Strategy<Value = ObjectiveWeights> {
        (0.01..1.0f64, 0.01..1.0f64, 0.01..1.0f64, 0.01..1.0f64, -0.009..0.009f64).prop_map(
            |(taste, cost, nutrition, compatibility, skew)| {
                let scale = (1.0 + skew) / (taste + cost + nutrition + compatibility);
                ObjectiveWeights {
                    taste: taste * scale,
                    cost: cost * scale,
                    nutrition: nutrition * scale,
                    compatibility: compatibility * scale,
                }
            },
        )
    }
}

/// Install a compact `tracing` subscriber for test output.
///
/// Safe to call from every test; only the first call installs it.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .compact()
        .try_init();
}

pub use doubles::{
    FailingAiGenerator, FailureScript, FlakyRepository, FlakyTaskManager, RecordingNotifier,
    RecordingPublisher, StubGenerator,
};
pub use mocks::{FixedClock, test_clock};
