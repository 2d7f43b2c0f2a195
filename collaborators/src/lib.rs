//! # Beverage Inventor Collaborators
//!
//! Implementations of the capability traits in
//! [`beverage_inventor_core::ports`].
//!
//! ## Local collaborators
//!
//! Backed by the [`IngredientCatalog`]:
//!
//! - [`RuleBasedGenerator`]: deterministic template expansion
//! - [`CatalogNutritionAnalyzer`], [`CatalogCostAnalyzer`], [`RuleCompatibilityAnalyzer`]
//! - [`VariationOptimizer`]: scaling and substitution search
//! - [`InMemoryBeverageRepository`]
//!
//! ## Remote collaborators
//!
//! - [`llm::LlmRecipeGenerator`] over the Messages API
//! - [`HttpTaskManager`] and [`SlackNotifier`]
//! - [`LoggingTaskManager`] and [`LoggingNotifier`] when nothing is configured
//!
//! None of these retry, time out, or fall back. Failures come back as
//! classified [`InventorError`](beverage_inventor_core::InventorError)s for the
//! resilience kernel to handle.

pub mod catalog;
pub mod compatibility;
pub mod cost;
pub mod fallback;
pub mod generator;
pub mod http;
pub mod llm;
pub mod notifier;
pub mod nutrition;
pub mod optimizer;
pub mod repository;
pub mod task_manager;

pub use catalog::IngredientCatalog;
pub use compatibility::RuleCompatibilityAnalyzer;
pub use cost::CatalogCostAnalyzer;
pub use fallback::{LoggingNotifier, LoggingTaskManager};
pub use generator::RuleBasedGenerator;
pub use notifier::SlackNotifier;
pub use nutrition::CatalogNutritionAnalyzer;
pub use optimizer::VariationOptimizer;
pub use repository::InMemoryBeverageRepository;
pub use task_manager::HttpTaskManager;
