//! Collaborators injected into the pipeline.

use beverage_inventor_core::environment::Clock;
use beverage_inventor_core::ports::{
    BeverageRepository, CompatibilityAnalyzer, CostAnalyzer, EventPublisher, Notifier,
    NutritionAnalyzer, RecipeGenerator, RecipeOptimizer, TaskManager,
};
use std::fmt;
use std::sync::Arc;

/// Everything the pipeline talks to.
///
/// `generator` is the rule-based generator and must always succeed on a
/// valid request. `ai_generator` and `optimizer` are optional; without
/// them the AI path and the optimize stage are skipped.
#[derive(Clone)]
pub struct PipelineEnvironment {
    /// Rule-based generator, also the AI fallback
    pub generator: Arc<dyn RecipeGenerator>,
    /// AI generator
    pub ai_generator: Option<Arc<dyn RecipeGenerator>>,
    /// Nutrition analyzer
    pub nutrition: Arc<dyn NutritionAnalyzer>,
    /// Cost analyzer
    pub cost: Arc<dyn CostAnalyzer>,
    /// Compatibility analyzer
    pub compatibility: Arc<dyn CompatibilityAnalyzer>,
    /// Recipe optimizer
    pub optimizer: Option<Arc<dyn RecipeOptimizer>>,
    /// Beverage storage
    pub repository: Arc<dyn BeverageRepository>,
    /// Outbound events
    pub publisher: Arc<dyn EventPublisher>,
    /// Downstream task creation
    pub task_manager: Arc<dyn TaskManager>,
    /// Notifications
    pub notifier: Arc<dyn Notifier>,
    /// Time source
    pub clock: Arc<dyn Clock>,
}

impl PipelineEnvironment {
    /// Add an AI generator.
    #[must_use]
    pub fn with_ai_generator(mut self, generator: Arc<dyn RecipeGenerator>) -> Self {
        self.ai_generator = Some(generator);
        self
    }

    /// Add an optimizer.
    #[must_use]
    pub fn with_optimizer(mut self, optimizer: Arc<dyn RecipeOptimizer>) -> Self {
        self.optimizer = Some(optimizer);
        self
    }
}

impl fmt::Debug for PipelineEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineEnvironment")
            .field("ai_generator", &self.ai_generator.is_some())
            .field("optimizer", &self.optimizer.is_some())
            .finish_non_exhaustive()
    }
}
