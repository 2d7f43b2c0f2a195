//! Pipeline response.

use crate::analysis::{CompatibilityAnalysis, CostAnalysis, NutritionAnalysis, OptimizationResult};
use crate::beverage::Beverage;
use serde::{Deserialize, Serialize};

/// Outcome of a successful pipeline run.
///
/// `warnings` and `recommendations` preserve append order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// The persisted beverage
    pub beverage: Beverage,
    /// Whether the AI generator produced the recipe
    pub ai_used: bool,
    /// Whether a downstream task was created
    pub task_created: bool,
    /// Id of the downstream task
    pub task_id: Option<String>,
    /// Degradations, in order
    pub warnings: Vec<String>,
    /// Suggestions, in order
    pub recommendations: Vec<String>,
    /// Nutrition bundle
    pub nutritional_analysis: Option<NutritionAnalysis>,
    /// Cost bundle
    pub cost_analysis: Option<CostAnalysis>,
    /// Compatibility bundle
    pub compatibility_analysis: Option<CompatibilityAnalysis>,
    /// Optimization bundle
    pub optimization: Option<OptimizationResult>,
}

impl Response {
    /// Response for `beverage` with nothing else populated.
    #[must_use]
    pub const fn new(beverage: Beverage) -> Self {
        Self {
            beverage,
            ai_used: false,
            task_created: false,
            task_id: None,
            warnings: Vec::new(),
            recommendations: Vec::new(),
            nutritional_analysis: None,
            cost_analysis: None,
            compatibility_analysis: None,
            optimization: None,
        }
    }

    /// Health score from the nutrition bundle.
    #[must_use]
    pub fn health_score(&self) -> Option<f64> {
        self.nutritional_analysis.as_ref().map(|n| n.health_score)
    }

    /// Cost per serving, preferring the cost bundle over metadata.
    #[must_use]
    pub fn cost_per_serving(&self) -> f64 {
        self.cost_analysis
            .as_ref()
            .map_or(self.beverage.metadata.estimated_cost, |c| c.cost_per_serving)
    }
}
