//! Analysis bundles attached to a response.
//!
//! Each bundle is produced whole by one analyzer. The pipeline either keeps
//! the complete bundle or drops it; there is no partial state.

use crate::beverage::{Beverage, NutritionalInfo};
use crate::request::ObjectiveWeights;
use serde::{Deserialize, Serialize};

/// Which diets a beverage suits.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DietaryCompatibility {
    /// No animal products
    pub vegan: bool,
    /// No dairy
    pub dairy_free: bool,
    /// No nuts
    pub nut_free: bool,
    /// Sugar below the low-sugar threshold
    pub low_sugar: bool,
    /// No caffeine
    pub caffeine_free: bool,
}

/// Nutritional analysis for one serving.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NutritionAnalysis {
    /// Totals for the serving
    pub nutrition: NutritionalInfo,
    /// 0-100
    pub health_score: f64,
    /// Present for detailed and comprehensive levels
    pub dietary: Option<DietaryCompatibility>,
    /// Analyzer recommendations
    pub recommendations: Vec<String>,
    /// Analyzer warnings
    pub warnings: Vec<String>,
    /// 0-1
    pub confidence: f64,
}

/// Cost of one ingredient line for the batch.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IngredientCost {
    /// Ingredient name
    pub ingredient: String,
    /// Quantity for the batch
    pub quantity: f64,
    /// Unit
    pub unit: String,
    /// Price per pricing unit
    pub unit_price: f64,
    /// Line total after discounts
    pub total_cost: f64,
    /// Supplier name
    pub supplier: String,
}

/// Cost breakdown and profitability.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CostAnalysis {
    /// Per-ingredient lines
    pub ingredient_costs: Vec<IngredientCost>,
    /// Sum of ingredient lines
    pub total_ingredient_cost: f64,
    /// Labour
    pub labor_cost: f64,
    /// Overhead
    pub overhead_cost: f64,
    /// Shipping
    pub shipping_cost: f64,
    /// Packaging
    pub packaging_cost: f64,
    /// Batch total
    pub total_cost: f64,
    /// Batch total divided by servings
    pub cost_per_serving: f64,
    /// ISO currency code
    pub currency: String,
    /// 0-1
    pub confidence: f64,
    /// Analyzer warnings
    pub warnings: Vec<String>,
    /// Cost optimisation recommendations
    pub recommendations: Vec<String>,
}

/// Margin used when none is requested, in percent.
pub const DEFAULT_MARGIN_PERCENT: f64 = 30.0;

impl CostAnalysis {
    /// Selling price per serving for a profit margin in percent.
    ///
    /// Returns `None` for margins outside `[0, 100)`.
    #[must_use]
    pub fn suggested_price(&self, margin_percent: f64) -> Option<f64> {
        if !(0.0..100.0).contains(&margin_percent) {
            return None;
        }
        Some(self.cost_per_serving / (1.0 - margin_percent / 100.0))
    }
}

/// Severity of a flavour conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Minor
    Low,
    /// Noticeable
    Medium,
    /// Likely to ruin the drink
    High,
}

impl Severity {
    /// Map a rule confidence to a severity.
    #[must_use]
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence > 0.8 {
            Self::High
        } else if confidence > 0.5 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// Two ingredients that clash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlavorConflict {
    /// First ingredient
    pub first: String,
    /// Second ingredient
    pub second: String,
    /// Severity
    pub severity: Severity,
    /// Why they clash
    pub description: String,
}

/// Two ingredients that complement each other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlavorSynergy {
    /// First ingredient
    pub first: String,
    /// Second ingredient
    pub second: String,
    /// 0-10
    pub strength: f64,
    /// Why they work
    pub description: String,
}

/// Ingredient compatibility analysis.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CompatibilityAnalysis {
    /// 0-100
    pub overall_compatibility: f64,
    /// Clashing pairs
    pub conflicts: Vec<FlavorConflict>,
    /// Complementary pairs
    pub synergies: Vec<FlavorSynergy>,
    /// Recommendations
    pub recommendations: Vec<String>,
    /// 0-1
    pub confidence: f64,
}

impl CompatibilityAnalysis {
    /// Conflicts rated high severity.
    pub fn high_severity_conflicts(&self) -> impl Iterator<Item = &FlavorConflict> {
        self.conflicts
            .iter()
            .filter(|c| c.severity == Severity::High)
    }
}

/// Per-objective scores, each 0-100.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ObjectiveScores {
    /// Taste
    pub taste: f64,
    /// Cost (higher is cheaper)
    pub cost: f64,
    /// Nutrition
    pub nutrition: f64,
    /// Compatibility
    pub compatibility: f64,
    /// Weighted sum
    pub overall: f64,
}

impl ObjectiveScores {
    /// Recompute `overall` from the axis scores.
    #[must_use]
    pub fn weighted(mut self, weights: &ObjectiveWeights) -> Self {
        self.overall = self.taste * weights.taste
            + self.cost * weights.cost
            + self.nutrition * weights.nutrition
            + self.compatibility * weights.compatibility;
        self
    }

    /// Pareto dominance: at least as good everywhere, strictly better somewhere.
    #[must_use]
    pub fn dominates(&self, other: &Self) -> bool {
        let ge = self.taste >= other.taste
            && self.cost >= other.cost
            && self.nutrition >= other.nutrition
            && self.compatibility >= other.compatibility;
        let gt = self.taste > other.taste
            || self.cost > other.cost
            || self.nutrition > other.nutrition
            || self.compatibility > other.compatibility;
        ge && gt
    }
}

/// Result of recipe optimization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    /// Best recipe found
    pub recipe: Beverage,
    /// Scores of the input recipe
    pub base_scores: ObjectiveScores,
    /// Scores of the best recipe
    pub scores: ObjectiveScores,
    /// Weights used
    pub weights: ObjectiveWeights,
    /// What changed relative to the input
    pub changes: Vec<String>,
    /// Optimizer recommendations
    pub recommendations: Vec<String>,
    /// Set by the pipeline: whether the recipe replaced the working beverage
    #[serde(default)]
    pub adopted: bool,
}
