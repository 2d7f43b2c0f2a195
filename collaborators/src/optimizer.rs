//! Multi-objective recipe optimizer.
//!
//! Scores the base recipe, derives variations by scaling one ingredient or
//! swapping it for a catalogued substitute, and keeps the variation with the
//! best weighted score. Variations that break the goals' nutrition or cost
//! limits are dropped before ranking.

use crate::catalog::{convert, IngredientCatalog};
use crate::compatibility::RuleCompatibilityAnalyzer;
use crate::cost::CatalogCostAnalyzer;
use crate::nutrition::CatalogNutritionAnalyzer;
use async_trait::async_trait;
use beverage_inventor_core::analysis::{ObjectiveScores, OptimizationResult};
use beverage_inventor_core::ports::{CostRequest, OptimizationRequest, RecipeOptimizer};
use beverage_inventor_core::request::OptimizationGoals;
use beverage_inventor_core::{AnalysisLevel, Beverage, CallContext, Ingredient, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Cost per serving that scores zero when the goals set no ceiling.
pub const DEFAULT_MAX_COST_PER_SERVING: f64 = 10.0;

/// Quantity factors tried for every ingredient.
const SCALE_FACTORS: [f64; 2] = [0.8, 1.2];

/// Quantity changes below this are not reported.
const QUANTITY_EPSILON: f64 = 0.1;

/// Ingredient-level differences between two recipes.
#[must_use]
pub fn key_differences(original: &Beverage, variation: &Beverage) -> Vec<String> {
    let before: HashMap<&str, f64> = original
        .ingredients
        .iter()
        .map(|i| (i.name.as_str(), i.quantity))
        .collect();

    let mut differences = Vec::new();
    for ingredient in &variation.ingredients {
        match before.get(ingredient.name.as_str()) {
            Some(quantity) if (quantity - ingredient.quantity).abs() > QUANTITY_EPSILON => {
                differences.push(format!("Changed {} amount", ingredient.name));
            }
            Some(_) => {}
            None => differences.push(format!("Added {}", ingredient.name)),
        }
    }
    for ingredient in &original.ingredients {
        if !variation.has_ingredient(&ingredient.name) {
            differences.push(format!("Removed {}", ingredient.name));
        }
    }
    differences
}

/// Recommendations comparing the best scores to the base scores.
#[must_use]
pub fn improvement_recommendations(base: &ObjectiveScores, best: &ObjectiveScores) -> Vec<String> {
    let improvement = best.overall - base.overall;
    let mut recommendations = vec![if improvement > 10.0 {
        format!("Significant improvement achieved ({improvement:.1} points)")
    } else if improvement > 0.0 {
        format!("Moderate improvement achieved ({improvement:.1} points)")
    } else {
        "Limited improvement possible with current constraints".to_string()
    }];

    if best.cost < 50.0 {
        recommendations.push("Consider cost reduction strategies".to_string());
    }
    if best.nutrition < 60.0 {
        recommendations.push("Consider nutritional enhancements".to_string());
    }
    if best.taste < 70.0 {
        recommendations.push("Consider flavor profile improvements".to_string());
    }
    recommendations
}

fn listed(names: &[String], name: &str) -> bool {
    names.iter().any(|n| n.trim().eq_ignore_ascii_case(name.trim()))
}

fn estimated_cost(ingredients: &[Ingredient]) -> f64 {
    let total: f64 = ingredients.iter().map(|i| i.cost * i.quantity).sum();
    (total * 100.0).round() / 100.0
}

/// Optimizer built from the catalogue-backed analyzers.
#[derive(Debug, Clone)]
pub struct VariationOptimizer {
    catalog: Arc<IngredientCatalog>,
    compatibility: RuleCompatibilityAnalyzer,
    nutrition: CatalogNutritionAnalyzer,
    cost: CatalogCostAnalyzer,
}

impl VariationOptimizer {
    /// Optimizer over `catalog`.
    #[must_use]
    pub fn new(catalog: Arc<IngredientCatalog>) -> Self {
        Self {
            compatibility: RuleCompatibilityAnalyzer::new(Arc::clone(&catalog)),
            nutrition: CatalogNutritionAnalyzer::new(Arc::clone(&catalog)),
            cost: CatalogCostAnalyzer::new(Arc::clone(&catalog)),
            catalog,
        }
    }

    /// Score `beverage` on every axis and weight the result.
    ///
    /// Cost is scored on ingredients and packaging only, so batch overheads
    /// do not swamp the comparison between variations.
    ///
    /// # Errors
    ///
    /// Propagates analyzer errors for an invalid serving or batch size.
    pub fn evaluate(&self, beverage: &Beverage, request: &OptimizationRequest<'_>) -> Result<ObjectiveScores> {
        let compatibility = self
            .compatibility
            .analyze(beverage, AnalysisLevel::Basic)
            .overall_compatibility;

        let cost = self.cost.analyze(&CostRequest {
            beverage,
            serving_size: request.serving_size,
            batch_size: request.batch_size,
            include_shipping: false,
            include_labor: false,
            include_overhead: false,
            market: None,
        })?;
        let ceiling = request
            .goals
            .max_cost_per_serving
            .filter(|max| *max > 0.0)
            .unwrap_or(DEFAULT_MAX_COST_PER_SERVING);
        let cost_score = ((ceiling - cost.cost_per_serving) / ceiling * 100.0).clamp(0.0, 100.0);

        let nutrition = self
            .nutrition
            .analyze(beverage, request.serving_size, AnalysisLevel::Basic, None)?
            .health_score;

        Ok(ObjectiveScores {
            taste: compatibility,
            cost: cost_score,
            nutrition,
            compatibility,
            overall: 0.0,
        }
        .weighted(&request.weights))
    }

    fn within_limits(&self, beverage: &Beverage, goals: &OptimizationGoals, serving_size: f64) -> bool {
        let (nutrition, _) = self.nutrition.serving_nutrition(beverage, serving_size);
        goals.max_calories.is_none_or(|max| f64::from(nutrition.calories) <= max)
            && goals.max_sugar.is_none_or(|max| nutrition.sugar <= max)
            && goals.min_protein.is_none_or(|min| nutrition.protein >= min)
    }

    /// Candidate recipes one edit away from `base`.
    #[must_use]
    pub fn variations(&self, base: &Beverage, goals: &OptimizationGoals) -> Vec<Beverage> {
        let mut variations = Vec::new();

        for (index, ingredient) in base.ingredients.iter().enumerate() {
            for factor in SCALE_FACTORS {
                let mut variation = base.clone();
                variation.ingredients[index].quantity = ingredient.quantity * factor;
                variations.push(variation);
            }

            if listed(&goals.required_ingredients, &ingredient.name) {
                continue;
            }
            for substitution in self.catalog.substitutions(&ingredient.name) {
                if listed(&goals.forbidden_ingredients, &substitution.substitute)
                    || base.has_ingredient(&substitution.substitute)
                {
                    continue;
                }
                let Some(entry) = self.catalog.get(&substitution.substitute) else {
                    continue;
                };
                let quantity = convert(ingredient.quantity * substitution.ratio, &ingredient.unit, &entry.unit);
                let mut variation = base.clone();
                variation.ingredients[index] = Ingredient {
                    source: entry.supplier.clone(),
                    cost: entry.unit_price(),
                    nutritional_info: entry.nutrition.clone(),
                    ..Ingredient::new(entry.name.clone(), quantity, entry.unit.clone())
                };
                variations.push(variation);
            }
        }

        for variation in &mut variations {
            variation.metadata.estimated_cost = estimated_cost(&variation.ingredients);
        }
        variations
    }

    /// Synchronous optimization, shared by the async capability.
    ///
    /// # Errors
    ///
    /// `invalid_objectives` when the weights do not sum to 1.0 (checked
    /// before anything is scored), or an analyzer error.
    pub fn run(&self, request: &OptimizationRequest<'_>) -> Result<OptimizationResult> {
        request.weights.validate()?;

        let base_scores = self.evaluate(request.base, request)?;
        let mut best: Option<(Beverage, ObjectiveScores)> = None;

        for variation in self.variations(request.base, request.goals) {
            if !self.within_limits(&variation, request.goals, request.serving_size) {
                continue;
            }
            let scores = self.evaluate(&variation, request)?;
            let leading = best.as_ref().map_or(base_scores.overall, |(_, s)| s.overall);
            if scores.overall > leading {
                best = Some((variation, scores));
            }
        }

        let (recipe, scores) = best.unwrap_or_else(|| (request.base.clone(), base_scores));
        tracing::debug!(
            beverage_id = %recipe.id,
            base = base_scores.overall,
            best = scores.overall,
            "Optimization finished"
        );

        Ok(OptimizationResult {
            changes: key_differences(request.base, &recipe),
            recommendations: improvement_recommendations(&base_scores, &scores),
            recipe,
            base_scores,
            scores,
            weights: request.weights,
            adopted: false,
        })
    }
}

#[async_trait]
impl RecipeOptimizer for VariationOptimizer {
    async fn optimize(&self, ctx: &CallContext, request: &OptimizationRequest<'_>) -> Result<OptimizationResult> {
        tracing::debug!(operation = %ctx.operation, beverage_id = %request.base.id, "Optimizing recipe");
        self.run(request)
    }
}
