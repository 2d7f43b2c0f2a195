//! Catalogue-backed cost analysis.

use crate::catalog::{convert, IngredientCatalog};
use async_trait::async_trait;
use beverage_inventor_core::analysis::{CostAnalysis, IngredientCost, DEFAULT_MARGIN_PERCENT};
use beverage_inventor_core::ports::{CostAnalyzer, CostRequest};
use beverage_inventor_core::{Beverage, CallContext, InventorError, Result};
use std::sync::Arc;

/// Hourly labour rate.
pub const HOURLY_RATE: f64 = 15.0;

/// Overhead as a fraction of ingredient cost.
pub const OVERHEAD_RATE: f64 = 0.20;

/// Minimum shipping charge.
pub const MIN_SHIPPING: f64 = 5.0;

/// Shipping charge per gram.
pub const SHIPPING_PER_GRAM: f64 = 0.01;

/// Minutes to prepare a batch: fixed setup plus time per serving.
#[must_use]
pub fn labor_cost(batch_size: u32) -> f64 {
    let minutes = 15.0 + f64::from(batch_size) * 2.0;
    minutes / 60.0 * HOURLY_RATE
}

/// Overhead on top of ingredients.
#[must_use]
pub fn overhead_cost(ingredient_cost: f64) -> f64 {
    ingredient_cost * OVERHEAD_RATE
}

/// Packaging per batch; servings above 500 ml need the larger container.
#[must_use]
pub fn packaging_cost(serving_size: f64, batch_size: u32) -> f64 {
    let per_serving = if serving_size > 500.0 { 0.15 } else { 0.10 };
    per_serving * f64::from(batch_size)
}

/// Shipping for the batch's weight. Liquids ship at 1 g/ml, everything
/// else at half its nominal quantity.
#[must_use]
pub fn shipping_cost(beverage: &Beverage, batch_size: u32) -> f64 {
    let grams: f64 = beverage
        .ingredients
        .iter()
        .map(|i| {
            let quantity = i.quantity * f64::from(batch_size);
            if i.unit == "ml" { quantity } else { quantity * 0.5 }
        })
        .sum();
    MIN_SHIPPING.max(grams * SHIPPING_PER_GRAM)
}

/// Prices a batch from the catalogue's pack prices and bulk brackets.
#[derive(Debug, Clone)]
pub struct CatalogCostAnalyzer {
    catalog: Arc<IngredientCatalog>,
    currency: String,
}

impl CatalogCostAnalyzer {
    /// Analyzer over `catalog`, pricing in USD.
    #[must_use]
    pub fn new(catalog: Arc<IngredientCatalog>) -> Self {
        Self {
            catalog,
            currency: "USD".to_string(),
        }
    }

    fn ingredient_cost(&self, name: &str, quantity: f64, unit: &str, batch_size: u32) -> Option<IngredientCost> {
        let entry = self.catalog.get(name)?;
        let needed = convert(quantity, unit, &entry.unit) * f64::from(batch_size);
        let mut total = needed * entry.unit_price();
        if let Some(discount) = entry.discount_for(needed) {
            total *= 1.0 - discount.percent / 100.0;
        }
        Some(IngredientCost {
            ingredient: entry.name.clone(),
            quantity: needed,
            unit: entry.unit.clone(),
            unit_price: entry.unit_price(),
            total_cost: total,
            supplier: entry.supplier.clone(),
        })
    }

    fn recommendations(analysis: &CostAnalysis, request: &CostRequest<'_>) -> Vec<String> {
        let mut recommendations = Vec::new();
        if let Some(priciest) = analysis
            .ingredient_costs
            .iter()
            .max_by(|a, b| a.total_cost.total_cmp(&b.total_cost))
        {
            if analysis.total_ingredient_cost > 0.0
                && priciest.total_cost > analysis.total_ingredient_cost * 0.3
                && analysis.ingredient_costs.len() > 1
            {
                recommendations.push(format!(
                    "Consider alternatives to {} ({:.1}% of ingredient cost)",
                    priciest.ingredient,
                    priciest.total_cost / analysis.total_ingredient_cost * 100.0
                ));
            }
        }
        if analysis.labor_cost > analysis.total_ingredient_cost * 0.5 {
            recommendations.push("High labor cost - consider batch optimization or automation".to_string());
        }
        if analysis.shipping_cost > analysis.total_ingredient_cost * 0.2 {
            recommendations.push("High shipping cost - consider local suppliers or bulk ordering".to_string());
        }
        if let Some(price) = analysis.suggested_price(DEFAULT_MARGIN_PERCENT) {
            match request.market.and_then(|m| m.target_price) {
                Some(target) if price > target => recommendations.push(format!(
                    "Suggested price ${price:.2} is above the market target of ${target:.2}"
                )),
                Some(_) => recommendations.push("Price is competitive with market".to_string()),
                None => {}
            }
        }
        recommendations
    }

    /// Synchronous analysis, shared with the optimizer.
    ///
    /// # Errors
    ///
    /// `invalid_request` for a zero batch.
    pub fn analyze(&self, request: &CostRequest<'_>) -> Result<CostAnalysis> {
        if request.batch_size == 0 {
            return Err(InventorError::invalid_request("cost.analyze", "batch size must be at least 1"));
        }

        let mut analysis = CostAnalysis {
            currency: self.currency.clone(),
            ..CostAnalysis::default()
        };

        for ingredient in &request.beverage.ingredients {
            match self.ingredient_cost(&ingredient.name, ingredient.quantity, &ingredient.unit, request.batch_size) {
                Some(line) => {
                    analysis.total_ingredient_cost += line.total_cost;
                    analysis.ingredient_costs.push(line);
                }
                None => analysis.warnings.push(format!(
                    "Failed to calculate cost for {}: no price data",
                    ingredient.name
                )),
            }
        }

        if request.include_labor {
            analysis.labor_cost = labor_cost(request.batch_size);
        }
        if request.include_overhead {
            analysis.overhead_cost = overhead_cost(analysis.total_ingredient_cost);
        }
        if request.include_shipping {
            analysis.shipping_cost = shipping_cost(request.beverage, request.batch_size);
        }
        analysis.packaging_cost = packaging_cost(request.serving_size, request.batch_size);

        analysis.total_cost = analysis.total_ingredient_cost
            + analysis.labor_cost
            + analysis.overhead_cost
            + analysis.shipping_cost
            + analysis.packaging_cost;
        analysis.cost_per_serving = analysis.total_cost / f64::from(request.batch_size);

        #[allow(clippy::cast_precision_loss)]
        let confidence = 0.9 - analysis.warnings.len() as f64 * 0.1;
        analysis.confidence = (confidence.clamp(0.0, 1.0) * 100.0).round() / 100.0;
        analysis.recommendations = Self::recommendations(&analysis, request);
        Ok(analysis)
    }
}

#[async_trait]
impl CostAnalyzer for CatalogCostAnalyzer {
    async fn analyze_cost(&self, ctx: &CallContext, request: &CostRequest<'_>) -> Result<CostAnalysis> {
        tracing::debug!(
            operation = %ctx.operation,
            beverage_id = %request.beverage.id,
            batch_size = request.batch_size,
            "Analyzing cost"
        );
        self.analyze(request)
    }
}
