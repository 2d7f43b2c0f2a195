//! Enhanced analysis.
//!
//! Nutrition, cost and compatibility run as three independently guarded
//! calls. A failed analysis clears only its own bundle and leaves a warning.

use crate::environment::PipelineEnvironment;
use crate::report;
use beverage_inventor_core::analysis::{CompatibilityAnalysis, CostAnalysis, NutritionAnalysis};
use beverage_inventor_core::ports::CostRequest;
use beverage_inventor_core::request::{DietaryProfile, MarketContext};
use beverage_inventor_core::{AnalysisLevel, Beverage, DependencyKind, Response, Result};
use beverage_inventor_resilience::{CallSpec, Executor};
use tokio::time::Instant;

/// Operation name of the nutrition analysis.
pub const NUTRITION_ANALYZE: &str = "nutrition.analyze";
/// Operation name of the cost analysis.
pub const COST_ANALYZE: &str = "cost.analyze";
/// Operation name of the compatibility analysis.
pub const COMPATIBILITY_ANALYZE: &str = "compatibility.analyze";

/// What the analyses look at.
#[derive(Debug, Clone, Copy)]
pub(crate) struct AnalysisInputs<'a> {
    pub beverage: &'a Beverage,
    pub serving_size: f64,
    pub batch_size: u32,
    pub level: AnalysisLevel,
    pub profile: Option<&'a DietaryProfile>,
    pub market: Option<&'a MarketContext>,
    pub deadline: Option<Instant>,
    pub correlation_id: &'a str,
}

impl AnalysisInputs<'_> {
    // Catalogue analyzers run in-process; each keeps its own limiter so they
    // never spend the task and notification budget.
    fn spec(&self, operation: &str) -> CallSpec {
        CallSpec::new(operation, DependencyKind::ExternalApi)
            .limiter(operation)
            .deadline(self.deadline)
            .correlation_id(self.correlation_id)
    }
}

/// Raw results of the three analyses.
#[derive(Debug)]
pub(crate) struct AnalysisOutcome {
    pub nutrition: Result<NutritionAnalysis>,
    pub cost: Result<CostAnalysis>,
    pub compatibility: Result<CompatibilityAnalysis>,
}

/// Run the three analyses, concurrently if asked.
pub(crate) async fn run(
    executor: &Executor,
    env: &PipelineEnvironment,
    inputs: AnalysisInputs<'_>,
    concurrent: bool,
) -> AnalysisOutcome {
    let inputs = &inputs;

    let nutrition = executor.execute_call(inputs.spec(NUTRITION_ANALYZE), |ctx| {
        let analyzer = &env.nutrition;
        async move {
            analyzer
                .analyze_nutrition(&ctx, inputs.beverage, inputs.serving_size, inputs.level, inputs.profile)
                .await
        }
    });

    let cost = executor.execute_call(inputs.spec(COST_ANALYZE), |ctx| {
        let analyzer = &env.cost;
        async move {
            let request = CostRequest {
                beverage: inputs.beverage,
                serving_size: inputs.serving_size,
                batch_size: inputs.batch_size,
                include_shipping: true,
                include_labor: true,
                include_overhead: true,
                market: inputs.market,
            };
            analyzer.analyze_cost(&ctx, &request).await
        }
    });

    let compatibility = executor.execute_call(inputs.spec(COMPATIBILITY_ANALYZE), |ctx| {
        let analyzer = &env.compatibility;
        async move {
            analyzer
                .analyze_compatibility(&ctx, inputs.beverage, inputs.level)
                .await
        }
    });

    let (nutrition, cost, compatibility) = if concurrent {
        tokio::join!(nutrition, cost, compatibility)
    } else {
        (nutrition.await, cost.await, compatibility.await)
    };

    AnalysisOutcome {
        nutrition,
        cost,
        compatibility,
    }
}

/// Fold the outcome into `response`.
///
/// Recommendations are appended in the order nutrition, cost, compatibility.
/// With a positive `target_margin` the suggested selling price is added
/// after the cost recommendations.
pub(crate) fn apply(outcome: AnalysisOutcome, target_margin: Option<f64>, response: &mut Response) {
    match outcome.nutrition {
        Ok(nutrition) => {
            response
                .recommendations
                .extend(nutrition.recommendations.iter().cloned());
            response.nutritional_analysis = Some(nutrition);
        }
        Err(err) => {
            response.nutritional_analysis = None;
            report::warn(response, "analysis", format!("nutritional analysis failed: {err}"));
        }
    }

    match outcome.cost {
        Ok(cost) => {
            response.recommendations.extend(cost.recommendations.iter().cloned());
            let priced = target_margin
                .filter(|m| *m > 0.0)
                .and_then(|m| cost.suggested_price(m).map(|price| (m, price)));
            if let Some((margin, price)) = priced {
                response
                    .recommendations
                    .push(format!("Suggested selling price: ${price:.2} for {margin:.1}% margin"));
            }
            response.cost_analysis = Some(cost);
        }
        Err(err) => {
            response.cost_analysis = None;
            report::warn(response, "analysis", format!("cost analysis failed: {err}"));
        }
    }

    match outcome.compatibility {
        Ok(compatibility) => {
            response
                .recommendations
                .extend(compatibility.recommendations.iter().cloned());
            let conflicts: Vec<String> = compatibility
                .high_severity_conflicts()
                .map(|c| format!("High severity conflict: {}", c.description))
                .collect();
            for conflict in conflicts {
                report::warn(response, "analysis", conflict);
            }
            response.compatibility_analysis = Some(compatibility);
        }
        Err(err) => {
            response.compatibility_analysis = None;
            report::warn(response, "analysis", format!("compatibility analysis failed: {err}"));
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code
mod tests {
    use super::*;
    use beverage_inventor_core::analysis::{FlavorConflict, Severity};
    use beverage_inventor_core::{Ingredient, InventorError, Utc};

    fn response() -> Response {
        Response::new(Beverage::draft(
            "Latte",
            "Milky",
            "comfort",
            vec![Ingredient::new("espresso", 2.0, "shots")],
            Utc::now(),
        ))
    }

    fn cost(per_serving: f64) -> CostAnalysis {
        CostAnalysis {
            ingredient_costs: Vec::new(),
            total_ingredient_cost: per_serving,
            labor_cost: 0.0,
            overhead_cost: 0.0,
            shipping_cost: 0.0,
            packaging_cost: 0.0,
            total_cost: per_serving,
            cost_per_serving: per_serving,
            currency: "USD".to_string(),
            confidence: 0.9,
            warnings: Vec::new(),
            recommendations: vec!["cost rec".to_string()],
        }
    }

    fn compatibility() -> CompatibilityAnalysis {
        CompatibilityAnalysis {
            overall_compatibility: 20.0,
            conflicts: vec![
                FlavorConflict {
                    first: "whole milk".to_string(),
                    second: "lemon juice".to_string(),
                    severity: Severity::High,
                    description: "Acid curdles milk".to_string(),
                },
                FlavorConflict {
                    first: "green tea".to_string(),
                    second: "whole milk".to_string(),
                    severity: Severity::Medium,
                    description: "Milk mutes tea".to_string(),
                },
            ],
            synergies: Vec::new(),
            recommendations: vec!["compat rec".to_string()],
            confidence: 0.9,
        }
    }

    #[test]
    fn test_margin_price_follows_cost_recommendations() {
        let mut response = response();
        let outcome = AnalysisOutcome {
            nutrition: Err(InventorError::timeout(NUTRITION_ANALYZE, "deadline exceeded")),
            cost: Ok(cost(3.5)),
            compatibility: Ok(compatibility()),
        };

        apply(outcome, Some(30.0), &mut response);

        assert_eq!(
            response.recommendations,
            vec!["cost rec", "Suggested selling price: $5.00 for 30.0% margin", "compat rec"]
        );
        assert!(response.nutritional_analysis.is_none());
        assert!(response.cost_analysis.is_some());
        assert_eq!(response.warnings.len(), 2);
        assert!(response.warnings[0].starts_with("nutritional analysis failed: timeout"));
        assert_eq!(response.warnings[1], "High severity conflict: Acid curdles milk");
    }

    #[test]
    fn test_no_margin_no_price() {
        let mut response = response();
        let outcome = AnalysisOutcome {
            nutrition: Err(InventorError::timeout(NUTRITION_ANALYZE, "x")),
            cost: Ok(cost(3.5)),
            compatibility: Err(InventorError::circuit_open(COMPATIBILITY_ANALYZE, std::time::Duration::from_secs(60))),
        };

        apply(outcome, None, &mut response);

        assert_eq!(response.recommendations, vec!["cost rec"]);
        assert!(response.compatibility_analysis.is_none());
    }
}
