//! Constraint check.
//!
//! Every violated constraint produces one warning; none of them fail the run.
//! Comparisons are strict: a value equal to its limit is within it.

use beverage_inventor_core::analysis::NutritionAnalysis;
use beverage_inventor_core::request::Constraints;
use beverage_inventor_core::Beverage;

/// Calories per serving: the analyzed figure when available, otherwise the
/// sum of the ingredients' own figures.
#[must_use]
pub fn calories(beverage: &Beverage, nutrition: Option<&NutritionAnalysis>) -> u32 {
    nutrition.map_or_else(
        || {
            beverage
                .ingredients
                .iter()
                .map(|i| i.nutritional_info.calories)
                .sum()
        },
        |n| n.nutrition.calories,
    )
}

/// Warnings for every constraint `beverage` violates.
#[must_use]
pub fn check(
    beverage: &Beverage,
    nutrition: Option<&NutritionAnalysis>,
    constraints: &Constraints,
) -> Vec<String> {
    let mut warnings = Vec::new();

    if let Some(max_cost) = constraints.max_cost {
        let cost = beverage.metadata.estimated_cost;
        if cost > max_cost {
            warnings.push(format!("beverage cost {cost:.2} exceeds maximum {max_cost:.2}"));
        }
    }

    if let Some(max_calories) = constraints.max_calories {
        let calories = calories(beverage, nutrition);
        if calories > max_calories {
            warnings.push(format!("beverage calories {calories} exceed maximum {max_calories}"));
        }
    }

    if let Some(max_prep) = constraints.max_prep_time {
        let prep = beverage.metadata.preparation_time;
        if prep > max_prep {
            warnings.push(format!("preparation time {prep} minutes exceeds maximum {max_prep}"));
        }
    }

    let allergens = beverage.allergens();
    for avoid in &constraints.allergen_free {
        if allergens.iter().any(|a| a.eq_ignore_ascii_case(avoid)) {
            warnings.push(format!("beverage contains allergen {avoid} which should be avoided"));
        }
    }

    let tagged = |tag: &str| beverage.metadata.tags.iter().any(|t| t.eq_ignore_ascii_case(tag));
    for tag in &constraints.required_tags {
        if !tagged(tag) {
            warnings.push(format!("beverage is missing required tag {tag}"));
        }
    }
    for tag in &constraints.forbidden_tags {
        if tagged(tag) {
            warnings.push(format!("beverage carries forbidden tag {tag}"));
        }
    }

    warnings
}
