//! Rule-based recipe generator.
//!
//! Expands the requested ingredient names into a full recipe using the
//! catalogue's default quantities. Deterministic for a given request and
//! clock, and never fails on a request that passed validation.

use crate::catalog::{Category, IngredientCatalog};
use async_trait::async_trait;
use beverage_inventor_core::environment::Clock;
use beverage_inventor_core::ports::{GeneratedRecipe, RecipeGenerator};
use beverage_inventor_core::{Beverage, BeverageMetadata, CallContext, Ingredient, Request, Result};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Quantity given to ingredients the catalogue does not know.
const GENERIC_QUANTITY_ML: f64 = 30.0;

/// Cost per ml assumed for ingredients the catalogue does not know.
const GENERIC_COST_PER_ML: f64 = 0.01;

/// Template-driven generator backed by the ingredient catalogue.
#[derive(Clone)]
pub struct RuleBasedGenerator {
    catalog: Arc<IngredientCatalog>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for RuleBasedGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleBasedGenerator")
            .field("catalog_entries", &self.catalog.len())
            .finish_non_exhaustive()
    }
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn theme_adjective(theme: &str) -> String {
    let lower = theme.to_lowercase();
    if lower.contains("mars") {
        "Martian".to_string()
    } else if lower.contains("space") || lower.contains("orbit") || lower.contains("lunar") {
        "Orbital".to_string()
    } else if lower.contains("earth") || lower.contains("classic") {
        "Classic".to_string()
    } else {
        title_case(theme)
    }
}

fn style(categories: &BTreeSet<Category>) -> &'static str {
    let milky = categories.contains(&Category::Dairy) || categories.contains(&Category::PlantMilk);
    if categories.contains(&Category::Coffee) && milky {
        "Latte"
    } else if categories.contains(&Category::Coffee) {
        "Brew"
    } else if categories.contains(&Category::Tea) {
        "Infusion"
    } else if categories.contains(&Category::Fruit) {
        "Refresher"
    } else if milky {
        "Steamer"
    } else {
        "Elixir"
    }
}

fn join_names(names: &[String]) -> String {
    match names {
        [] => String::new(),
        [only] => only.clone(),
        [init @ .., last] => format!("{} and {last}", init.join(", ")),
    }
}

fn difficulty(ingredients: usize, minutes: u32) -> &'static str {
    if ingredients <= 3 && minutes <= 5 {
        "easy"
    } else if ingredients <= 5 && minutes <= 10 {
        "medium"
    } else {
        "hard"
    }
}

impl RuleBasedGenerator {
    /// Generator over `catalog`, stamping beverages with `clock`.
    #[must_use]
    pub fn new(catalog: Arc<IngredientCatalog>, clock: Arc<dyn Clock>) -> Self {
        Self { catalog, clock }
    }

    /// Build the recipe. Infallible for a non-empty ingredient list.
    #[must_use]
    pub fn generate(&self, request: &Request) -> GeneratedRecipe {
        let mut warnings = Vec::new();
        let mut categories = BTreeSet::new();
        let mut ingredients = Vec::with_capacity(request.ingredients.len());
        let mut estimated_cost = 0.0;
        let mut prep_minutes = 2;

        for name in &request.ingredients {
            let name = name.trim();
            let ingredient = if let Some(entry) = self.catalog.get(name) {
                categories.insert(entry.category);
                prep_minutes += entry.prep_minutes;
                Ingredient {
                    source: entry.supplier.clone(),
                    cost: entry.unit_price(),
                    nutritional_info: entry.nutrition.clone(),
                    ..Ingredient::new(name, entry.default_quantity, entry.unit.clone())
                }
            } else {
                categories.insert(Category::Other);
                prep_minutes += 1;
                warnings.push(format!("No catalogue data for {name}; using generic defaults"));
                Ingredient {
                    source: "unknown".to_string(),
                    cost: GENERIC_COST_PER_ML,
                    ..Ingredient::new(name, GENERIC_QUANTITY_ML, "ml")
                }
            };
            estimated_cost += ingredient.cost * ingredient.quantity;
            ingredients.push(ingredient);
        }

        let names: Vec<String> = ingredients.iter().map(|i| i.name.to_lowercase()).collect();
        let main = request
            .ingredients
            .first()
            .map(|n| title_case(n))
            .unwrap_or_default();
        let name = format!("{} {main} {}", theme_adjective(&request.theme), style(&categories));
        let description = format!(
            "{} for the {} theme, combining {}.",
            style(&categories),
            request.theme.trim(),
            join_names(&names)
        );

        let lower_theme = request.theme.to_lowercase();
        let mut tags: BTreeSet<String> = categories
            .iter()
            .filter(|c| **c != Category::Other)
            .map(|c| c.as_str().to_string())
            .collect();
        tags.insert(lower_theme.replace(' ', "-"));

        let mut target_audience = BTreeSet::new();
        if ["mars", "space", "orbit", "lunar", "station"]
            .iter()
            .any(|needle| lower_theme.contains(needle))
        {
            target_audience.insert("space-explorers".to_string());
        }
        if categories.contains(&Category::Coffee) {
            target_audience.insert("coffee-lovers".to_string());
        }
        if categories.contains(&Category::Tea) {
            target_audience.insert("tea-enthusiasts".to_string());
        }
        if target_audience.is_empty() {
            target_audience.insert("general".to_string());
        }

        let mut seasonal = BTreeSet::new();
        if categories.contains(&Category::Spice) {
            seasonal.extend(["autumn".to_string(), "winter".to_string()]);
        }
        if categories.contains(&Category::Fruit) || categories.contains(&Category::Herb) {
            seasonal.insert("summer".to_string());
        }
        if seasonal.is_empty() {
            seasonal.insert("year-round".to_string());
        }

        let mut beverage = Beverage::draft(name, description, request.theme.trim(), ingredients, self.clock.now());
        beverage.metadata = BeverageMetadata {
            estimated_cost: (estimated_cost * 100.0).round() / 100.0,
            preparation_time: prep_minutes,
            difficulty: difficulty(beverage.ingredients.len(), prep_minutes).to_string(),
            tags,
            target_audience,
            seasonal_availability: seasonal,
        };

        GeneratedRecipe { beverage, warnings }
    }
}

#[async_trait]
impl RecipeGenerator for RuleBasedGenerator {
    async fn generate_recipe(&self, ctx: &CallContext, request: &Request) -> Result<GeneratedRecipe> {
        tracing::debug!(
            operation = %ctx.operation,
            correlation_id = %ctx.correlation_id,
            ingredients = request.ingredients.len(),
            "Generating rule-based recipe"
        );
        Ok(self.generate(request))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code
mod tests {
    use super::*;
    use beverage_inventor_core::environment::SystemClock;
    use beverage_inventor_core::{BeverageStatus, DependencyKind};
    use beverage_inventor_testing::properties::catalogued_ingredient;
    use proptest::prelude::*;

    fn generator() -> RuleBasedGenerator {
        RuleBasedGenerator::new(Arc::new(IngredientCatalog::standard()), Arc::new(SystemClock))
    }

    fn request(ingredients: &[&str], theme: &str) -> Request {
        Request::builder()
            .ingredients(ingredients.iter().copied())
            .theme(theme)
            .created_by("u1")
            .build()
    }

    #[tokio::test]
    async fn test_minimal_request() {
        let ctx = CallContext::new("generator.generate_recipe", DependencyKind::ExternalApi);
        let recipe = generator()
            .generate_recipe(&ctx, &request(&["espresso", "whole milk"], "comfort"))
            .await
            .unwrap();

        let beverage = recipe.beverage;
        assert_eq!(beverage.name, "Comfort Espresso Latte");
        assert_eq!(beverage.ingredients.len(), 2);
        assert_eq!(beverage.status, BeverageStatus::Draft);
        assert!(beverage.validate().is_ok());
        // 2 shots at 0.75 plus 200 ml at 0.004
        assert!((beverage.metadata.estimated_cost - 2.30).abs() < 1e-9);
        assert!(beverage.metadata.tags.contains("coffee"));
        assert!(recipe.warnings.is_empty());
    }

    #[test]
    fn test_unknown_ingredient_gets_defaults() {
        let recipe = generator().generate(&request(&["Martian Mint"], "Mars Base"));

        assert_eq!(recipe.beverage.name, "Martian Martian Mint Elixir");
        assert_eq!(recipe.beverage.ingredients[0].unit, "ml");
        assert!(recipe.beverage.validate().is_ok());
        assert_eq!(recipe.warnings.len(), 1);
        assert!(recipe.beverage.metadata.target_audience.contains("space-explorers"));
    }

    #[test]
    fn test_description_lists_ingredients() {
        let recipe = generator().generate(&request(&["green tea", "mint", "honey"], "Earth Classic"));

        assert_eq!(
            recipe.beverage.description,
            "Infusion for the Earth Classic theme, combining green tea, mint and honey."
        );
        assert_eq!(recipe.beverage.metadata.difficulty, "medium");
        assert!(recipe.beverage.metadata.seasonal_availability.contains("summer"));
    }

    proptest! {
        #[test]
        fn prop_catalogued_ingredients_need_no_defaults(
            names in prop::collection::hash_set(catalogued_ingredient(), 1..6),
            theme in "[A-Za-z][A-Za-z ]{0,20}",
        ) {
            let names: Vec<&str> = names.iter().map(String::as_str).collect();
            let recipe = generator().generate(&request(&names, &theme));

            prop_assert!(recipe.warnings.is_empty(), "{:?}", recipe.warnings);
            prop_assert_eq!(recipe.beverage.ingredients.len(), names.len());
            prop_assert!(recipe.beverage.validate().is_ok());
            prop_assert!(recipe.beverage.ingredients.iter().all(|i| i.source != "unknown"));
            prop_assert!(recipe.beverage.metadata.estimated_cost > 0.0);
        }
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("whole MILK"), "Whole Milk");
        assert_eq!(title_case(""), "");
    }
}
