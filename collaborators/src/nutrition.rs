//! Catalogue-backed nutrition analysis.

use crate::catalog::{to_millilitres, IngredientCatalog};
use async_trait::async_trait;
use beverage_inventor_core::analysis::{DietaryCompatibility, NutritionAnalysis};
use beverage_inventor_core::ports::NutritionAnalyzer;
use beverage_inventor_core::request::DietaryProfile;
use beverage_inventor_core::{AnalysisLevel, Beverage, CallContext, InventorError, NutritionalInfo, Result};
use std::sync::Arc;

/// Serving used for the low-sugar flag, in ml.
const STANDARD_SERVING_ML: f64 = 250.0;

/// Sugar above this many grams per standard serving is not low-sugar.
const LOW_SUGAR_GRAMS: f64 = 10.0;

const ANIMAL_PRODUCTS: &[&str] = &["milk", "cream", "butter", "cheese", "yogurt", "honey", "egg", "whey"];
const PLANT_MILKS: &[&str] = &["almond milk", "oat milk", "soy milk", "coconut milk", "rice milk"];
const DAIRY: &[&str] = &["milk", "cream", "butter", "cheese", "yogurt", "whey", "casein", "lactose"];
const NUTS: &[&str] = &["almond", "peanut", "walnut", "cashew", "pecan", "hazelnut", "pistachio", "macadamia"];
const CAFFEINATED: &[&str] = &["coffee", "espresso", "tea", "cocoa", "matcha", "cola"];

fn contains_any(name: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| name.contains(n))
}

fn is_plant_milk(name: &str) -> bool {
    contains_any(name, PLANT_MILKS)
}

/// Per-serving nutrition from the catalogue's per-100 ml values.
///
/// Each ingredient contributes in proportion to its share of the recipe's
/// volume, so the totals describe `serving_size` ml of the finished drink.
#[derive(Debug, Clone)]
pub struct CatalogNutritionAnalyzer {
    catalog: Arc<IngredientCatalog>,
}

impl CatalogNutritionAnalyzer {
    /// Analyzer over `catalog`.
    #[must_use]
    pub const fn new(catalog: Arc<IngredientCatalog>) -> Self {
        Self { catalog }
    }

    /// Totals for one serving plus the names of ingredients without data.
    #[must_use]
    pub fn serving_nutrition(&self, beverage: &Beverage, serving_size: f64) -> (NutritionalInfo, Vec<String>) {
        let volumes: Vec<f64> = beverage
            .ingredients
            .iter()
            .map(|i| to_millilitres(i.quantity, &i.unit))
            .collect();
        let total_volume: f64 = volumes.iter().sum();

        let mut totals = NutritionalInfo::default();
        let mut missing = Vec::new();
        if total_volume <= 0.0 {
            return (totals, missing);
        }

        for (ingredient, volume) in beverage.ingredients.iter().zip(volumes) {
            let per_100ml = match self.catalog.get(&ingredient.name) {
                Some(entry) => &entry.nutrition,
                None if ingredient.nutritional_info != NutritionalInfo::default() => &ingredient.nutritional_info,
                None => {
                    missing.push(ingredient.name.clone());
                    continue;
                }
            };
            let factor = serving_size / 100.0 * (volume / total_volume);
            totals.accumulate(per_100ml, factor);
        }
        (totals, missing)
    }

    fn dietary(&self, beverage: &Beverage) -> DietaryCompatibility {
        let mut flags = DietaryCompatibility {
            vegan: true,
            dairy_free: true,
            nut_free: true,
            low_sugar: true,
            caffeine_free: true,
        };
        for ingredient in &beverage.ingredients {
            let name = ingredient.name.to_lowercase();
            let plant_milk = is_plant_milk(&name);
            if contains_any(&name, ANIMAL_PRODUCTS) && !plant_milk {
                flags.vegan = false;
            }
            if contains_any(&name, DAIRY) && !plant_milk {
                flags.dairy_free = false;
            }
            if contains_any(&name, NUTS) {
                flags.nut_free = false;
            }
            if contains_any(&name, CAFFEINATED) {
                flags.caffeine_free = false;
            }
        }
        let (standard, _) = self.serving_nutrition(beverage, STANDARD_SERVING_ML);
        flags.low_sugar = standard.sugar <= LOW_SUGAR_GRAMS;
        if standard.caffeine > 0.0 {
            flags.caffeine_free = false;
        }
        flags
    }

    fn inflammation_score(beverage: &Beverage) -> f64 {
        let score: f64 = beverage
            .ingredients
            .iter()
            .map(|i| {
                let name = i.name.to_lowercase();
                let mut s = 0.0;
                if name.contains("turmeric") {
                    s -= 2.0;
                }
                if name.contains("ginger") {
                    s -= 1.5;
                }
                if name.contains("green tea") || name.contains("cinnamon") {
                    s -= 1.0;
                }
                if name.contains("sugar") || name.contains("syrup") {
                    s += 1.0;
                }
                if name.contains("artificial") {
                    s += 0.5;
                }
                s
            })
            .sum();
        score.clamp(-10.0, 10.0)
    }

    fn health_score(nutrition: &NutritionalInfo, level: AnalysisLevel, inflammation: f64) -> f64 {
        let mut score: f64 = 50.0;
        if nutrition.protein > 5.0 {
            score += 10.0;
        }
        if nutrition.sugar > 20.0 {
            score -= 15.0;
        }
        if nutrition.calories > 300 {
            score -= 10.0;
        }
        if level != AnalysisLevel::Basic {
            if inflammation < 0.0 {
                score += 5.0;
            }
            if nutrition.sugar <= LOW_SUGAR_GRAMS {
                score += 5.0;
            }
        }
        (score.clamp(0.0, 100.0) * 10.0).round() / 10.0
    }

    fn personalised(
        nutrition: &NutritionalInfo,
        dietary: Option<&DietaryCompatibility>,
        profile: &DietaryProfile,
    ) -> Vec<String> {
        let mut recommendations = Vec::new();
        for allergen in &nutrition.allergens {
            if profile.allergies.iter().any(|a| a.eq_ignore_ascii_case(allergen)) {
                recommendations.push(format!("Contains {allergen} - avoid if allergic"));
            }
        }
        if let Some(max) = profile.max_calories {
            if nutrition.calories > max {
                recommendations.push(format!(
                    "High in calories ({} cal) - consider reducing serving size",
                    nutrition.calories
                ));
            }
        }
        if profile.max_sugar.is_some_and(|max| nutrition.sugar > max) {
            recommendations.push(format!(
                "High in sugar ({:.1}g) - consider sugar-free alternatives",
                nutrition.sugar
            ));
        }
        if profile.max_caffeine.is_some_and(|max| nutrition.caffeine > max) {
            recommendations.push(format!(
                "High in caffeine ({:.0}mg) - consider decaf options",
                nutrition.caffeine
            ));
        }
        if let Some(flags) = dietary {
            for restriction in &profile.restrictions {
                let unsuitable = match restriction.to_lowercase().as_str() {
                    "vegan" => !flags.vegan,
                    "dairy-free" | "dairy_free" | "lactose-free" => !flags.dairy_free,
                    "nut-free" | "nut_free" => !flags.nut_free,
                    "low-sugar" | "low_sugar" => !flags.low_sugar,
                    "caffeine-free" | "caffeine_free" => !flags.caffeine_free,
                    _ => false,
                };
                if unsuitable {
                    recommendations.push(format!("Not suitable for a {restriction} diet"));
                }
            }
        }
        recommendations
    }

    /// Synchronous analysis, shared with the optimizer.
    ///
    /// # Errors
    ///
    /// `invalid_request` for a non-positive serving size.
    pub fn analyze(
        &self,
        beverage: &Beverage,
        serving_size: f64,
        level: AnalysisLevel,
        profile: Option<&DietaryProfile>,
    ) -> Result<NutritionAnalysis> {
        if !serving_size.is_finite() || serving_size <= 0.0 {
            return Err(InventorError::invalid_request(
                "nutrition.analyze",
                format!("serving size must be positive, got {serving_size}"),
            ));
        }

        let (nutrition, missing) = self.serving_nutrition(beverage, serving_size);
        let warnings: Vec<String> = missing
            .iter()
            .map(|name| format!("No nutrition data for {name}"))
            .collect();

        let dietary = (level != AnalysisLevel::Basic).then(|| self.dietary(beverage));
        let inflammation = Self::inflammation_score(beverage);
        let health_score = Self::health_score(&nutrition, level, inflammation);

        let mut recommendations = Vec::new();
        if level == AnalysisLevel::Comprehensive {
            if nutrition.sugar > 20.0 {
                recommendations.push("Consider reducing added sweeteners".to_string());
            }
            if inflammation < 0.0 {
                recommendations.push("Anti-inflammatory ingredients present - worth highlighting".to_string());
            }
        }
        if let Some(profile) = profile {
            recommendations.extend(Self::personalised(&nutrition, dietary.as_ref(), profile));
        }

        #[allow(clippy::cast_precision_loss)]
        let mut confidence = 0.8 - warnings.len() as f64 * 0.1;
        if dietary.is_some() {
            confidence += 0.1;
        }
        if level == AnalysisLevel::Comprehensive {
            confidence += 0.1;
        }

        Ok(NutritionAnalysis {
            nutrition,
            health_score,
            dietary,
            recommendations,
            warnings,
            confidence: (confidence.clamp(0.0, 1.0) * 100.0).round() / 100.0,
        })
    }
}

#[async_trait]
impl NutritionAnalyzer for CatalogNutritionAnalyzer {
    async fn analyze_nutrition(
        &self,
        ctx: &CallContext,
        beverage: &Beverage,
        serving_size: f64,
        level: AnalysisLevel,
        profile: Option<&DietaryProfile>,
    ) -> Result<NutritionAnalysis> {
        tracing::debug!(operation = %ctx.operation, beverage_id = %beverage.id, %level, "Analyzing nutrition");
        self.analyze(beverage, serving_size, level, profile)
    }
}
