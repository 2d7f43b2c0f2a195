//! Invention requests.
//!
//! Requests arrive as JSON (HTTP body or Kafka payload) and are deserialized
//! into a [`RequestBuilder`]. [`RequestBuilder::build`] resolves every default
//! so the pipeline always sees a fully-populated [`Request`].

use crate::error::{InventorError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Default serving size in millilitres.
pub const DEFAULT_SERVING_SIZE_ML: f64 = 350.0;

/// Default batch size in servings.
pub const DEFAULT_BATCH_SIZE: u32 = 1;

/// Tolerance on the objective weight sum.
pub const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

/// Depth of the enhanced analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisLevel {
    /// Totals only
    Basic,
    /// Totals plus dietary and health detail
    #[default]
    Detailed,
    /// Everything, including personalised recommendations
    Comprehensive,
}

impl AnalysisLevel {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Detailed => "detailed",
            Self::Comprehensive => "comprehensive",
        }
    }

    /// Parse a boundary value. Unknown values map to `detailed` and yield a warning.
    #[must_use]
    pub fn parse_lenient(value: &str) -> (Self, Option<String>) {
        match value.trim().to_ascii_lowercase().as_str() {
            "basic" => (Self::Basic, None),
            "detailed" => (Self::Detailed, None),
            "comprehensive" => (Self::Comprehensive, None),
            _ => (
                Self::Detailed,
                Some(format!(
                    "unknown analysis level {value:?}, using detailed"
                )),
            ),
        }
    }
}

impl fmt::Display for AnalysisLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hard limits the generated beverage should respect.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Constraints {
    /// Maximum cost per serving
    pub max_cost: Option<f64>,
    /// Maximum calories per serving
    pub max_calories: Option<u32>,
    /// Maximum preparation minutes
    pub max_prep_time: Option<u32>,
    /// Tags the beverage must carry
    pub required_tags: Vec<String>,
    /// Tags the beverage must not carry
    pub forbidden_tags: Vec<String>,
    /// Allergens to avoid
    pub allergen_free: Vec<String>,
}

/// Axis to favour when optimizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Prioritize {
    /// Favour taste
    Taste,
    /// Favour low cost
    Cost,
    /// Favour nutrition
    Nutrition,
}

/// Objective weights. Must sum to 1.0 within [`WEIGHT_SUM_TOLERANCE`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveWeights {
    /// Taste weight
    pub taste: f64,
    /// Cost weight
    pub cost: f64,
    /// Nutrition weight
    pub nutrition: f64,
    /// Compatibility weight
    pub compatibility: f64,
}

impl ObjectiveWeights {
    /// 0.4 / 0.3 / 0.2 / 0.1
    pub const DEFAULT: Self = Self {
        taste: 0.4,
        cost: 0.3,
        nutrition: 0.2,
        compatibility: 0.1,
    };

    /// 0.6 on the prioritised axis, 0.2 on the other two, nothing on compatibility.
    #[must_use]
    pub const fn prioritized(axis: Prioritize) -> Self {
        match axis {
            Prioritize::Taste => Self {
                taste: 0.6,
                cost: 0.2,
                nutrition: 0.2,
                compatibility: 0.0,
            },
            Prioritize::Cost => Self {
                taste: 0.2,
                cost: 0.6,
                nutrition: 0.2,
                compatibility: 0.0,
            },
            Prioritize::Nutrition => Self {
                taste: 0.2,
                cost: 0.2,
                nutrition: 0.6,
                compatibility: 0.0,
            },
        }
    }

    /// Sum of the four weights.
    #[must_use]
    pub fn sum(&self) -> f64 {
        self.taste + self.cost + self.nutrition + self.compatibility
    }

    /// Check the sum and sign of the weights.
    ///
    /// # Errors
    ///
    /// `invalid_objectives` when a weight is negative or the sum is off by more than 0.01.
    pub fn validate(&self) -> Result<()> {
        let weights = [self.taste, self.cost, self.nutrition, self.compatibility];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(InventorError::invalid_objectives(
                "optimizer.validate",
                "objective weights must be non-negative",
            ));
        }
        let sum = self.sum();
        // Round to 1e-9 so 1.01 computed in floating point is still accepted.
        let deviation = ((sum - 1.0).abs() * 1e9).round() / 1e9;
        if deviation > WEIGHT_SUM_TOLERANCE {
            return Err(InventorError::invalid_objectives(
                "optimizer.validate",
                format!("objective weights must sum to 1.0, got {sum:.2}"),
            ));
        }
        Ok(())
    }
}

impl Default for ObjectiveWeights {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// What to optimize for.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizationGoals {
    /// Explicit weights; defaults apply when absent
    pub weights: Option<ObjectiveWeights>,
    /// Axis that rewrites the weights
    pub prioritize: Option<Prioritize>,
    /// Target profit margin in percent
    pub target_margin: Option<f64>,
    /// Maximum acceptable cost per serving
    pub max_cost_per_serving: Option<f64>,
    /// Calorie ceiling
    pub max_calories: Option<f64>,
    /// Protein floor (g)
    pub min_protein: Option<f64>,
    /// Sugar ceiling (g)
    pub max_sugar: Option<f64>,
    /// Ingredients the optimizer must keep
    pub required_ingredients: Vec<String>,
    /// Ingredients the optimizer must not introduce
    pub forbidden_ingredients: Vec<String>,
}

impl OptimizationGoals {
    /// Weights after applying the prioritize flag and defaults.
    #[must_use]
    pub fn resolved_weights(&self) -> ObjectiveWeights {
        match (self.prioritize, self.weights) {
            (Some(axis), _) => ObjectiveWeights::prioritized(axis),
            (None, Some(weights)) => weights,
            (None, None) => ObjectiveWeights::DEFAULT,
        }
    }
}

/// Consumer dietary profile for personalised analysis.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DietaryProfile {
    /// e.g. `vegan`, `keto`
    pub restrictions: Vec<String>,
    /// Allergies
    pub allergies: Vec<String>,
    /// Calorie ceiling
    pub max_calories: Option<u32>,
    /// Sugar ceiling (g)
    pub max_sugar: Option<f64>,
    /// Caffeine ceiling (mg)
    pub max_caffeine: Option<f64>,
    /// Health goals, free-form
    pub goals: Vec<String>,
}

/// Market the beverage is aimed at.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketContext {
    /// Region name
    pub region: String,
    /// Desired shelf price
    pub target_price: Option<f64>,
    /// Season label
    pub season: Option<String>,
    /// Competitor names
    pub competitors: Vec<String>,
}

/// A fully-resolved invention request.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Ingredient names to build the recipe from
    pub ingredients: Vec<String>,
    /// Theme tag
    pub theme: String,
    /// Try the AI generator first
    pub use_ai: bool,
    /// Creator id
    pub created_by: String,
    /// Limits to check
    pub constraints: Option<Constraints>,
    /// Millilitres
    pub serving_size: f64,
    /// Servings
    pub batch_size: u32,
    /// Optimization goals
    pub optimization_goals: Option<OptimizationGoals>,
    /// Dietary profile
    pub dietary_profile: Option<DietaryProfile>,
    /// Market context
    pub market_context: Option<MarketContext>,
    /// Analysis depth
    pub analysis_level: AnalysisLevel,
    /// Correlation id carried through logs and collaborator calls
    pub correlation_id: String,
    /// Warnings raised while resolving the request
    pub notes: Vec<String>,
}

impl Request {
    /// Start a builder.
    #[must_use]
    pub fn builder() -> RequestBuilder {
        RequestBuilder::default()
    }

    /// Check the mandatory fields.
    ///
    /// # Errors
    ///
    /// `invalid_request` for an empty ingredient list (or blank ingredient
    /// name), an empty theme, or an empty creator.
    pub fn validate(&self) -> Result<()> {
        if self.ingredients.is_empty() {
            return Err(InventorError::invalid_request(
                "pipeline.validate",
                "ingredient list is empty",
            ));
        }
        if self.ingredients.iter().any(|i| i.trim().is_empty()) {
            return Err(InventorError::invalid_request(
                "pipeline.validate",
                "ingredient name is empty",
            ));
        }
        if self.theme.trim().is_empty() {
            return Err(InventorError::invalid_request(
                "pipeline.validate",
                "theme is empty",
            ));
        }
        if self.created_by.trim().is_empty() {
            return Err(InventorError::invalid_request(
                "pipeline.validate",
                "creator is empty",
            ));
        }
        Ok(())
    }

    /// Replace out-of-range sizes with the defaults.
    pub fn apply_defaults(&mut self) {
        if !self.serving_size.is_finite() || self.serving_size <= 0.0 {
            self.serving_size = DEFAULT_SERVING_SIZE_ML;
        }
        if self.batch_size == 0 {
            self.batch_size = DEFAULT_BATCH_SIZE;
        }
    }
}

/// Builder for [`Request`]; also the wire shape of an inbound request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RequestBuilder {
    ingredients: Vec<String>,
    theme: String,
    use_ai: bool,
    #[serde(alias = "requested_by")]
    created_by: String,
    constraints: Option<Constraints>,
    serving_size: Option<f64>,
    batch_size: Option<u32>,
    optimization_goals: Option<OptimizationGoals>,
    dietary_profile: Option<DietaryProfile>,
    market_context: Option<MarketContext>,
    analysis_level: Option<String>,
    #[serde(alias = "request_id")]
    correlation_id: Option<String>,
}

impl RequestBuilder {
    /// Append one ingredient name.
    #[must_use]
    pub fn ingredient(mut self, name: impl Into<String>) -> Self {
        self.ingredients.push(name.into());
        self
    }

    /// Replace the ingredient names.
    #[must_use]
    pub fn ingredients<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ingredients = names.into_iter().map(Into::into).collect();
        self
    }

    /// Set the theme.
    #[must_use]
    pub fn theme(mut self, theme: impl Into<String>) -> Self {
        self.theme = theme.into();
        self
    }

    /// Set the use-AI flag.
    #[must_use]
    pub const fn use_ai(mut self, use_ai: bool) -> Self {
        self.use_ai = use_ai;
        self
    }

    /// Set the creator.
    #[must_use]
    pub fn created_by(mut self, creator: impl Into<String>) -> Self {
        self.created_by = creator.into();
        self
    }

    /// Set the constraints.
    #[must_use]
    pub fn constraints(mut self, constraints: Constraints) -> Self {
        self.constraints = Some(constraints);
        self
    }

    /// Set the serving size (ml).
    #[must_use]
    pub const fn serving_size(mut self, ml: f64) -> Self {
        self.serving_size = Some(ml);
        self
    }

    /// Set the batch size.
    #[must_use]
    pub const fn batch_size(mut self, servings: u32) -> Self {
        self.batch_size = Some(servings);
        self
    }

    /// Set the optimization goals.
    #[must_use]
    pub fn optimization_goals(mut self, goals: OptimizationGoals) -> Self {
        self.optimization_goals = Some(goals);
        self
    }

    /// Set the dietary profile.
    #[must_use]
    pub fn dietary_profile(mut self, profile: DietaryProfile) -> Self {
        self.dietary_profile = Some(profile);
        self
    }

    /// Set the market context.
    #[must_use]
    pub fn market_context(mut self, market: MarketContext) -> Self {
        self.market_context = Some(market);
        self
    }

    /// Set the analysis level.
    #[must_use]
    pub fn analysis_level(mut self, level: AnalysisLevel) -> Self {
        self.analysis_level = Some(level.as_str().to_string());
        self
    }

    /// Set the analysis level from a boundary string.
    #[must_use]
    pub fn analysis_level_name(mut self, level: impl Into<String>) -> Self {
        self.analysis_level = Some(level.into());
        self
    }

    /// Set the correlation id.
    #[must_use]
    pub fn correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Resolve defaults and produce the request.
    #[must_use]
    pub fn build(self) -> Request {
        let mut notes = Vec::new();
        let analysis_level = match self.analysis_level.as_deref() {
            None => AnalysisLevel::default(),
            Some(raw) => {
                let (level, warning) = AnalysisLevel::parse_lenient(raw);
                notes.extend(warning);
                level
            }
        };

        let mut request = Request {
            ingredients: self.ingredients,
            theme: self.theme,
            use_ai: self.use_ai,
            created_by: self.created_by,
            constraints: self.constraints,
            serving_size: self.serving_size.unwrap_or(DEFAULT_SERVING_SIZE_ML),
            batch_size: self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE),
            optimization_goals: self.optimization_goals,
            dietary_profile: self.dietary_profile,
            market_context: self.market_context,
            analysis_level,
            correlation_id: self
                .correlation_id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            notes,
        };
        request.apply_defaults();
        request
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn minimal() -> RequestBuilder {
        Request::builder()
            .ingredients(["espresso", "whole milk"])
            .theme("comfort")
            .created_by("u1")
    }

    #[test]
    fn test_builder_resolves_defaults() {
        let request = minimal().build();
        assert!((request.serving_size - 350.0).abs() < f64::EPSILON);
        assert_eq!(request.batch_size, 1);
        assert_eq!(request.analysis_level, AnalysisLevel::Detailed);
        assert!(!request.correlation_id.is_empty());
        assert!(request.notes.is_empty());
    }

    #[test]
    fn test_validate_rejects_empty_fields() {
        assert!(minimal().ingredients(Vec::<String>::new()).build().validate().is_err());
        assert!(minimal().theme("").build().validate().is_err());
        assert!(minimal().created_by(" ").build().validate().is_err());
        assert!(minimal().build().validate().is_ok());
    }

    #[test]
    fn test_unknown_analysis_level_maps_to_detailed_with_note() {
        let request = minimal().analysis_level_name("extreme").build();
        assert_eq!(request.analysis_level, AnalysisLevel::Detailed);
        assert_eq!(request.notes.len(), 1);
    }

    #[test]
    fn test_deserialize_accepts_requested_by() {
        let json = r#"{"ingredients":["espresso"],"theme":"comfort","requested_by":"u7","use_ai":true}"#;
        let request = serde_json::from_str::<RequestBuilder>(json).unwrap().build();
        assert_eq!(request.created_by, "u7");
        assert!(request.use_ai);
    }

    #[test]
    fn test_zero_sizes_fall_back_to_defaults() {
        let request = minimal().serving_size(0.0).batch_size(0).build();
        assert!((request.serving_size - DEFAULT_SERVING_SIZE_ML).abs() < f64::EPSILON);
        assert_eq!(request.batch_size, DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn test_weight_sum_boundaries() {
        let ok = ObjectiveWeights { taste: 0.41, cost: 0.3, nutrition: 0.2, compatibility: 0.1 };
        assert!(ok.validate().is_ok());
        let bad = ObjectiveWeights { taste: 0.42, cost: 0.3, nutrition: 0.2, compatibility: 0.1 };
        assert_eq!(
            bad.validate().unwrap_err().kind,
            crate::error::ErrorKind::InvalidObjectives
        );
    }

    #[test]
    fn test_prioritize_rewrites_weights() {
        let goals = OptimizationGoals {
            prioritize: Some(Prioritize::Cost),
            weights: Some(ObjectiveWeights::DEFAULT),
            ..OptimizationGoals::default()
        };
        let weights = goals.resolved_weights();
        assert!((weights.cost - 0.6).abs() < f64::EPSILON);
        assert!(weights.validate().is_ok());
    }

    proptest! {
        #[test]
        fn prop_weights_within_tolerance_validate(
            taste in 0.0f64..0.5,
            cost in 0.0f64..0.3,
            nutrition in 0.0f64..0.2,
            drift in -0.009f64..0.009,
        ) {
            let compatibility = 1.0 - taste - cost - nutrition + drift;
            prop_assume!(compatibility >= 0.0);
            let weights = ObjectiveWeights { taste, cost, nutrition, compatibility };
            prop_assert!(weights.validate().is_ok());
        }

        #[test]
        fn prop_weights_outside_tolerance_rejected(drift in 0.011f64..0.5) {
            let weights = ObjectiveWeights {
                compatibility: 0.1 + drift,
                ..ObjectiveWeights::DEFAULT
            };
            prop_assert!(weights.validate().is_err());
        }
    }
}
