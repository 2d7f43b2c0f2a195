//! Beverage domain model.
//!
//! A [`Beverage`] is produced by the pipeline, persisted once, and afterwards
//! only changes through status updates. Ingredients are owned by their beverage.

use crate::error::{InventorError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Units accepted at the boundary.
pub const KNOWN_UNITS: [&str; 7] = ["shots", "ml", "g", "tsp", "tbsp", "cup", "oz"];

/// Opaque 128-bit beverage identifier.
///
/// Renders as 36-char lowercase hex with dashes; this is also the Kafka message key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BeverageId(Uuid);

impl BeverageId {
    /// Generate a fresh random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for BeverageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BeverageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for BeverageId {
    type Err = InventorError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| InventorError::invalid_request("beverage_id.parse", e.to_string()))
    }
}

/// Lifecycle status.
///
/// Transitions follow a fixed partial order:
/// `draft -> pending -> {approved, rejected}`, `approved -> testing -> production`.
/// Staying in the same status is always allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BeverageStatus {
    /// Freshly generated
    #[default]
    Draft,
    /// Awaiting review
    Pending,
    /// Accepted for testing
    Approved,
    /// Rejected, final
    Rejected,
    /// Being tested
    Testing,
    /// In production, final
    Production,
}

impl BeverageStatus {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Testing => "testing",
            Self::Production => "production",
        }
    }

    /// Whether `self -> next` respects the lifecycle order.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Draft, Self::Draft | Self::Pending)
                | (Self::Pending, Self::Pending | Self::Approved | Self::Rejected)
                | (Self::Approved, Self::Approved | Self::Testing)
                | (Self::Testing, Self::Testing | Self::Production)
                | (Self::Rejected, Self::Rejected)
                | (Self::Production, Self::Production)
        )
    }
}

impl fmt::Display for BeverageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BeverageStatus {
    type Err = InventorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(Self::Draft),
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "testing" => Ok(Self::Testing),
            "production" => Ok(Self::Production),
            other => Err(InventorError::invalid_request(
                "beverage_status.parse",
                format!("unknown status {other}"),
            )),
        }
    }
}

/// Nutritional values of an ingredient or a whole serving.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NutritionalInfo {
    /// kcal
    pub calories: u32,
    /// grams
    pub protein: f64,
    /// grams
    pub carbs: f64,
    /// grams
    pub fat: f64,
    /// grams
    pub sugar: f64,
    /// milligrams
    pub caffeine: f64,
    /// Allergen names, deduplicated
    #[serde(default)]
    pub allergens: BTreeSet<String>,
}

impl NutritionalInfo {
    /// Add `other` scaled by `factor` into `self`.
    pub fn accumulate(&mut self, other: &Self, factor: f64) {
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let calories = (f64::from(other.calories) * factor).max(0.0).round() as u32;
        self.calories = self.calories.saturating_add(calories);
        self.protein += other.protein * factor;
        self.carbs += other.carbs * factor;
        self.fat += other.fat * factor;
        self.sugar += other.sugar * factor;
        self.caffeine += other.caffeine * factor;
        self.allergens.extend(other.allergens.iter().cloned());
    }
}

/// One ingredient line of a recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    /// Ingredient name
    pub name: String,
    /// Amount, non-negative
    pub quantity: f64,
    /// One of [`KNOWN_UNITS`]
    pub unit: String,
    /// Where it comes from
    #[serde(default)]
    pub source: String,
    /// Cost per unit
    #[serde(default)]
    pub cost: f64,
    /// Nutrition per 100 ml of the ingredient
    #[serde(default)]
    pub nutritional_info: NutritionalInfo,
}

impl Ingredient {
    /// Ingredient with name, quantity and unit; other fields empty.
    #[must_use]
    pub fn new(name: impl Into<String>, quantity: f64, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            quantity,
            unit: unit.into(),
            source: String::new(),
            cost: 0.0,
            nutritional_info: NutritionalInfo::default(),
        }
    }

    /// Check quantity and unit.
    ///
    /// # Errors
    ///
    /// `invalid_request` for negative or non-finite quantities and unknown units.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(InventorError::invalid_request(
                "ingredient.validate",
                "ingredient name is empty",
            ));
        }
        if !self.quantity.is_finite() || self.quantity < 0.0 {
            return Err(InventorError::invalid_request(
                "ingredient.validate",
                format!("ingredient {} has invalid quantity {}", self.name, self.quantity),
            ));
        }
        if !KNOWN_UNITS.contains(&self.unit.as_str()) {
            return Err(InventorError::invalid_request(
                "ingredient.validate",
                format!("ingredient {} has unknown unit {}", self.name, self.unit),
            ));
        }
        Ok(())
    }
}

/// Descriptive metadata.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BeverageMetadata {
    /// Estimated cost per serving
    pub estimated_cost: f64,
    /// Minutes
    pub preparation_time: u32,
    /// e.g. `easy`, `medium`, `hard`
    pub difficulty: String,
    /// Free-form tags
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Target audience labels
    #[serde(default)]
    pub target_audience: BTreeSet<String>,
    /// Seasonal availability labels
    #[serde(default)]
    pub seasonal_availability: BTreeSet<String>,
}

/// The beverage record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Beverage {
    /// Identifier
    pub id: BeverageId,
    /// Display name
    pub name: String,
    /// Description
    pub description: String,
    /// Theme tag
    pub theme: String,
    /// Ordered ingredient lines
    pub ingredients: Vec<Ingredient>,
    /// Creator id
    pub created_by: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Lifecycle status
    pub status: BeverageStatus,
    /// Metadata bundle
    pub metadata: BeverageMetadata,
}

impl Beverage {
    /// Draft beverage with a fresh id.
    #[must_use]
    pub fn draft(
        name: impl Into<String>,
        description: impl Into<String>,
        theme: impl Into<String>,
        ingredients: Vec<Ingredient>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: BeverageId::new(),
            name: name.into(),
            description: description.into(),
            theme: theme.into(),
            ingredients,
            created_by: String::new(),
            created_at,
            status: BeverageStatus::Draft,
            metadata: BeverageMetadata::default(),
        }
    }

    /// Check the persistence invariants.
    ///
    /// # Errors
    ///
    /// `invalid_request` if name or description is empty, there are no
    /// ingredients, or an ingredient is malformed.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(InventorError::invalid_request(
                "beverage.validate",
                "beverage name is empty",
            ));
        }
        if self.description.trim().is_empty() {
            return Err(InventorError::invalid_request(
                "beverage.validate",
                "beverage description is empty",
            ));
        }
        if self.ingredients.is_empty() {
            return Err(InventorError::invalid_request(
                "beverage.validate",
                "beverage has no ingredients",
            ));
        }
        self.ingredients.iter().try_for_each(Ingredient::validate)
    }

    /// Allergens of every ingredient.
    #[must_use]
    pub fn allergens(&self) -> BTreeSet<String> {
        self.ingredients
            .iter()
            .flat_map(|i| i.nutritional_info.allergens.iter().cloned())
            .collect()
    }

    /// Whether an ingredient with this name (case-insensitive) is present.
    #[must_use]
    pub fn has_ingredient(&self, name: &str) -> bool {
        self.ingredients
            .iter()
            .any(|i| i.name.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code
mod tests {
    use super::*;

    fn sample() -> Beverage {
        Beverage::draft(
            "Cosmic Latte",
            "A smooth latte",
            "comfort",
            vec![Ingredient::new("espresso", 2.0, "shots")],
            Utc::now(),
        )
    }

    #[test]
    fn test_id_is_36_char_lowercase() {
        let id = BeverageId::new().to_string();
        assert_eq!(id.len(), 36);
        assert_eq!(id, id.to_lowercase());
        assert_eq!(id.parse::<BeverageId>().unwrap().to_string(), id);
    }

    #[test]
    fn test_status_transitions() {
        use BeverageStatus::*;
        assert!(Draft.can_transition_to(Pending));
        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Rejected));
        assert!(Approved.can_transition_to(Testing));
        assert!(Testing.can_transition_to(Production));
        assert!(Production.can_transition_to(Production));

        assert!(!Pending.can_transition_to(Draft));
        assert!(!Rejected.can_transition_to(Approved));
        assert!(!Draft.can_transition_to(Production));
        assert!(!Production.can_transition_to(Testing));
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("Approved".parse::<BeverageStatus>().unwrap(), BeverageStatus::Approved);
        assert!("shipped".parse::<BeverageStatus>().is_err());
    }

    #[test]
    fn test_validate_accepts_well_formed() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_ingredients() {
        let mut beverage = sample();
        beverage.ingredients.clear();
        assert!(beverage.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_unit() {
        let mut beverage = sample();
        beverage.ingredients.push(Ingredient::new("honey", 1.0, "spoonful"));
        let err = beverage.validate().unwrap_err();
        assert!(err.message.contains("unknown unit"));
    }

    #[test]
    fn test_validate_rejects_negative_quantity() {
        let mut beverage = sample();
        beverage.ingredients[0].quantity = -1.0;
        assert!(beverage.validate().is_err());
    }

    #[test]
    fn test_allergens_are_deduplicated() {
        let mut nut = NutritionalInfo::default();
        nut.allergens.insert("dairy".into());
        let mut info = NutritionalInfo::default();
        info.accumulate(&nut, 1.0);
        info.accumulate(&nut, 2.0);
        assert_eq!(info.allergens.len(), 1);
    }
}
