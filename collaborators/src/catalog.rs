//! Ingredient catalogue.
//!
//! Prices, per-100 ml nutrition, flavour pairing rules and substitutions for
//! the ingredients the rule-based collaborators know about. Lookups are
//! case-insensitive; names are stored lowercase.

use beverage_inventor_core::NutritionalInfo;
use std::collections::HashMap;

/// Millilitres per unit, for every unit accepted at the boundary.
#[must_use]
pub fn millilitres_per_unit(unit: &str) -> f64 {
    match unit {
        "shots" => 30.0,
        "tsp" => 5.0,
        "tbsp" => 15.0,
        "cup" => 240.0,
        "oz" => 29.57,
        // ml, and grams treated as ml of water
        _ => 1.0,
    }
}

/// Volume of `quantity` `unit` in millilitres.
#[must_use]
pub fn to_millilitres(quantity: f64, unit: &str) -> f64 {
    quantity * millilitres_per_unit(unit)
}

/// Convert between two units via their millilitre equivalents.
#[must_use]
pub fn convert(quantity: f64, from: &str, to: &str) -> f64 {
    if from == to {
        return quantity;
    }
    to_millilitres(quantity, from) / millilitres_per_unit(to)
}

/// Broad ingredient family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    /// Coffee and espresso
    Coffee,
    /// Teas
    Tea,
    /// Dairy milk and cream
    Dairy,
    /// Plant-based milk
    PlantMilk,
    /// Sugars and syrups
    Sweetener,
    /// Ground spices
    Spice,
    /// Extracts and powders
    Flavoring,
    /// Juices and fruit
    Fruit,
    /// Fresh herbs
    Herb,
    /// Not catalogued
    Other,
}

impl Category {
    /// Lowercase label, used as a metadata tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Coffee => "coffee",
            Self::Tea => "tea",
            Self::Dairy => "dairy",
            Self::PlantMilk => "plant-milk",
            Self::Sweetener => "sweetener",
            Self::Spice => "spice",
            Self::Flavoring => "flavoring",
            Self::Fruit => "fruit",
            Self::Herb => "herb",
            Self::Other => "other",
        }
    }
}

/// Quantity bracket with a percentage discount.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BulkDiscount {
    /// Inclusive lower bound, in the entry's unit
    pub min_quantity: f64,
    /// Inclusive upper bound, in the entry's unit
    pub max_quantity: f64,
    /// Percent off
    pub percent: f64,
}

impl BulkDiscount {
    /// Whether `quantity` falls in the bracket.
    #[must_use]
    pub fn applies_to(&self, quantity: f64) -> bool {
        quantity >= self.min_quantity && quantity <= self.max_quantity
    }
}

/// One catalogued ingredient.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    /// Lowercase name
    pub name: String,
    /// Family
    pub category: Category,
    /// Quantity used when a recipe does not say
    pub default_quantity: f64,
    /// Unit of `default_quantity` and of the price
    pub unit: String,
    /// Price of one pack
    pub pack_price: f64,
    /// Pack size in `unit`
    pub pack_size: f64,
    /// Supplier
    pub supplier: String,
    /// Brackets, checked in order
    pub discounts: Vec<BulkDiscount>,
    /// Nutrition per 100 ml
    pub nutrition: NutritionalInfo,
    /// Minutes of preparation the ingredient adds
    pub prep_minutes: u32,
}

impl CatalogEntry {
    /// Price of one `unit`.
    #[must_use]
    pub fn unit_price(&self) -> f64 {
        if self.pack_size > 0.0 {
            self.pack_price / self.pack_size
        } else {
            self.pack_price
        }
    }

    /// First discount bracket containing `quantity`.
    ///
    /// Brackets are checked in catalogue order and overlapping brackets are
    /// not combined.
    #[must_use]
    pub fn discount_for(&self, quantity: f64) -> Option<&BulkDiscount> {
        self.discounts.iter().find(|d| d.applies_to(quantity))
    }
}

/// Whether a pairing helps or hurts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    /// Complementary
    Positive,
    /// Clashing
    Negative,
}

/// Pairwise flavour rule.
#[derive(Debug, Clone, PartialEq)]
pub struct CompatibilityRule {
    /// First ingredient, lowercase
    pub first: String,
    /// Second ingredient, lowercase
    pub second: String,
    /// Direction
    pub kind: RuleKind,
    /// 0-1
    pub confidence: f64,
    /// Explanation
    pub reason: String,
}

impl CompatibilityRule {
    fn matches(&self, a: &str, b: &str) -> bool {
        (self.first == a && self.second == b) || (self.first == b && self.second == a)
    }
}

/// A replacement ingredient.
#[derive(Debug, Clone, PartialEq)]
pub struct Substitution {
    /// Replacement name, lowercase
    pub substitute: String,
    /// Quantity multiplier
    pub ratio: f64,
    /// 0-1
    pub confidence: f64,
}

/// The catalogue.
#[derive(Debug, Clone, Default)]
pub struct IngredientCatalog {
    entries: HashMap<String, CatalogEntry>,
    rules: Vec<CompatibilityRule>,
    substitutions: HashMap<String, Vec<Substitution>>,
}

fn key(name: &str) -> String {
    name.trim().to_lowercase()
}

#[allow(clippy::too_many_arguments)]
fn entry(
    name: &str,
    category: Category,
    default_quantity: f64,
    unit: &str,
    (pack_price, pack_size): (f64, f64),
    supplier: &str,
    prep_minutes: u32,
    (calories, protein, carbs, fat, sugar, caffeine): (u32, f64, f64, f64, f64, f64),
    allergens: &[&str],
) -> CatalogEntry {
    CatalogEntry {
        name: name.to_string(),
        category,
        default_quantity,
        unit: unit.to_string(),
        pack_price,
        pack_size,
        supplier: supplier.to_string(),
        discounts: Vec::new(),
        nutrition: NutritionalInfo {
            calories,
            protein,
            carbs,
            fat,
            sugar,
            caffeine,
            allergens: allergens.iter().map(|a| (*a).to_string()).collect(),
        },
        prep_minutes,
    }
}

fn bracket(min_quantity: f64, max_quantity: f64, percent: f64) -> BulkDiscount {
    BulkDiscount {
        min_quantity,
        max_quantity,
        percent,
    }
}

impl IngredientCatalog {
    /// Empty catalogue.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in catalogue of common beverage ingredients.
    #[must_use]
    pub fn standard() -> Self {
        use Category::{Coffee, Dairy, Flavoring, Fruit, Herb, PlantMilk, Spice, Sweetener, Tea};

        let mut espresso = entry("espresso", Coffee, 2.0, "shots", (0.75, 1.0), "Roastery Direct", 2, (9, 0.1, 1.7, 0.2, 0.0, 212.0), &[]);
        espresso.discounts = vec![bracket(50.0, 200.0, 5.0), bracket(200.0, f64::MAX, 10.0)];
        let mut whole_milk = entry("whole milk", Dairy, 200.0, "ml", (1.00, 250.0), "Valley Dairy", 1, (61, 3.2, 4.8, 3.3, 5.1, 0.0), &["dairy"]);
        whole_milk.discounts = vec![bracket(1_000.0, 5_000.0, 5.0), bracket(5_000.0, f64::MAX, 12.0)];

        let entries = [
            espresso,
            whole_milk,
            entry("coffee", Coffee, 240.0, "ml", (0.50, 240.0), "Roastery Direct", 4, (1, 0.1, 0.0, 0.0, 0.0, 40.0), &[]),
            entry("almond milk", PlantMilk, 200.0, "ml", (1.50, 250.0), "Green Pantry", 1, (17, 0.6, 0.6, 1.1, 0.0, 0.0), &["tree nuts"]),
            entry("oat milk", PlantMilk, 200.0, "ml", (1.25, 250.0), "Green Pantry", 1, (46, 1.0, 6.6, 1.5, 4.0, 0.0), &["gluten"]),
            entry("sugar", Sweetener, 2.0, "tsp", (0.02, 1.0), "Sweet Supply Co", 0, (387, 0.0, 100.0, 0.0, 100.0, 0.0), &[]),
            entry("honey", Sweetener, 1.0, "tbsp", (0.25, 1.0), "Sweet Supply Co", 0, (304, 0.3, 82.0, 0.0, 82.0, 0.0), &[]),
            entry("stevia", Sweetener, 0.5, "tsp", (0.05, 1.0), "Sweet Supply Co", 0, (0, 0.0, 0.0, 0.0, 0.0, 0.0), &[]),
            entry("caramel syrup", Sweetener, 1.0, "tbsp", (0.30, 1.0), "Sweet Supply Co", 0, (300, 0.0, 75.0, 0.0, 70.0, 0.0), &["dairy"]),
            entry("vanilla", Flavoring, 1.0, "tsp", (0.40, 1.0), "Spice Route", 0, (288, 0.1, 12.7, 0.1, 12.7, 0.0), &[]),
            entry("cocoa", Flavoring, 1.0, "tbsp", (0.20, 1.0), "Spice Route", 1, (228, 19.6, 58.0, 13.7, 1.8, 230.0), &[]),
            entry("cinnamon", Spice, 0.5, "tsp", (0.10, 1.0), "Spice Route", 0, (247, 4.0, 81.0, 1.2, 2.2, 0.0), &[]),
            entry("ginger", Spice, 1.0, "tsp", (0.12, 1.0), "Spice Route", 1, (80, 1.8, 18.0, 0.8, 1.7, 0.0), &[]),
            entry("turmeric", Spice, 0.5, "tsp", (0.15, 1.0), "Spice Route", 0, (312, 9.7, 67.0, 3.3, 3.2, 0.0), &[]),
            entry("green tea", Tea, 240.0, "ml", (0.40, 240.0), "Leaf & Kettle", 3, (1, 0.2, 0.0, 0.0, 0.0, 12.0), &[]),
            entry("mint", Herb, 1.0, "tbsp", (0.20, 1.0), "Leaf & Kettle", 1, (70, 3.8, 15.0, 0.9, 0.0, 0.0), &[]),
            entry("lemon juice", Fruit, 1.0, "tbsp", (0.15, 1.0), "Orchard Fresh", 1, (22, 0.4, 6.9, 0.2, 2.5, 0.0), &[]),
            entry("orange juice", Fruit, 120.0, "ml", (0.60, 240.0), "Orchard Fresh", 1, (45, 0.7, 10.4, 0.2, 8.4, 0.0), &[]),
        ];

        let rules = [
            ("coffee", "whole milk", RuleKind::Positive, 0.95, "Classic combination - milk mellows coffee's bitterness and adds creaminess"),
            ("espresso", "whole milk", RuleKind::Positive, 0.93, "Steamed milk softens espresso intensity into a rounded cup"),
            ("coffee", "cinnamon", RuleKind::Positive, 0.85, "Warm spice complements roasted coffee notes"),
            ("whole milk", "cinnamon", RuleKind::Positive, 0.80, "Cinnamon aromatics carry well in milk fat"),
            ("coffee", "lemon juice", RuleKind::Negative, 0.75, "Citrus acidity amplifies coffee's sourness"),
            ("espresso", "vanilla", RuleKind::Positive, 0.88, "Vanilla sweetness balances espresso bitterness"),
            ("espresso", "oat milk", RuleKind::Positive, 0.85, "Oat milk foams well and adds a cereal sweetness"),
            ("whole milk", "lemon juice", RuleKind::Negative, 0.95, "Acid causes milk proteins to coagulate and curdle"),
            ("whole milk", "orange juice", RuleKind::Negative, 0.90, "Citric acid curdles milk"),
            ("sugar", "cinnamon", RuleKind::Positive, 0.82, "Sugar rounds out cinnamon's heat"),
            ("green tea", "mint", RuleKind::Positive, 0.80, "Mint lifts the grassy notes of green tea"),
            ("green tea", "whole milk", RuleKind::Negative, 0.55, "Milk proteins mute green tea's delicate aromatics"),
            ("honey", "ginger", RuleKind::Positive, 0.85, "Honey tempers ginger's bite"),
            ("turmeric", "ginger", RuleKind::Positive, 0.80, "Earthy turmeric and sharp ginger layer well"),
            ("cocoa", "vanilla", RuleKind::Positive, 0.90, "Vanilla deepens chocolate flavour"),
        ];

        let mut catalog = Self::empty();
        for entry in entries {
            catalog = catalog.with_entry(entry);
        }
        for (first, second, kind, confidence, reason) in rules {
            catalog = catalog.with_rule(first, second, kind, confidence, reason);
        }
        catalog
            .with_substitution("whole milk", "almond milk", 1.0, 0.85)
            .with_substitution("whole milk", "oat milk", 1.0, 0.90)
            .with_substitution("sugar", "honey", 0.75, 0.80)
            .with_substitution("sugar", "stevia", 0.1, 0.70)
            .with_substitution("caramel syrup", "honey", 0.8, 0.65)
    }

    /// Add or replace an entry.
    #[must_use]
    pub fn with_entry(mut self, mut entry: CatalogEntry) -> Self {
        entry.name = key(&entry.name);
        self.entries.insert(entry.name.clone(), entry);
        self
    }

    /// Add a pairing rule.
    #[must_use]
    pub fn with_rule(mut self, first: &str, second: &str, kind: RuleKind, confidence: f64, reason: &str) -> Self {
        self.rules.push(CompatibilityRule {
            first: key(first),
            second: key(second),
            kind,
            confidence,
            reason: reason.to_string(),
        });
        self
    }

    /// Add a substitution for `original`.
    #[must_use]
    pub fn with_substitution(mut self, original: &str, substitute: &str, ratio: f64, confidence: f64) -> Self {
        self.substitutions
            .entry(key(original))
            .or_default()
            .push(Substitution {
                substitute: key(substitute),
                ratio,
                confidence,
            });
        self
    }

    /// Entry for `name`, if catalogued.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&CatalogEntry> {
        self.entries.get(&key(name))
    }

    /// Category of `name`, `Other` if not catalogued.
    #[must_use]
    pub fn category(&self, name: &str) -> Category {
        self.get(name).map_or(Category::Other, |e| e.category)
    }

    /// Every pairing rule.
    #[must_use]
    pub fn rules(&self) -> &[CompatibilityRule] {
        &self.rules
    }

    /// First rule covering the pair, in either order.
    #[must_use]
    pub fn rule_for(&self, a: &str, b: &str) -> Option<&CompatibilityRule> {
        let (a, b) = (key(a), key(b));
        self.rules.iter().find(|r| r.matches(&a, &b))
    }

    /// Known substitutions for `name`, best first.
    #[must_use]
    pub fn substitutions(&self, name: &str) -> Vec<&Substitution> {
        let mut subs: Vec<_> = self
            .substitutions
            .get(&key(name))
            .map(|s| s.iter().collect())
            .unwrap_or_default();
        subs.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        subs
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalogue has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        let catalog = IngredientCatalog::standard();
        let milk = catalog.get("  Whole Milk ").unwrap();
        assert_eq!(milk.name, "whole milk");
        assert!(milk.nutrition.allergens.contains("dairy"));
        assert!(catalog.get("martian mint").is_none());
    }

    #[test]
    fn test_rule_lookup_either_order() {
        let catalog = IngredientCatalog::standard();
        let rule = catalog.rule_for("Lemon Juice", "whole milk").unwrap();
        assert_eq!(rule.kind, RuleKind::Negative);
        assert!((rule.confidence - 0.95).abs() < f64::EPSILON);
        assert!(catalog.rule_for("espresso", "sugar").is_none());
    }

    #[test]
    fn test_substitutions_sorted_by_confidence() {
        let catalog = IngredientCatalog::standard();
        let subs = catalog.substitutions("whole milk");
        assert_eq!(subs[0].substitute, "oat milk");
        assert_eq!(subs[1].substitute, "almond milk");
        assert!(catalog.substitutions("espresso").is_empty());
    }

    #[test]
    fn test_first_matching_discount_wins() {
        let mut entry = IngredientCatalog::standard().get("espresso").unwrap().clone();
        entry.discounts = vec![bracket(10.0, 100.0, 5.0), bracket(50.0, 100.0, 20.0)];

        assert!((entry.discount_for(60.0).unwrap().percent - 5.0).abs() < f64::EPSILON);
        assert!(entry.discount_for(5.0).is_none());
    }

    #[test]
    fn test_unit_conversion() {
        assert!((to_millilitres(2.0, "shots") - 60.0).abs() < f64::EPSILON);
        assert!((convert(3.0, "tsp", "tbsp") - 1.0).abs() < f64::EPSILON);
        assert!((convert(7.0, "ml", "ml") - 7.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_unit_price() {
        let catalog = IngredientCatalog::standard();
        assert!((catalog.get("whole milk").unwrap().unit_price() - 0.004).abs() < 1e-12);
        assert!((catalog.get("espresso").unwrap().unit_price() - 0.75).abs() < 1e-12);
    }
}
