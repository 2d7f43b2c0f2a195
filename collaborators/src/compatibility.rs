//! Pairwise ingredient compatibility scoring.

use crate::catalog::{IngredientCatalog, RuleKind};
use async_trait::async_trait;
use beverage_inventor_core::analysis::{CompatibilityAnalysis, FlavorConflict, FlavorSynergy, Severity};
use beverage_inventor_core::ports::CompatibilityAnalyzer;
use beverage_inventor_core::{AnalysisLevel, Beverage, CallContext, Result};
use std::sync::Arc;

const NEUTRAL_SCORE: f64 = 50.0;
const POSITIVE_WEIGHT: f64 = 20.0;
const NEGATIVE_WEIGHT: f64 = 30.0;

/// Scores every ingredient pair against the catalogue's pairing rules.
///
/// Each pair starts neutral at 50, gains `20 * confidence` for a positive
/// rule and loses `30 * confidence` for a negative one. The overall score is
/// the mean over all pairs, rounded to one decimal; a single ingredient
/// scores 50.
#[derive(Debug, Clone)]
pub struct RuleCompatibilityAnalyzer {
    catalog: Arc<IngredientCatalog>,
}

impl RuleCompatibilityAnalyzer {
    /// Analyzer over `catalog`.
    #[must_use]
    pub const fn new(catalog: Arc<IngredientCatalog>) -> Self {
        Self { catalog }
    }

    /// Synchronous analysis, shared with the optimizer.
    #[must_use]
    pub fn analyze(&self, beverage: &Beverage, level: AnalysisLevel) -> CompatibilityAnalysis {
        let names: Vec<String> = beverage
            .ingredients
            .iter()
            .map(|i| i.name.trim().to_lowercase())
            .collect();

        let mut conflicts = Vec::new();
        let mut synergies = Vec::new();
        let mut total = 0.0;
        let mut pairs = 0_u32;

        for (i, first) in names.iter().enumerate() {
            for second in &names[i + 1..] {
                let mut score = NEUTRAL_SCORE;
                if let Some(rule) = self.catalog.rule_for(first, second) {
                    match rule.kind {
                        RuleKind::Positive => {
                            score += POSITIVE_WEIGHT * rule.confidence;
                            synergies.push(FlavorSynergy {
                                first: first.clone(),
                                second: second.clone(),
                                strength: rule.confidence * 10.0,
                                description: rule.reason.clone(),
                            });
                        }
                        RuleKind::Negative => {
                            score -= NEGATIVE_WEIGHT * rule.confidence;
                            conflicts.push(FlavorConflict {
                                first: first.clone(),
                                second: second.clone(),
                                severity: Severity::from_confidence(rule.confidence),
                                description: rule.reason.clone(),
                            });
                        }
                    }
                }
                total += score.clamp(0.0, 100.0);
                pairs += 1;
            }
        }

        let overall = if pairs == 0 {
            NEUTRAL_SCORE
        } else {
            (total / f64::from(pairs) * 10.0).round() / 10.0
        };

        let mut analysis = CompatibilityAnalysis {
            overall_compatibility: overall,
            conflicts,
            synergies,
            recommendations: Vec::new(),
            confidence: 0.0,
        };
        analysis.recommendations = self.recommendations(&analysis, level);

        let uncatalogued = names.iter().filter(|n| self.catalog.get(n).is_none()).count();
        #[allow(clippy::cast_precision_loss)]
        let confidence = 0.8 - uncatalogued as f64 * 0.1;
        analysis.confidence = (confidence.clamp(0.0, 1.0) * 100.0).round() / 100.0;
        analysis
    }

    fn recommendations(&self, analysis: &CompatibilityAnalysis, level: AnalysisLevel) -> Vec<String> {
        let mut recommendations = Vec::new();
        if analysis.overall_compatibility < 60.0 {
            recommendations.push("Consider ingredient substitutions to improve compatibility".to_string());
        } else if analysis.overall_compatibility > 80.0 {
            recommendations.push("Excellent ingredient compatibility - recipe should work well".to_string());
        }

        let high = analysis.high_severity_conflicts().count();
        if high > 0 {
            recommendations.push(format!("Address {high} high-severity flavor conflicts"));
        }
        if analysis.synergies.len() > 2 {
            recommendations.push(
                "Great flavor synergies detected - consider highlighting these combinations".to_string(),
            );
        }

        if level != AnalysisLevel::Basic {
            for conflict in &analysis.conflicts {
                let replacement = [&conflict.first, &conflict.second].into_iter().find_map(|name| {
                    self.catalog
                        .substitutions(name)
                        .first()
                        .map(|sub| (name.clone(), sub.substitute.clone()))
                });
                if let Some((original, substitute)) = replacement {
                    recommendations.push(format!(
                        "Replace {original} with {substitute} to avoid the {}/{} clash",
                        conflict.first, conflict.second
                    ));
                }
            }
        }
        recommendations
    }
}

#[async_trait]
impl CompatibilityAnalyzer for RuleCompatibilityAnalyzer {
    async fn analyze_compatibility(
        &self,
        ctx: &CallContext,
        beverage: &Beverage,
        level: AnalysisLevel,
    ) -> Result<CompatibilityAnalysis> {
        tracing::debug!(operation = %ctx.operation, beverage_id = %beverage.id, %level, "Analyzing compatibility");
        Ok(self.analyze(beverage, level))
    }
}
