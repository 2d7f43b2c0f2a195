//! AI-assisted recipe generation.

use super::client::LlmClient;
use super::error::LlmError;
use crate::generator::RuleBasedGenerator;
use async_trait::async_trait;
use beverage_inventor_core::ports::{GeneratedRecipe, RecipeGenerator};
use beverage_inventor_core::{Beverage, CallContext, Request, Result};
use serde::Deserialize;

/// Metadata tag marking beverages the LLM contributed to.
pub const AI_ENHANCED_TAG: &str = "AI-Enhanced";

const SYSTEM_PROMPT: &str = "You are an expert beverage scientist and nutritionist. \
Provide accurate, helpful, and detailed analysis. Always respond in the requested format.";

/// The model's verdict on an ingredient list.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct IngredientAssessment {
    /// Whether the ingredients work together
    pub compatible: bool,
    /// 0-100
    pub compatibility_score: f64,
    /// Problems the model spotted
    pub warnings: Vec<String>,
}

impl Default for IngredientAssessment {
    fn default() -> Self {
        Self {
            compatible: true,
            compatibility_score: 50.0,
            warnings: Vec::new(),
        }
    }
}

impl IngredientAssessment {
    /// Parse the first JSON object in `reply`; unreadable replies yield the default.
    #[must_use]
    pub fn parse(reply: &str) -> Self {
        let object = match (reply.find('{'), reply.rfind('}')) {
            (Some(start), Some(end)) if start < end => &reply[start..=end],
            _ => return Self::default(),
        };
        serde_json::from_str(object).unwrap_or_else(|err| {
            tracing::debug!(error = %err, "Unparsable ingredient assessment, using defaults");
            Self::default()
        })
    }
}

fn assessment_prompt(request: &Request) -> String {
    format!(
        "Analyze these beverage ingredients for compatibility: {}. Theme: {}.\n\
         Respond with JSON only: {{\"compatible\": bool, \"compatibility_score\": 0-100, \"warnings\": [string]}}",
        request.ingredients.join(", "),
        request.theme
    )
}

fn description_prompt(beverage: &Beverage) -> String {
    let ingredients = beverage
        .ingredients
        .iter()
        .map(|i| format!("{} {} {}", i.quantity, i.unit, i.name))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "Write a 2-3 sentence menu description for a beverage called \"{}\" with the theme \"{}\". \
         Ingredients: {ingredients}. Respond with the description only.",
        beverage.name, beverage.theme
    )
}

/// Generator that asks the LLM to vet the ingredients and describe the
/// drink, on top of a rule-based recipe.
///
/// Every LLM failure is returned classified; falling back to the plain
/// rule-based recipe is the caller's decision.
#[derive(Debug, Clone)]
pub struct LlmRecipeGenerator {
    client: LlmClient,
    base: RuleBasedGenerator,
}

impl LlmRecipeGenerator {
    /// Generator calling `client` and building on `base`.
    #[must_use]
    pub const fn new(client: LlmClient, base: RuleBasedGenerator) -> Self {
        Self { client, base }
    }

    async fn generate(&self, request: &Request) -> std::result::Result<GeneratedRecipe, LlmError> {
        let mut warnings = Vec::new();

        let reply = self.client.complete(SYSTEM_PROMPT, &assessment_prompt(request)).await?;
        let assessment = IngredientAssessment::parse(&reply);
        if !assessment.compatible {
            warnings.push("AI detected potential ingredient compatibility issues".to_string());
            warnings.extend(assessment.warnings);
        }

        let GeneratedRecipe {
            mut beverage,
            warnings: base_warnings,
        } = self.base.generate(request);
        warnings.extend(base_warnings);

        let description = self.client.complete(SYSTEM_PROMPT, &description_prompt(&beverage)).await?;
        let description = description.trim();
        if !description.is_empty() {
            beverage.description = description.to_string();
        }
        beverage.metadata.tags.insert(AI_ENHANCED_TAG.to_string());

        Ok(GeneratedRecipe { beverage, warnings })
    }
}

#[async_trait]
impl RecipeGenerator for LlmRecipeGenerator {
    async fn generate_recipe(&self, ctx: &CallContext, request: &Request) -> Result<GeneratedRecipe> {
        tracing::debug!(
            operation = %ctx.operation,
            correlation_id = %ctx.correlation_id,
            attempt = ctx.attempt,
            "Generating AI recipe"
        );
        self.generate(request).await.map_err(|err| err.classify(&ctx.operation))
    }
}
