//! Collaborator capabilities.
//!
//! The pipeline sees every external system through one of these narrow
//! traits. Implementations translate between the domain types and the
//! external interface and classify every failure as an [`InventorError`].
//! They never retry, time out, or fall back on their own; the resilience
//! kernel wraps every call.

use crate::analysis::{CompatibilityAnalysis, CostAnalysis, NutritionAnalysis, OptimizationResult};
use crate::beverage::{Beverage, BeverageId, BeverageStatus};
use crate::error::Result;
use crate::event::BeverageEvent;
use crate::request::{AnalysisLevel, DietaryProfile, MarketContext, ObjectiveWeights, OptimizationGoals, Request};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tokio::time::Instant;

/// Kind of external dependency; selects the resilience profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    /// Beverage repository
    Database,
    /// Kafka producer
    EventBus,
    /// LLM provider
    AiProvider,
    /// Task manager, notifier and other HTTP APIs
    ExternalApi,
}

impl DependencyKind {
    /// All kinds.
    pub const ALL: [Self; 4] = [
        Self::Database,
        Self::EventBus,
        Self::AiProvider,
        Self::ExternalApi,
    ];

    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Database => "database",
            Self::EventBus => "event_bus",
            Self::AiProvider => "ai_provider",
            Self::ExternalApi => "external_api",
        }
    }
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-call context handed to every collaborator.
#[derive(Debug, Clone)]
pub struct CallContext {
    /// Operation name, e.g. `task_manager.create_task`
    pub operation: String,
    /// Dependency kind
    pub dependency: DependencyKind,
    /// Correlation id of the pipeline run
    pub correlation_id: String,
    /// Scoped deadline for this attempt
    pub deadline: Option<Instant>,
    /// 1-based attempt number
    pub attempt: u32,
}

impl CallContext {
    /// Context for a first attempt with no deadline.
    #[must_use]
    pub fn new(operation: impl Into<String>, dependency: DependencyKind) -> Self {
        Self {
            operation: operation.into(),
            dependency,
            correlation_id: String::new(),
            deadline: None,
            attempt: 1,
        }
    }

    /// Attach a correlation id.
    #[must_use]
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = id.into();
        self
    }

    /// Time left before the deadline, if any.
    #[must_use]
    pub fn remaining(&self) -> Option<std::time::Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }
}

/// A generated recipe plus any warnings the generator raised.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedRecipe {
    /// The draft beverage
    pub beverage: Beverage,
    /// Generator warnings
    pub warnings: Vec<String>,
}

/// Produces a recipe from a request.
///
/// The rule-based generator never fails on a valid request; the AI
/// generator may fail with any classified error.
#[async_trait]
pub trait RecipeGenerator: Send + Sync {
    /// Generate a draft beverage.
    async fn generate_recipe(&self, ctx: &CallContext, request: &Request) -> Result<GeneratedRecipe>;
}

/// Nutrition analysis capability.
#[async_trait]
pub trait NutritionAnalyzer: Send + Sync {
    /// Analyze one serving of `beverage`.
    async fn analyze_nutrition(
        &self,
        ctx: &CallContext,
        beverage: &Beverage,
        serving_size: f64,
        level: AnalysisLevel,
        profile: Option<&DietaryProfile>,
    ) -> Result<NutritionAnalysis>;
}

/// Inputs to cost analysis.
#[derive(Debug, Clone)]
pub struct CostRequest<'a> {
    /// Beverage to price
    pub beverage: &'a Beverage,
    /// Millilitres per serving
    pub serving_size: f64,
    /// Servings per batch
    pub batch_size: u32,
    /// Add shipping
    pub include_shipping: bool,
    /// Add labour
    pub include_labor: bool,
    /// Add overhead
    pub include_overhead: bool,
    /// Market context, if any
    pub market: Option<&'a MarketContext>,
}

/// Cost analysis capability.
#[async_trait]
pub trait CostAnalyzer: Send + Sync {
    /// Price a batch.
    async fn analyze_cost(&self, ctx: &CallContext, request: &CostRequest<'_>) -> Result<CostAnalysis>;
}

/// Compatibility analysis capability.
#[async_trait]
pub trait CompatibilityAnalyzer: Send + Sync {
    /// Score how well the ingredients go together.
    async fn analyze_compatibility(
        &self,
        ctx: &CallContext,
        beverage: &Beverage,
        level: AnalysisLevel,
    ) -> Result<CompatibilityAnalysis>;
}

/// Inputs to optimization.
#[derive(Debug, Clone)]
pub struct OptimizationRequest<'a> {
    /// Recipe to improve
    pub base: &'a Beverage,
    /// Goals
    pub goals: &'a OptimizationGoals,
    /// Validated weights
    pub weights: ObjectiveWeights,
    /// Millilitres per serving
    pub serving_size: f64,
    /// Servings per batch
    pub batch_size: u32,
}

/// Optimization capability.
#[async_trait]
pub trait RecipeOptimizer: Send + Sync {
    /// Search for a better recipe.
    async fn optimize(&self, ctx: &CallContext, request: &OptimizationRequest<'_>) -> Result<OptimizationResult>;
}

/// Filter for listing beverages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BeverageFilter {
    /// Exact theme
    pub theme: Option<String>,
    /// Exact creator
    pub creator: Option<String>,
    /// Exact status
    pub status: Option<BeverageStatus>,
    /// Maximum results
    pub limit: Option<usize>,
}

impl BeverageFilter {
    /// Whether `beverage` passes the filter (ignores `limit`).
    #[must_use]
    pub fn matches(&self, beverage: &Beverage) -> bool {
        self.theme.as_ref().is_none_or(|t| &beverage.theme == t)
            && self.creator.as_ref().is_none_or(|c| &beverage.created_by == c)
            && self.status.is_none_or(|s| beverage.status == s)
    }
}

/// Beverage persistence.
///
/// `save` is an upsert keyed by id: saving the same beverage twice is
/// indistinguishable from saving it once.
#[async_trait]
pub trait BeverageRepository: Send + Sync {
    /// Insert or replace.
    async fn save(&self, ctx: &CallContext, beverage: &Beverage) -> Result<()>;

    /// Fetch by id.
    async fn find_by_id(&self, ctx: &CallContext, id: BeverageId) -> Result<Option<Beverage>>;

    /// List matching beverages, newest first.
    async fn list(&self, ctx: &CallContext, filter: &BeverageFilter) -> Result<Vec<Beverage>>;
}

/// Event publishing.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish one envelope.
    async fn publish_event(&self, ctx: &CallContext, event: &BeverageEvent) -> Result<()>;
}

/// Task priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    /// Low
    Low,
    /// Normal
    Normal,
    /// High
    High,
}

/// Task to create in the downstream task manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Title
    pub title: String,
    /// Markdown description
    pub description: String,
    /// Priority
    pub priority: TaskPriority,
    /// Tags
    pub tags: Vec<String>,
    /// Custom fields
    pub custom_fields: BTreeMap<String, String>,
}

/// Task creation.
#[async_trait]
pub trait TaskManager: Send + Sync {
    /// Create a task and return its id.
    async fn create_task(&self, ctx: &CallContext, task: &TaskSpec) -> Result<String>;
}

/// Notification delivery.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Post `message` to `channel`.
    async fn send_message(&self, ctx: &CallContext, channel: &str, message: &str) -> Result<()>;
}
