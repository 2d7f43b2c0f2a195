//! End-to-end pipeline runs over the catalogue collaborators and test doubles.

#![allow(clippy::unwrap_used)]

use beverage_inventor_collaborators::{
    CatalogCostAnalyzer, CatalogNutritionAnalyzer, IngredientCatalog, RuleBasedGenerator,
    RuleCompatibilityAnalyzer, VariationOptimizer,
};
use beverage_inventor_core::environment::Clock;
use beverage_inventor_core::ports::{BeverageFilter, RecipeGenerator};
use beverage_inventor_core::request::{Constraints, ObjectiveWeights, OptimizationGoals};
use beverage_inventor_core::{
    AnalysisLevel, BeverageId, BeverageStatus, DependencyKind, ErrorKind, EventType,
    InventorError, Request,
};
use beverage_inventor_pipeline::analysis::{COMPATIBILITY_ANALYZE, COST_ANALYZE, NUTRITION_ANALYZE};
use beverage_inventor_pipeline::pipeline::OPTIMIZE;
use beverage_inventor_pipeline::{
    ADOPTED_RECOMMENDATION, AI_FALLBACK_WARNING, Pipeline, PipelineConfig, PipelineEnvironment,
    TASK_CIRCUIT_OPEN_WARNING,
};
use beverage_inventor_resilience::{Executor, ResilienceRegistry};
use beverage_inventor_testing::fixtures::{
    beverage_with_cost, fast_profile, fast_registry, minimal_request, registry_with,
};
use beverage_inventor_testing::{
    FailingAiGenerator, FailureScript, FlakyRepository, FlakyTaskManager, RecordingNotifier,
    RecordingPublisher, StubGenerator, init_test_tracing, test_clock,
};
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    repository: FlakyRepository,
    publisher: RecordingPublisher,
    tasks: FlakyTaskManager,
    notifier: RecordingNotifier,
    registry: Arc<ResilienceRegistry>,
    env: PipelineEnvironment,
}

impl Harness {
    fn new() -> Self {
        Self::with(
            FlakyRepository::healthy(),
            RecordingPublisher::new(),
            FlakyTaskManager::healthy(),
            fast_registry(),
        )
    }

    fn with(
        repository: FlakyRepository,
        publisher: RecordingPublisher,
        tasks: FlakyTaskManager,
        registry: Arc<ResilienceRegistry>,
    ) -> Self {
        init_test_tracing();
        let catalog = Arc::new(IngredientCatalog::standard());
        let clock: Arc<dyn Clock> = Arc::new(test_clock());
        let notifier = RecordingNotifier::new();

        let env = PipelineEnvironment {
            generator: Arc::new(RuleBasedGenerator::new(Arc::clone(&catalog), Arc::clone(&clock))),
            ai_generator: None,
            nutrition: Arc::new(CatalogNutritionAnalyzer::new(Arc::clone(&catalog))),
            cost: Arc::new(CatalogCostAnalyzer::new(Arc::clone(&catalog))),
            compatibility: Arc::new(RuleCompatibilityAnalyzer::new(Arc::clone(&catalog))),
            optimizer: None,
            repository: Arc::new(repository.clone()),
            publisher: Arc::new(publisher.clone()),
            task_manager: Arc::new(tasks.clone()),
            notifier: Arc::new(notifier.clone()),
            clock,
        };

        Self {
            repository,
            publisher,
            tasks,
            notifier,
            registry,
            env,
        }
    }

    fn generator(mut self, generator: Arc<dyn RecipeGenerator>) -> Self {
        self.env.generator = generator;
        self
    }

    fn ai(mut self, generator: Arc<dyn RecipeGenerator>) -> Self {
        self.env = self.env.with_ai_generator(generator);
        self
    }

    fn optimizer(mut self) -> Self {
        let catalog = Arc::new(IngredientCatalog::standard());
        self.env = self.env.with_optimizer(Arc::new(VariationOptimizer::new(catalog)));
        self
    }

    fn pipeline(&self) -> Pipeline {
        self.pipeline_with(PipelineConfig::default())
    }

    fn pipeline_with(&self, config: PipelineConfig) -> Pipeline {
        Pipeline::new(self.env.clone(), Executor::new(Arc::clone(&self.registry)), config)
    }
}

fn goals(weights: ObjectiveWeights) -> OptimizationGoals {
    OptimizationGoals {
        weights: Some(weights),
        ..OptimizationGoals::default()
    }
}

#[tokio::test]
async fn test_minimal_success() {
    let harness = Harness::new();

    let response = harness.pipeline().run(minimal_request()).await.unwrap();

    assert!(!response.beverage.name.is_empty());
    assert_eq!(response.beverage.ingredients.len(), 2);
    assert_eq!(response.beverage.created_by, "u1");
    assert!(!response.ai_used);
    assert!(response.nutritional_analysis.is_some());
    assert!(response.cost_analysis.is_some());
    assert!(response.compatibility_analysis.is_some());

    let events = harness.publisher.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, EventType::BeverageCreated);
    assert_eq!(events[0].key(), response.beverage.id.to_string());
    assert_eq!(events[0].producer, "beverage-inventor-agent");

    assert!(response.task_created);
    assert_eq!(response.task_id.as_deref(), Some("task-1"));
    assert_eq!(harness.repository.stored(response.beverage.id), Some(response.beverage.clone()));

    let messages = harness.notifier.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].0, "#beverage-innovation");
    assert!(messages[0].1.contains(&response.beverage.name));
    assert!(messages[0].1.contains("Testing task created: task-1"));
}

#[tokio::test]
async fn test_ai_fallback_when_circuit_open() {
    let ai = Arc::new(FailingAiGenerator::new(InventorError::transient_io(
        "ai.generate_recipe",
        "unreachable",
    )));
    let harness = Harness::new().ai(ai.clone());

    let breaker = harness.registry.breaker("ai", DependencyKind::AiProvider);
    for _ in 0..5 {
        breaker.try_acquire().unwrap().failure();
    }

    let mut request = minimal_request();
    request.use_ai = true;
    let response = harness.pipeline().run(request).await.unwrap();

    assert!(!response.ai_used);
    assert_eq!(response.warnings, vec![AI_FALLBACK_WARNING]);
    assert_eq!(ai.calls(), 0);
    assert_eq!(harness.publisher.events().len(), 1);
}

#[tokio::test]
async fn test_ai_failure_falls_back() {
    let ai = Arc::new(FailingAiGenerator::new(InventorError::ai_failed(
        "ai.generate_recipe",
        "model refused",
    )));
    let harness = Harness::new().ai(ai.clone());

    let mut request = minimal_request();
    request.use_ai = true;
    let response = harness.pipeline().run(request).await.unwrap();

    assert!(!response.ai_used);
    assert_eq!(response.warnings, vec![AI_FALLBACK_WARNING]);
    assert_eq!(ai.calls(), 1);
}

#[tokio::test]
async fn test_ai_success_marks_ai_used() {
    let ai = Arc::new(StubGenerator::new(beverage_with_cost(2.0)));
    let harness = Harness::new().ai(ai);

    let mut request = minimal_request();
    request.use_ai = true;
    let response = harness.pipeline().run(request).await.unwrap();

    assert!(response.ai_used);
    assert!(response.warnings.is_empty());
}

#[tokio::test]
async fn test_ai_skipped_when_not_requested() {
    let ai = Arc::new(FailingAiGenerator::new(InventorError::ai_failed("ai.generate_recipe", "x")));
    let harness = Harness::new().ai(ai.clone());

    let response = harness.pipeline().run(minimal_request()).await.unwrap();

    assert!(!response.ai_used);
    assert_eq!(ai.calls(), 0);
}

#[tokio::test]
async fn test_constraint_breach_is_a_warning() {
    let harness = Harness::new().generator(Arc::new(StubGenerator::new(beverage_with_cost(4.5))));
    let mut request = minimal_request();
    request.constraints = Some(Constraints {
        max_cost: Some(4.0),
        ..Constraints::default()
    });

    let response = harness.pipeline().run(request).await.unwrap();

    assert!(
        response
            .warnings
            .contains(&"beverage cost 4.50 exceeds maximum 4.00".to_string())
    );
    assert_eq!(harness.repository.len(), 1);
    assert_eq!(harness.publisher.events().len(), 1);
}

#[tokio::test]
async fn test_cost_equal_to_maximum_is_not_a_warning() {
    let harness = Harness::new().generator(Arc::new(StubGenerator::new(beverage_with_cost(4.0))));
    let mut request = minimal_request();
    request.constraints = Some(Constraints {
        max_cost: Some(4.0),
        ..Constraints::default()
    });

    let response = harness.pipeline().run(request).await.unwrap();

    assert!(!response.warnings.iter().any(|w| w.starts_with("beverage cost")));
}

#[tokio::test]
async fn test_persist_failure_is_terminal() {
    let repository = FlakyRepository::new(FailureScript::times(
        &InventorError::transient_io("repository.save", "connection reset"),
        3,
    ));
    let harness = Harness::with(
        repository,
        RecordingPublisher::new(),
        FlakyTaskManager::healthy(),
        fast_registry(),
    );

    let err = harness.pipeline().run(minimal_request()).await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::PersistFailed);
    assert_eq!(err.operation, "repository.save");
    assert_eq!(harness.repository.save_calls(), 3);
    assert!(harness.publisher.events().is_empty());
    assert_eq!(harness.tasks.calls(), 0);
    assert!(harness.notifier.messages().is_empty());
}

#[tokio::test]
async fn test_persist_recovers_within_retry_budget() {
    let repository = FlakyRepository::new(FailureScript::times(
        &InventorError::transient_io("repository.save", "connection reset"),
        2,
    ));
    let harness = Harness::with(
        repository,
        RecordingPublisher::new(),
        FlakyTaskManager::healthy(),
        fast_registry(),
    );

    let response = harness.pipeline().run(minimal_request()).await.unwrap();

    assert_eq!(harness.repository.save_calls(), 3);
    assert!(response.warnings.is_empty());
}

#[tokio::test]
async fn test_task_breaker_trips_after_five_failures() {
    let tasks = FlakyTaskManager::new(FailureScript::always(InventorError::transient_io(
        "task_manager.create_task",
        "502 Bad Gateway",
    )));
    let harness = Harness::with(
        FlakyRepository::healthy(),
        RecordingPublisher::new(),
        tasks,
        registry_with(&[(DependencyKind::ExternalApi, fast_profile(1))]),
    );
    let pipeline = harness.pipeline();

    for _ in 0..5 {
        let response = pipeline.run(minimal_request()).await.unwrap();
        assert!(!response.task_created);
        assert!(response.warnings[0].starts_with("task creation failed: transient_io"));
    }
    assert_eq!(harness.tasks.calls(), 5);

    let response = pipeline.run(minimal_request()).await.unwrap();

    assert!(!response.task_created);
    assert_eq!(response.warnings, vec![TASK_CIRCUIT_OPEN_WARNING]);
    assert_eq!(harness.tasks.calls(), 5);
    assert_eq!(harness.publisher.events().len(), 6);
}

#[tokio::test]
async fn test_publish_failure_is_not_terminal() {
    let publisher = RecordingPublisher::failing(FailureScript::always(InventorError::new(
        ErrorKind::PublishFailed,
        "event_bus.publish",
        "broker unavailable",
    )));
    let harness = Harness::with(
        FlakyRepository::healthy(),
        publisher,
        FlakyTaskManager::healthy(),
        fast_registry(),
    );

    let response = harness.pipeline().run(minimal_request()).await.unwrap();

    assert_eq!(response.warnings.len(), 1);
    assert!(response.warnings[0].starts_with("event publication failed: publish_failed"));
    assert!(response.task_created);
    assert_eq!(harness.notifier.messages().len(), 1);
}

#[tokio::test]
async fn test_notify_failure_is_not_terminal() {
    let mut harness = Harness::new();
    let notifier = RecordingNotifier::failing(FailureScript::always(InventorError::permanent_io(
        "notifier.send_message",
        "404 no_service",
    )));
    harness.env.notifier = Arc::new(notifier);

    let response = harness.pipeline().run(minimal_request()).await.unwrap();

    assert!(response.task_created);
    assert_eq!(response.warnings.len(), 1);
    assert!(response.warnings[0].starts_with("notification failed: permanent_io"));
}

#[tokio::test]
async fn test_invalid_request_is_rejected_before_any_call() {
    let harness = Harness::new();
    let request = Request::builder().theme("comfort").created_by("u1").build();

    let err = harness.pipeline().run(request).await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::InvalidRequest);
    assert_eq!(harness.repository.save_calls(), 0);
    assert!(harness.publisher.events().is_empty());
}

#[tokio::test]
async fn test_weights_off_by_two_hundredths_are_rejected() {
    let harness = Harness::new().optimizer();
    let mut request = minimal_request();
    request.optimization_goals = Some(goals(ObjectiveWeights {
        taste: 0.42,
        cost: 0.3,
        nutrition: 0.2,
        compatibility: 0.1,
    }));

    let err = harness.pipeline().run(request).await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::InvalidObjectives);
    assert_eq!(harness.repository.save_calls(), 0);
    assert!(harness.publisher.events().is_empty());
}

#[tokio::test]
async fn test_weights_off_by_one_hundredth_are_accepted() {
    let harness = Harness::new().optimizer();
    let mut request = minimal_request();
    request.optimization_goals = Some(goals(ObjectiveWeights {
        taste: 0.41,
        cost: 0.3,
        nutrition: 0.2,
        compatibility: 0.1,
    }));

    let response = harness.pipeline().run(request).await.unwrap();

    assert!(response.optimization.is_some());
}

#[tokio::test]
async fn test_optimized_recipe_adopted_above_threshold() {
    let harness = Harness::new().optimizer();
    let config = PipelineConfig {
        adoption_threshold: 0.0,
        ..PipelineConfig::default()
    };
    let mut request = minimal_request();
    request.optimization_goals = Some(OptimizationGoals::default());

    let response = harness.pipeline_with(config).run(request).await.unwrap();

    let optimization = response.optimization.as_ref().unwrap();
    assert!(optimization.adopted);
    assert_eq!(response.beverage.ingredients, optimization.recipe.ingredients);
    assert_eq!(response.beverage.created_by, "u1");
    assert!(response.recommendations.contains(&ADOPTED_RECOMMENDATION.to_string()));
    assert_eq!(harness.repository.stored(response.beverage.id), Some(response.beverage.clone()));
}

#[tokio::test]
async fn test_local_stages_leave_external_budget_to_task_and_notify() {
    let registry = Arc::new(ResilienceRegistry::new());
    let harness = Harness::with(
        FlakyRepository::healthy(),
        RecordingPublisher::new(),
        FlakyTaskManager::healthy(),
        Arc::clone(&registry),
    )
    .optimizer();
    let pipeline = harness.pipeline();

    for _ in 0..10 {
        let mut request = minimal_request();
        request.optimization_goals = Some(OptimizationGoals::default());
        let response = pipeline.run(request).await.unwrap();

        assert!(response.task_created, "{:?}", response.warnings);
        assert!(response.optimization.is_some());
        assert!(response.warnings.iter().all(|w| !w.contains("rate")), "{:?}", response.warnings);
    }

    // Task creation and notification: two permits per run, within the burst of 20
    let shared = registry.limiter(DependencyKind::ExternalApi).metrics();
    assert_eq!(shared.allowed, 20);
    assert_eq!(shared.rejected, 0);
    for operation in [NUTRITION_ANALYZE, COST_ANALYZE, COMPATIBILITY_ANALYZE, OPTIMIZE] {
        let own = registry.limiter_named(operation, DependencyKind::ExternalApi).metrics();
        assert_eq!(own.allowed, 10, "{operation}");
    }
    assert_eq!(harness.notifier.messages().len(), 10);
}

#[tokio::test]
async fn test_optimized_recipe_discarded_at_threshold() {
    let harness = Harness::new().optimizer();
    let config = PipelineConfig {
        adoption_threshold: 100.0,
        ..PipelineConfig::default()
    };
    let mut request = minimal_request();
    request.optimization_goals = Some(OptimizationGoals::default());

    let response = harness.pipeline_with(config).run(request).await.unwrap();

    assert!(!response.optimization.as_ref().unwrap().adopted);
    assert!(!response.recommendations.contains(&ADOPTED_RECOMMENDATION.to_string()));
    assert!(
        response
            .recommendations
            .iter()
            .any(|r| r.contains("not above the adoption threshold of 100.0"))
    );
}

#[tokio::test]
async fn test_optimize_skipped_without_optimizer() {
    let harness = Harness::new();
    let mut request = minimal_request();
    request.optimization_goals = Some(OptimizationGoals {
        target_margin: Some(30.0),
        ..OptimizationGoals::default()
    });

    let response = harness.pipeline().run(request).await.unwrap();

    assert!(response.optimization.is_none());
    let price = response.cost_analysis.as_ref().unwrap().suggested_price(30.0).unwrap();
    assert!(
        response
            .recommendations
            .contains(&format!("Suggested selling price: ${price:.2} for 30.0% margin"))
    );
}

#[tokio::test]
async fn test_unknown_analysis_level_is_recorded() {
    let harness = Harness::new();
    let request = Request::builder()
        .ingredients(["espresso", "whole milk"])
        .theme("comfort")
        .created_by("u1")
        .analysis_level_name("exhaustive")
        .build();

    let response = harness.pipeline().run(request).await.unwrap();

    assert_eq!(response.warnings.len(), 1);
    assert!(response.warnings[0].contains("exhaustive"));
}

#[tokio::test]
async fn test_sequential_analysis_matches_concurrent() {
    let harness = Harness::new();
    let config = PipelineConfig {
        concurrent_analysis: false,
        ..PipelineConfig::default()
    };

    let sequential = harness.pipeline_with(config).run(minimal_request()).await.unwrap();
    let concurrent = harness.pipeline().run(minimal_request()).await.unwrap();

    assert_eq!(sequential.recommendations, concurrent.recommendations);
    assert_eq!(sequential.nutritional_analysis, concurrent.nutritional_analysis);
}

#[tokio::test]
async fn test_expired_deadline_fails_persist() {
    let harness = Harness::new();
    let deadline = tokio::time::Instant::now() - Duration::from_secs(1);

    let err = harness
        .pipeline()
        .run_until(minimal_request(), Some(deadline))
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::PersistFailed);
    assert!(err.message.starts_with("timeout"));
    assert!(harness.publisher.events().is_empty());
}

#[tokio::test]
async fn test_update_status_publishes_change() {
    let harness = Harness::new();
    let pipeline = harness.pipeline();
    let created = pipeline.run(minimal_request()).await.unwrap().beverage;

    let updated = pipeline
        .update_status(created.id, BeverageStatus::Pending)
        .await
        .unwrap();

    assert_eq!(updated.status, BeverageStatus::Pending);
    assert_eq!(harness.repository.stored(created.id).unwrap().status, BeverageStatus::Pending);
    let events = harness.publisher.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].event_type, EventType::BeverageStatusChanged);
    assert_eq!(events[1].changes["status"].old, serde_json::json!("draft"));
    assert_eq!(events[1].changes["status"].new, serde_json::json!("pending"));
}

#[tokio::test]
async fn test_update_status_rejects_skipping_review() {
    let harness = Harness::new();
    let pipeline = harness.pipeline();
    let created = pipeline.run(minimal_request()).await.unwrap().beverage;

    let err = pipeline
        .update_status(created.id, BeverageStatus::Production)
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::InvalidRequest);
    assert_eq!(harness.publisher.events().len(), 1);
}

#[tokio::test]
async fn test_update_status_unknown_beverage() {
    let harness = Harness::new();

    let err = harness
        .pipeline()
        .update_status(BeverageId::new(), BeverageStatus::Pending)
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::NotFound);
}

#[tokio::test]
async fn test_update_status_publish_failure_is_logged_only() {
    let publisher = RecordingPublisher::failing(FailureScript::always(InventorError::new(
        ErrorKind::PublishFailed,
        "event_bus.publish",
        "broker unavailable",
    )));
    let harness = Harness::with(
        FlakyRepository::healthy(),
        publisher,
        FlakyTaskManager::healthy(),
        fast_registry(),
    );
    let beverage = beverage_with_cost(2.0);
    harness.repository.seed(beverage.clone());

    let updated = harness
        .pipeline()
        .update_status(beverage.id, BeverageStatus::Pending)
        .await
        .unwrap();

    assert_eq!(updated.status, BeverageStatus::Pending);
}

#[tokio::test]
async fn test_update_beverage_publishes_changes() {
    let harness = Harness::new();
    let beverage = beverage_with_cost(2.0);
    harness.repository.seed(beverage.clone());

    let mut edited = beverage.clone();
    edited.name = "Midnight Latte".to_string();
    harness.pipeline().update_beverage(edited).await.unwrap();

    let events = harness.publisher.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, EventType::BeverageUpdated);
    assert_eq!(events[0].changes.keys().collect::<Vec<_>>(), vec!["name"]);
    assert_eq!(harness.repository.stored(beverage.id).unwrap().name, "Midnight Latte");
}

#[tokio::test]
async fn test_list_and_get_beverages() {
    let harness = Harness::new();
    let pipeline = harness.pipeline();
    let comfort = pipeline.run(minimal_request()).await.unwrap().beverage;
    let mut other = minimal_request();
    other.theme = "Mars Base".to_string();
    pipeline.run(other).await.unwrap();

    let filter = BeverageFilter {
        theme: Some("comfort".to_string()),
        ..BeverageFilter::default()
    };
    let listed = pipeline.list_beverages(&filter).await.unwrap();

    assert_eq!(listed, vec![comfort.clone()]);
    assert_eq!(pipeline.get_beverage(comfort.id).await.unwrap(), comfort);
    assert_eq!(
        pipeline.get_beverage(BeverageId::new()).await.unwrap_err().kind,
        ErrorKind::NotFound
    );
}

#[tokio::test]
async fn test_analyze_stored_beverage() {
    let harness = Harness::new();
    let beverage = beverage_with_cost(2.0);
    harness.repository.seed(beverage.clone());

    let response = harness
        .pipeline()
        .analyze_beverage(beverage.id, AnalysisLevel::Comprehensive)
        .await
        .unwrap();

    assert_eq!(response.beverage, beverage);
    assert!(response.nutritional_analysis.is_some());
    assert!(response.cost_analysis.is_some());
    assert!(response.compatibility_analysis.is_some());
    assert_eq!(harness.repository.save_calls(), 0);
    assert!(harness.publisher.events().is_empty());
}
