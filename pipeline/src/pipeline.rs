//! The invention pipeline.

use crate::analysis::{self, AnalysisInputs};
use crate::config::PipelineConfig;
use crate::constraints;
use crate::environment::PipelineEnvironment;
use crate::fanout;
use crate::report;
use beverage_inventor_core::ports::{CallContext, GeneratedRecipe, OptimizationRequest};
use beverage_inventor_core::request::ObjectiveWeights;
use beverage_inventor_core::{
    BeverageEvent, DependencyKind, ErrorKind, InventorError, Request, Response, Result,
};
use beverage_inventor_resilience::metrics::PipelineMetrics;
use beverage_inventor_resilience::timeout::earliest;
use beverage_inventor_resilience::{CallSpec, Executor, FallbackOutcome};
use tokio::time::Instant;

/// Operation name of AI recipe generation.
pub const AI_GENERATE: &str = "ai.generate_recipe";
/// Operation name of rule-based recipe generation.
pub const RULE_GENERATE: &str = "generator.generate_recipe";
/// Operation name of recipe optimization.
pub const OPTIMIZE: &str = "optimizer.optimize";
/// Operation name of beverage persistence.
pub const REPOSITORY_SAVE: &str = "repository.save";
/// Operation name of beverage lookup.
pub const REPOSITORY_FIND: &str = "repository.find_by_id";
/// Operation name of beverage listing.
pub const REPOSITORY_LIST: &str = "repository.list";
/// Operation name of event publication.
pub const PUBLISH: &str = "event_bus.publish";
/// Operation name of task creation.
pub const CREATE_TASK: &str = "task_manager.create_task";
/// Operation name of notification.
pub const NOTIFY: &str = "notifier.send_message";

/// Warning recorded when the rule-based generator stood in for the AI.
pub const AI_FALLBACK_WARNING: &str = "AI generation failed — used fallback";
/// Warning recorded when the task manager's breaker rejected the call.
pub const TASK_CIRCUIT_OPEN_WARNING: &str = "task creation skipped — circuit open";
/// Recommendation recorded when the optimized recipe is adopted.
pub const ADOPTED_RECOMMENDATION: &str = "Recipe optimized for better performance";

/// Turns requests into persisted, analyzed and announced beverages.
///
/// Stages run in order: validate, default, generate, assign creator,
/// enhanced analysis, constraint check, optimize, persist, publish, task,
/// notify. Validation and persistence failures end the run with an error;
/// every other stage degrades to a warning on the [`Response`].
///
/// # Example
///
/// ```ignore
/// let pipeline = Pipeline::new(environment, Executor::global(), PipelineConfig::default());
/// let response = pipeline.run(request).await?;
/// println!("{} ({} warnings)", response.beverage.name, response.warnings.len());
/// ```
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub(crate) env: PipelineEnvironment,
    pub(crate) executor: Executor,
    pub(crate) config: PipelineConfig,
}

impl Pipeline {
    /// Pipeline over `env`, running calls through `executor`.
    #[must_use]
    pub const fn new(env: PipelineEnvironment, executor: Executor, config: PipelineConfig) -> Self {
        Self { env, executor, config }
    }

    /// The policy in force.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The executor calls run through.
    #[must_use]
    pub const fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Run the pipeline with only the configured deadline.
    ///
    /// # Errors
    ///
    /// See [`Pipeline::run_until`].
    pub async fn run(&self, request: Request) -> Result<Response> {
        self.run_until(request, None).await
    }

    /// Run the pipeline, finishing by `deadline` at the latest.
    ///
    /// # Errors
    ///
    /// - `invalid_request` if the request fails validation
    /// - `invalid_objectives` if the optimization weights do not sum to 1.0
    /// - `persist_failed` if the beverage could not be saved
    /// - the rule-based generator's error, should it fail
    pub async fn run_until(&self, request: Request, deadline: Option<Instant>) -> Result<Response> {
        let started = Instant::now();
        let correlation_id = request.correlation_id.clone();
        let outcome = self.invent(request, deadline).await;
        let elapsed = started.elapsed();

        match &outcome {
            Ok(response) => {
                PipelineMetrics::record_run("ok", elapsed);
                tracing::info!(
                    correlation_id = %correlation_id,
                    beverage_id = %response.beverage.id,
                    ai_used = response.ai_used,
                    task_created = response.task_created,
                    warnings = response.warnings.len(),
                    duration_ms = elapsed.as_millis(),
                    "Beverage invented"
                );
            }
            Err(err) => {
                PipelineMetrics::record_run(err.kind.as_str(), elapsed);
                tracing::error!(correlation_id = %correlation_id, error = %err, "Pipeline failed");
            }
        }
        outcome
    }

    async fn invent(&self, mut request: Request, deadline: Option<Instant>) -> Result<Response> {
        // Validate and default
        request.validate()?;
        request.apply_defaults();
        let weights = self.objective_weights(&request)?;
        let deadline = earliest(deadline, self.config.deadline().map(|d| Instant::now() + d));

        // Generate
        let (generated, ai_used, fell_back) = self.generate(&request, deadline).await?;
        let GeneratedRecipe { mut beverage, warnings } = generated;
        beverage.created_by.clone_from(&request.created_by);

        let mut response = Response::new(beverage);
        response.ai_used = ai_used;
        for note in &request.notes {
            report::warn(&mut response, "request", note.clone());
        }
        if fell_back {
            report::warn(&mut response, "generate", AI_FALLBACK_WARNING);
        }
        for warning in warnings {
            report::warn(&mut response, "generate", warning);
        }

        // Enhanced analysis
        let outcome = analysis::run(
            &self.executor,
            &self.env,
            AnalysisInputs {
                beverage: &response.beverage,
                serving_size: request.serving_size,
                batch_size: request.batch_size,
                level: request.analysis_level,
                profile: request.dietary_profile.as_ref(),
                market: request.market_context.as_ref(),
                deadline,
                correlation_id: &request.correlation_id,
            },
            self.config.concurrent_analysis,
        )
        .await;
        let target_margin = request.optimization_goals.as_ref().and_then(|g| g.target_margin);
        analysis::apply(outcome, target_margin, &mut response);

        // Constraints
        if let Some(limits) = &request.constraints {
            let violations = constraints::check(
                &response.beverage,
                response.nutritional_analysis.as_ref(),
                limits,
            );
            for violation in violations {
                report::warn(&mut response, "constraints", violation);
            }
        }

        // Optimize
        if let Some(weights) = weights {
            self.optimize(&request, weights, deadline, &mut response).await?;
        }

        // Persist
        self.persist(&response, &request.correlation_id, deadline).await?;

        // Fan out
        self.publish_created(&mut response, &request.correlation_id, deadline).await;
        self.create_task(&mut response, &request.correlation_id, deadline).await;
        self.notify(&mut response, &request.correlation_id, deadline).await;

        Ok(response)
    }

    /// Weights for the optimize stage, checked before anything is called.
    /// `None` when the stage will not run.
    fn objective_weights(&self, request: &Request) -> Result<Option<ObjectiveWeights>> {
        let Some(goals) = &request.optimization_goals else {
            return Ok(None);
        };
        if self.env.optimizer.is_none() {
            return Ok(None);
        }
        let weights = goals.resolved_weights();
        weights.validate()?;
        Ok(Some(weights))
    }

    /// Returns the recipe, whether the AI produced it, and whether the
    /// rule-based generator had to stand in.
    async fn generate(
        &self,
        request: &Request,
        deadline: Option<Instant>,
    ) -> Result<(GeneratedRecipe, bool, bool)> {
        let rule_based = move || async move {
            let ctx = CallContext::new(RULE_GENERATE, DependencyKind::AiProvider)
                .with_correlation_id(request.correlation_id.as_str());
            self.env.generator.generate_recipe(&ctx, request).await
        };

        let Some(ai) = self.env.ai_generator.as_ref().filter(|_| request.use_ai) else {
            return Ok((rule_based().await?, false, false));
        };

        let spec = CallSpec::new(AI_GENERATE, DependencyKind::AiProvider)
            .deadline(deadline)
            .correlation_id(request.correlation_id.as_str());
        let outcome = self
            .executor
            .execute_with_fallback_on(
                spec,
                |_| true,
                |ctx| async move { ai.generate_recipe(&ctx, request).await },
                |_| rule_based(),
            )
            .await?;

        Ok(match outcome {
            FallbackOutcome::Primary(recipe) => (recipe, true, false),
            FallbackOutcome::Fallback { value, .. } => (value, false, true),
        })
    }

    async fn optimize(
        &self,
        request: &Request,
        weights: ObjectiveWeights,
        deadline: Option<Instant>,
        response: &mut Response,
    ) -> Result<()> {
        let (Some(optimizer), Some(goals)) = (&self.env.optimizer, &request.optimization_goals) else {
            return Ok(());
        };

        let spec = CallSpec::new(OPTIMIZE, DependencyKind::ExternalApi)
            .limiter(OPTIMIZE)
            .deadline(deadline)
            .correlation_id(request.correlation_id.as_str());
        let base = &response.beverage;
        let outcome = self
            .executor
            .execute_call(spec, |ctx| async move {
                let optimization = OptimizationRequest {
                    base,
                    goals,
                    weights,
                    serving_size: request.serving_size,
                    batch_size: request.batch_size,
                };
                optimizer.optimize(&ctx, &optimization).await
            })
            .await;

        let mut result = match outcome {
            Ok(result) => result,
            Err(err) if err.kind == ErrorKind::InvalidObjectives => return Err(err),
            Err(err) => {
                report::warn(response, "optimize", format!("recipe optimization failed: {err}"));
                return Ok(());
            }
        };

        let threshold = self.config.adoption_threshold;
        if result.scores.overall > threshold {
            result.adopted = true;
            let mut recipe = result.recipe.clone();
            recipe.created_by.clone_from(&request.created_by);
            tracing::info!(
                beverage_id = %recipe.id,
                score = result.scores.overall,
                "Adopting optimized recipe"
            );
            response.beverage = recipe;
            response.recommendations.push(ADOPTED_RECOMMENDATION.to_string());
            response
                .recommendations
                .extend(result.recommendations.iter().cloned());
        } else {
            response.recommendations.push(format!(
                "Optimized recipe scored {:.1}, not above the adoption threshold of {threshold:.1}; kept the generated recipe",
                result.scores.overall
            ));
        }
        response.optimization = Some(result);
        Ok(())
    }

    async fn persist(&self, response: &Response, correlation_id: &str, deadline: Option<Instant>) -> Result<()> {
        let spec = CallSpec::new(REPOSITORY_SAVE, DependencyKind::Database)
            .deadline(deadline)
            .correlation_id(correlation_id);
        let beverage = &response.beverage;
        let repository = &self.env.repository;

        self.executor
            .execute_call(spec, |ctx| async move { repository.save(&ctx, beverage).await })
            .await
            .map_err(|err| {
                tracing::error!(beverage_id = %beverage.id, error = %err, "Failed to persist beverage");
                InventorError::escalate(ErrorKind::PersistFailed, &err)
            })
    }

    async fn publish_created(&self, response: &mut Response, correlation_id: &str, deadline: Option<Instant>) {
        let event = BeverageEvent::created(&response.beverage, &self.config.service_name, self.env.clock.now());
        if let Err(err) = self.publish(&event, correlation_id, deadline).await {
            report::warn(response, "publish", format!("event publication failed: {err}"));
        }
    }

    pub(crate) async fn publish(
        &self,
        event: &BeverageEvent,
        correlation_id: &str,
        deadline: Option<Instant>,
    ) -> Result<()> {
        let spec = CallSpec::new(PUBLISH, DependencyKind::EventBus)
            .deadline(deadline)
            .correlation_id(correlation_id);
        let publisher = &self.env.publisher;
        self.executor
            .execute_call(spec, |ctx| async move { publisher.publish_event(&ctx, event).await })
            .await
    }

    async fn create_task(&self, response: &mut Response, correlation_id: &str, deadline: Option<Instant>) {
        let task = fanout::task_spec(response);
        let spec = CallSpec::new(CREATE_TASK, DependencyKind::ExternalApi)
            .deadline(deadline)
            .correlation_id(correlation_id);
        let task_manager = &self.env.task_manager;
        let task = &task;

        match self
            .executor
            .execute_call(spec, |ctx| async move { task_manager.create_task(&ctx, task).await })
            .await
        {
            Ok(id) => {
                response.task_created = true;
                response.task_id = Some(id);
            }
            Err(err) if err.is_circuit_open() => {
                report::warn(response, "task", TASK_CIRCUIT_OPEN_WARNING);
            }
            Err(err) => {
                report::warn(response, "task", format!("task creation failed: {err}"));
            }
        }
    }

    async fn notify(&self, response: &mut Response, correlation_id: &str, deadline: Option<Instant>) {
        let message = fanout::notification(response);
        let spec = CallSpec::new(NOTIFY, DependencyKind::ExternalApi)
            .deadline(deadline)
            .correlation_id(correlation_id);
        let notifier = &self.env.notifier;
        let channel = self.config.notification_channel.as_str();
        let message = message.as_str();

        if let Err(err) = self
            .executor
            .execute_call(spec, |ctx| async move { notifier.send_message(&ctx, channel, message).await })
            .await
        {
            report::warn(response, "notify", format!("notification failed: {err}"));
        }
    }
}
