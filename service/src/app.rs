//! Startup wiring and the service lifecycle.
//!
//! Startup order: metrics recorder, resilience registry, producer (probed
//! under `strict_boot`), collaborators, pipeline, consumer, HTTP listeners.
//! Shutdown reverses it: stop fetching, drain in-flight messages and their
//! commits, stop the listeners, flush the producer, tear the registry down.

use crate::config::ServiceConfig;
use crate::http::{self, AppState};
use crate::shutdown::{self, Shutdown};
use anyhow::Context;
use beverage_inventor_collaborators::llm::{LlmClient, LlmRecipeGenerator};
use beverage_inventor_collaborators::{
    CatalogCostAnalyzer, CatalogNutritionAnalyzer, HttpTaskManager, InMemoryBeverageRepository,
    IngredientCatalog, LoggingNotifier, LoggingTaskManager, RuleBasedGenerator,
    RuleCompatibilityAnalyzer, SlackNotifier, VariationOptimizer,
};
use beverage_inventor_core::environment::{Clock, SystemClock};
use beverage_inventor_core::ports::{
    BeverageRepository, EventPublisher, Notifier, RecipeGenerator, TaskManager,
};
use beverage_inventor_pipeline::{Pipeline, PipelineEnvironment};
use beverage_inventor_redpanda::{Dispatcher, RedpandaConsumer, RedpandaPublisher};
use beverage_inventor_resilience::metrics::MetricsServer;
use beverage_inventor_resilience::{Executor, registry};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Collaborators for `config`, publishing through `publisher` and storing in
/// `repository`.
///
/// The AI generator is added when a provider with a key is configured. Task
/// creation and notification fall back to logging stand-ins when their
/// endpoints are unset.
pub fn environment(
    config: &ServiceConfig,
    publisher: Arc<dyn EventPublisher>,
    repository: Arc<dyn BeverageRepository>,
) -> PipelineEnvironment {
    let catalog = Arc::new(IngredientCatalog::standard());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let task_manager: Arc<dyn TaskManager> = match (
        &config.external_services.task_api_url,
        &config.external_services.task_api_token,
    ) {
        (Some(url), Some(token)) => {
            info!(url = %url, "Creating tasks through the task API");
            Arc::new(HttpTaskManager::new(url.clone(), token.clone()))
        }
        _ => {
            warn!("No task API configured, tasks will only be logged");
            Arc::new(LoggingTaskManager::new())
        }
    };

    let notifier: Arc<dyn Notifier> = match &config.external_services.slack_webhook_url {
        Some(url) => Arc::new(SlackNotifier::new(url.clone())),
        None => {
            warn!("No Slack webhook configured, notifications will only be logged");
            Arc::new(LoggingNotifier)
        }
    };

    let env = PipelineEnvironment {
        generator: Arc::new(RuleBasedGenerator::new(Arc::clone(&catalog), Arc::clone(&clock))),
        ai_generator: None,
        nutrition: Arc::new(CatalogNutritionAnalyzer::new(Arc::clone(&catalog))),
        cost: Arc::new(CatalogCostAnalyzer::new(Arc::clone(&catalog))),
        compatibility: Arc::new(RuleCompatibilityAnalyzer::new(Arc::clone(&catalog))),
        optimizer: None,
        repository,
        publisher,
        task_manager,
        notifier,
        clock: Arc::clone(&clock),
    }
    .with_optimizer(Arc::new(VariationOptimizer::new(Arc::clone(&catalog))));

    match ai_generator(config, catalog, clock) {
        Some(generator) => env.with_ai_generator(generator),
        None => env,
    }
}

fn ai_generator(
    config: &ServiceConfig,
    catalog: Arc<IngredientCatalog>,
    clock: Arc<dyn Clock>,
) -> Option<Arc<dyn RecipeGenerator>> {
    let Some(provider) = config.ai_provider() else {
        info!("No AI provider configured, recipes come from the rule-based generator");
        return None;
    };
    match LlmClient::new(provider.settings.clone()) {
        Ok(client) => {
            info!(provider = %provider.name, model = %provider.settings.model, "AI generation enabled");
            Some(Arc::new(LlmRecipeGenerator::new(
                client,
                RuleBasedGenerator::new(catalog, clock),
            )))
        }
        Err(err) => {
            warn!(provider = %provider.name, error = %err, "AI provider unusable, continuing without it");
            None
        }
    }
}

fn publisher(config: &ServiceConfig) -> anyhow::Result<RedpandaPublisher> {
    let kafka = &config.kafka;
    let publisher = RedpandaPublisher::builder()
        .brokers(kafka.bootstrap_servers())
        .topic(&kafka.topics.beverage_events)
        .acks(&kafka.producer_acks)
        .batch_timeout(Duration::from_millis(kafka.batch_timeout_ms))
        .compression(&kafka.compression)
        .security(kafka.security.clone())
        .build()
        .context("failed to create the Redpanda producer")?;

    if config.strict_boot {
        let brokers = publisher
            .probe(Duration::from_millis(kafka.connect_timeout_ms))
            .context("brokers unreachable at boot and strict_boot is set")?;
        info!(brokers, "Broker probe succeeded");
    }
    Ok(publisher)
}

fn consumer(config: &ServiceConfig) -> anyhow::Result<RedpandaConsumer> {
    let kafka = &config.kafka;
    RedpandaConsumer::builder()
        .brokers(kafka.bootstrap_servers())
        .group_id(&kafka.group_id)
        .auto_offset_reset(&kafka.auto_offset_reset)
        .session_timeout(Duration::from_millis(kafka.session_timeout_ms))
        .queue_capacity(kafka.queue_capacity)
        .redelivery_delay(Duration::from_millis(kafka.redelivery_delay_ms))
        .security(kafka.security.clone())
        .build()
        .context("invalid consumer settings")
}

fn serve(listener: TcpListener, router: axum::Router, rx: tokio::sync::watch::Receiver<bool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown::wait(rx))
            .await
        {
            error!(error = %err, "HTTP listener failed");
        }
    })
}

/// Run the service until Ctrl+C or SIGTERM.
///
/// # Errors
///
/// Startup failures only: an unusable configuration, a listener that cannot
/// bind, a consumer that cannot subscribe, or unreachable brokers under
/// `strict_boot`. Problems after startup are logged.
#[allow(clippy::too_many_lines)]
pub async fn run(config: ServiceConfig) -> anyhow::Result<()> {
    info!(
        environment = %config.environment,
        brokers = %config.kafka.bootstrap_servers(),
        group_id = %config.kafka.group_id,
        "Starting beverage inventor"
    );

    let metrics = if config.server.metrics_enabled {
        let mut server = MetricsServer::new(config.server.metrics_addr()?);
        server.start().context("failed to install the metrics recorder")?;
        Some(Arc::new(server))
    } else {
        None
    };

    let registry = registry::init_global(config.registry());
    let publisher = Arc::new(publisher(&config)?);
    let repository: Arc<dyn BeverageRepository> = Arc::new(InMemoryBeverageRepository::new());
    let env = environment(&config, Arc::clone(&publisher) as Arc<dyn EventPublisher>, repository);
    let pipeline = Arc::new(Pipeline::new(
        env,
        Executor::new(Arc::clone(&registry)),
        config.pipeline.clone(),
    ));

    let consumer = consumer(&config)?;
    let running = consumer.running();
    let mut dispatcher = Dispatcher::new(Arc::clone(&pipeline) as _, config.kafka.topics.inbound());
    if let Some(deadline) = config.pipeline.deadline() {
        dispatcher = dispatcher.with_deadline(deadline);
    }

    let shutdown = Shutdown::new();
    let mut consumer_task = {
        let dispatcher = Arc::new(dispatcher);
        let rx = shutdown.subscribe();
        tokio::spawn(async move { consumer.run(dispatcher, rx).await })
    };

    let mut state = AppState::new(Arc::clone(&pipeline), Arc::clone(&registry), running);
    if let Some(metrics) = &metrics {
        state = state.with_metrics(Arc::clone(metrics));
    }

    let http_addr = config.server.http_addr()?;
    let listener = TcpListener::bind(http_addr)
        .await
        .with_context(|| format!("failed to bind {http_addr}"))?;
    info!(addr = %http_addr, "HTTP server listening");
    let http_task = serve(listener, http::router(state.clone()), shutdown.subscribe());

    let metrics_task = match &metrics {
        Some(server) => {
            let listener = TcpListener::bind(server.addr())
                .await
                .with_context(|| format!("failed to bind {}", server.addr()))?;
            info!(addr = %server.addr(), "Metrics listening");
            Some(serve(listener, http::metrics_router(state), shutdown.subscribe()))
        }
        None => None,
    };

    let mut startup_error = None;
    tokio::select! {
        () = shutdown::signal() => {}
        outcome = &mut consumer_task => {
            match outcome {
                Ok(Ok(())) => warn!("Consumer stopped on its own"),
                Ok(Err(err)) => {
                    error!(error = %err, "Consumer failed");
                    startup_error = Some(anyhow::Error::new(err).context("consumer failed"));
                }
                Err(err) => error!(error = %err, "Consumer task panicked"),
            }
        }
    }

    shutdown.trigger();
    let grace = config.server.shutdown_timeout();

    if !consumer_task.is_finished() {
        match tokio::time::timeout(grace, &mut consumer_task).await {
            Ok(Ok(Ok(()))) => info!("Consumer drained"),
            Ok(Ok(Err(err))) => error!(error = %err, "Consumer failed while draining"),
            Ok(Err(err)) => error!(error = %err, "Consumer task panicked"),
            Err(_) => {
                warn!(timeout_secs = grace.as_secs(), "Consumer did not drain in time");
                consumer_task.abort();
            }
        }
    }

    for task in std::iter::once(http_task).chain(metrics_task) {
        if tokio::time::timeout(grace, task).await.is_err() {
            warn!("Listener did not stop in time");
        }
    }

    if let Err(err) = publisher.flush(grace) {
        error!(error = %err, "Producer flush incomplete");
    }
    registry::teardown();

    match startup_error {
        Some(err) => Err(err),
        None => {
            info!("Shutdown complete");
            Ok(())
        }
    }
}
