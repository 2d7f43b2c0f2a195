//! Collaborator doubles.
//!
//! Every double records its calls so tests can assert on what the pipeline
//! asked for as well as what it produced:
//! - [`RecordingPublisher`]: keeps published events, optionally failing
//! - [`FlakyTaskManager`] / [`FlakyRepository`]: fail per a [`FailureScript`], then succeed
//! - [`RecordingNotifier`]: keeps `(channel, message)` pairs
//! - [`FailingAiGenerator`]: always fails with a fixed error
//! - [`StubGenerator`]: returns a fixed beverage

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Panics only on poisoned locks

use async_trait::async_trait;
use beverage_inventor_core::ports::{
    BeverageFilter, BeverageRepository, EventPublisher, GeneratedRecipe, Notifier,
    RecipeGenerator, TaskManager, TaskSpec,
};
use beverage_inventor_core::{
    Beverage, BeverageEvent, BeverageId, CallContext, InventorError, Request, Result,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A queue of errors handed out one per call, after which calls succeed.
///
/// A script built with [`FailureScript::always`] never runs dry.
#[derive(Debug, Clone, Default)]
pub struct FailureScript {
    queue: Arc<Mutex<VecDeque<InventorError>>>,
    forever: Option<InventorError>,
}

impl FailureScript {
    /// Script that never fails.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Fail `times` times with `error`, then succeed.
    #[must_use]
    pub fn times(error: &InventorError, times: usize) -> Self {
        Self {
            queue: Arc::new(Mutex::new(std::iter::repeat_n(error.clone(), times).collect())),
            forever: None,
        }
    }

    /// Fail every call with `error`.
    #[must_use]
    pub fn always(error: InventorError) -> Self {
        Self {
            queue: Arc::default(),
            forever: Some(error),
        }
    }

    /// Take the next scripted outcome.
    ///
    /// # Errors
    ///
    /// The scripted error, if any remain.
    pub fn next(&self) -> Result<()> {
        if let Some(err) = self.queue.lock().unwrap().pop_front() {
            return Err(err);
        }
        self.forever.clone().map_or(Ok(()), Err)
    }
}

/// Records every published event.
#[derive(Debug, Clone, Default)]
pub struct RecordingPublisher {
    events: Arc<Mutex<Vec<BeverageEvent>>>,
    script: FailureScript,
}

impl RecordingPublisher {
    /// Publisher that always succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publisher whose calls follow `script`.
    #[must_use]
    pub fn failing(script: FailureScript) -> Self {
        Self {
            events: Arc::default(),
            script,
        }
    }

    /// Events published so far.
    #[must_use]
    pub fn events(&self) -> Vec<BeverageEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish_event(&self, _ctx: &CallContext, event: &BeverageEvent) -> Result<()> {
        self.script.next()?;
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Task manager that fails per a script and counts calls.
#[derive(Debug, Clone, Default)]
pub struct FlakyTaskManager {
    calls: Arc<AtomicUsize>,
    tasks: Arc<Mutex<Vec<TaskSpec>>>,
    script: FailureScript,
}

impl FlakyTaskManager {
    /// Manager whose calls follow `script`.
    #[must_use]
    pub fn new(script: FailureScript) -> Self {
        Self {
            script,
            ..Self::default()
        }
    }

    /// Manager that always succeeds.
    #[must_use]
    pub fn healthy() -> Self {
        Self::default()
    }

    /// Calls received, including failed ones.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Tasks created successfully.
    #[must_use]
    pub fn tasks(&self) -> Vec<TaskSpec> {
        self.tasks.lock().unwrap().clone()
    }
}

#[async_trait]
impl TaskManager for FlakyTaskManager {
    async fn create_task(&self, _ctx: &CallContext, task: &TaskSpec) -> Result<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.script.next()?;
        self.tasks.lock().unwrap().push(task.clone());
        Ok(format!("task-{n}"))
    }
}

/// Records every notification.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    messages: Arc<Mutex<Vec<(String, String)>>>,
    script: FailureScript,
}

impl RecordingNotifier {
    /// Notifier that always succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifier whose calls follow `script`.
    #[must_use]
    pub fn failing(script: FailureScript) -> Self {
        Self {
            messages: Arc::default(),
            script,
        }
    }

    /// `(channel, message)` pairs sent so far.
    #[must_use]
    pub fn messages(&self) -> Vec<(String, String)> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_message(&self, _ctx: &CallContext, channel: &str, message: &str) -> Result<()> {
        self.script.next()?;
        self.messages
            .lock()
            .unwrap()
            .push((channel.to_string(), message.to_string()));
        Ok(())
    }
}

/// AI generator that always fails.
#[derive(Debug, Clone)]
pub struct FailingAiGenerator {
    error: InventorError,
    calls: Arc<AtomicUsize>,
}

impl FailingAiGenerator {
    /// Generator failing with `error`.
    #[must_use]
    pub fn new(error: InventorError) -> Self {
        Self {
            error,
            calls: Arc::default(),
        }
    }

    /// Calls received.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecipeGenerator for FailingAiGenerator {
    async fn generate_recipe(&self, _ctx: &CallContext, _request: &Request) -> Result<GeneratedRecipe> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }
}

/// Generator that returns a copy of a fixed beverage.
#[derive(Debug, Clone)]
pub struct StubGenerator {
    beverage: Beverage,
    warnings: Vec<String>,
}

impl StubGenerator {
    /// Generator returning `beverage`.
    #[must_use]
    pub const fn new(beverage: Beverage) -> Self {
        Self {
            beverage,
            warnings: Vec::new(),
        }
    }

    /// Also report `warnings`.
    #[must_use]
    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }
}

#[async_trait]
impl RecipeGenerator for StubGenerator {
    async fn generate_recipe(&self, _ctx: &CallContext, _request: &Request) -> Result<GeneratedRecipe> {
        Ok(GeneratedRecipe {
            beverage: self.beverage.clone(),
            warnings: self.warnings.clone(),
        })
    }
}

/// In-memory repository whose saves follow a script.
#[derive(Debug, Clone, Default)]
pub struct FlakyRepository {
    beverages: Arc<Mutex<HashMap<BeverageId, Beverage>>>,
    save_calls: Arc<AtomicUsize>,
    save_script: FailureScript,
}

impl FlakyRepository {
    /// Repository whose saves follow `script`.
    #[must_use]
    pub fn new(save_script: FailureScript) -> Self {
        Self {
            save_script,
            ..Self::default()
        }
    }

    /// Repository that always succeeds.
    #[must_use]
    pub fn healthy() -> Self {
        Self::default()
    }

    /// Insert without going through `save`.
    pub fn seed(&self, beverage: Beverage) {
        self.beverages.lock().unwrap().insert(beverage.id, beverage);
    }

    /// Save calls received, including failed ones.
    #[must_use]
    pub fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }

    /// Stored beverage by id.
    #[must_use]
    pub fn stored(&self, id: BeverageId) -> Option<Beverage> {
        self.beverages.lock().unwrap().get(&id).cloned()
    }

    /// Number of stored beverages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.beverages.lock().unwrap().len()
    }

    /// Whether nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BeverageRepository for FlakyRepository {
    async fn save(&self, _ctx: &CallContext, beverage: &Beverage) -> Result<()> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        self.save_script.next()?;
        self.beverages
            .lock()
            .unwrap()
            .insert(beverage.id, beverage.clone());
        Ok(())
    }

    async fn find_by_id(&self, _ctx: &CallContext, id: BeverageId) -> Result<Option<Beverage>> {
        Ok(self.stored(id))
    }

    async fn list(&self, _ctx: &CallContext, filter: &BeverageFilter) -> Result<Vec<Beverage>> {
        let mut found: Vec<Beverage> = self
            .beverages
            .lock()
            .unwrap()
            .values()
            .filter(|b| filter.matches(b))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = filter.limit {
            found.truncate(limit);
        }
        Ok(found)
    }
}
