//! Operations on persisted beverages: lookup, status changes, edits and
//! standalone analysis.

use crate::analysis::{self, AnalysisInputs};
use crate::pipeline::{Pipeline, REPOSITORY_FIND, REPOSITORY_LIST, REPOSITORY_SAVE};
use beverage_inventor_core::event::FieldChange;
use beverage_inventor_core::ports::BeverageFilter;
use beverage_inventor_core::request::{DEFAULT_BATCH_SIZE, DEFAULT_SERVING_SIZE_ML};
use beverage_inventor_core::{
    AnalysisLevel, Beverage, BeverageEvent, BeverageId, BeverageStatus, DependencyKind,
    ErrorKind, InventorError, Response, Result,
};
use beverage_inventor_resilience::CallSpec;
use serde::Serialize;
use std::collections::BTreeMap;

impl Pipeline {
    /// Load a beverage.
    ///
    /// # Errors
    ///
    /// `not_found` if no beverage has this id, otherwise the repository's
    /// classified error.
    pub async fn get_beverage(&self, id: BeverageId) -> Result<Beverage> {
        let repository = &self.env.repository;
        self.executor
            .execute_call(CallSpec::new(REPOSITORY_FIND, DependencyKind::Database), |ctx| async move {
                repository.find_by_id(&ctx, id).await
            })
            .await?
            .ok_or_else(|| InventorError::not_found(REPOSITORY_FIND, format!("beverage {id} not found")))
    }

    /// List beverages matching `filter`, newest first.
    ///
    /// # Errors
    ///
    /// The repository's classified error.
    pub async fn list_beverages(&self, filter: &BeverageFilter) -> Result<Vec<Beverage>> {
        let repository = &self.env.repository;
        self.executor
            .execute_call(CallSpec::new(REPOSITORY_LIST, DependencyKind::Database), |ctx| async move {
                repository.list(&ctx, filter).await
            })
            .await
    }

    /// Move a beverage to `status` and announce the change.
    ///
    /// Publishing is best effort; a failed publish is logged and the updated
    /// beverage is still returned.
    ///
    /// # Errors
    ///
    /// - `not_found` if the beverage does not exist
    /// - `invalid_request` if the transition is not allowed
    /// - `persist_failed` if the save fails
    pub async fn update_status(&self, id: BeverageId, status: BeverageStatus) -> Result<Beverage> {
        let mut beverage = self.get_beverage(id).await?;
        let old = beverage.status;
        if !old.can_transition_to(status) {
            return Err(InventorError::invalid_request(
                "pipeline.update_status",
                format!("cannot move beverage {id} from {old} to {status}"),
            ));
        }
        if old == status {
            return Ok(beverage);
        }

        beverage.status = status;
        self.save(&beverage).await?;
        tracing::info!(beverage_id = %id, from = %old, to = %status, "Beverage status updated");

        let event = BeverageEvent::status_changed(&beverage, old, &self.config.service_name, self.env.clock.now());
        if let Err(err) = self.publish(&event, "", None).await {
            tracing::warn!(beverage_id = %id, error = %err, "Failed to publish status change");
        }
        Ok(beverage)
    }

    /// Replace a stored beverage and announce what changed.
    ///
    /// # Errors
    ///
    /// - `invalid_request` if the beverage is malformed or its status change
    ///   is not allowed
    /// - `not_found` if no beverage has this id
    /// - `persist_failed` if the save fails
    pub async fn update_beverage(&self, beverage: Beverage) -> Result<Beverage> {
        beverage.validate()?;
        let current = self.get_beverage(beverage.id).await?;
        if !current.status.can_transition_to(beverage.status) {
            return Err(InventorError::invalid_request(
                "pipeline.update_beverage",
                format!(
                    "cannot move beverage {} from {} to {}",
                    beverage.id, current.status, beverage.status
                ),
            ));
        }

        let changes = changes(&current, &beverage);
        if changes.is_empty() {
            return Ok(beverage);
        }
        self.save(&beverage).await?;
        tracing::info!(
            beverage_id = %beverage.id,
            fields = ?changes.keys().collect::<Vec<_>>(),
            "Beverage updated"
        );

        let event = BeverageEvent::updated(&beverage, changes, &self.config.service_name, self.env.clock.now());
        if let Err(err) = self.publish(&event, "", None).await {
            tracing::warn!(beverage_id = %beverage.id, error = %err, "Failed to publish beverage update");
        }
        Ok(beverage)
    }

    /// Run the enhanced analysis on a stored beverage without saving anything.
    ///
    /// Uses the default serving and batch sizes.
    ///
    /// # Errors
    ///
    /// `not_found` if the beverage does not exist; analysis failures become
    /// warnings on the response.
    pub async fn analyze_beverage(&self, id: BeverageId, level: AnalysisLevel) -> Result<Response> {
        let beverage = self.get_beverage(id).await?;
        let mut response = Response::new(beverage);
        let deadline = self.config.deadline().map(|d| tokio::time::Instant::now() + d);

        let outcome = analysis::run(
            &self.executor,
            &self.env,
            AnalysisInputs {
                beverage: &response.beverage,
                serving_size: DEFAULT_SERVING_SIZE_ML,
                batch_size: DEFAULT_BATCH_SIZE,
                level,
                profile: None,
                market: None,
                deadline,
                correlation_id: "",
            },
            self.config.concurrent_analysis,
        )
        .await;
        analysis::apply(outcome, None, &mut response);
        Ok(response)
    }

    async fn save(&self, beverage: &Beverage) -> Result<()> {
        let repository = &self.env.repository;
        self.executor
            .execute_call(CallSpec::new(REPOSITORY_SAVE, DependencyKind::Database), |ctx| async move {
                repository.save(&ctx, beverage).await
            })
            .await
            .map_err(|err| InventorError::escalate(ErrorKind::PersistFailed, &err))
    }
}

fn json<T: Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or_default()
}

/// Field-level differences between two versions of a beverage.
fn changes(old: &Beverage, new: &Beverage) -> BTreeMap<String, FieldChange> {
    let fields = [
        ("name", json(&old.name), json(&new.name)),
        ("description", json(&old.description), json(&new.description)),
        ("theme", json(&old.theme), json(&new.theme)),
        ("status", json(&old.status), json(&new.status)),
        ("ingredients", json(&old.ingredients), json(&new.ingredients)),
        ("metadata", json(&old.metadata), json(&new.metadata)),
    ];
    fields
        .into_iter()
        .filter(|(_, before, after)| before != after)
        .map(|(field, old, new)| (field.to_string(), FieldChange { old, new }))
        .collect()
}
