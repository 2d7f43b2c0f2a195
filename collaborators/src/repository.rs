//! In-memory beverage repository.
//!
//! Process-local storage for deployments without a database, and the
//! repository the integration tests run against.

use async_trait::async_trait;
use beverage_inventor_core::ports::{BeverageFilter, BeverageRepository};
use beverage_inventor_core::{Beverage, BeverageId, CallContext, InventorError, Result};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// `HashMap`-backed repository.
///
/// `save` is an upsert. Replacing a stored beverage must respect the
/// status lifecycle; a backwards transition is rejected with
/// `invalid_request` and the stored record is left untouched.
///
/// # Example
///
/// ```
/// use beverage_inventor_collaborators::InMemoryBeverageRepository;
/// use beverage_inventor_core::ports::BeverageRepository;
/// use beverage_inventor_core::{Beverage, CallContext, DependencyKind, Ingredient, Utc};
///
/// # async fn example() -> beverage_inventor_core::Result<()> {
/// let repo = InMemoryBeverageRepository::new();
/// let ctx = CallContext::new("repository.save", DependencyKind::Database);
/// let beverage = Beverage::draft("Latte", "Milky", "comfort", vec![Ingredient::new("espresso", 2.0, "shots")], Utc::now());
///
/// repo.save(&ctx, &beverage).await?;
/// assert!(repo.find_by_id(&ctx, beverage.id).await?.is_some());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryBeverageRepository {
    beverages: Arc<RwLock<HashMap<BeverageId, Beverage>>>,
}

impl InMemoryBeverageRepository {
    /// Empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored beverages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.beverages.read().map_or(0, |map| map.len())
    }

    /// Whether nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn poisoned(operation: &str) -> InventorError {
        InventorError::internal(operation, "repository lock poisoned")
    }
}

#[async_trait]
impl BeverageRepository for InMemoryBeverageRepository {
    async fn save(&self, ctx: &CallContext, beverage: &Beverage) -> Result<()> {
        beverage.validate()?;
        let mut map = self
            .beverages
            .write()
            .map_err(|_| Self::poisoned(&ctx.operation))?;

        if let Some(stored) = map.get(&beverage.id) {
            if !stored.status.can_transition_to(beverage.status) {
                return Err(InventorError::invalid_request(
                    ctx.operation.clone(),
                    format!(
                        "beverage {} cannot move from {} to {}",
                        beverage.id, stored.status, beverage.status
                    ),
                ));
            }
        }

        tracing::debug!(operation = %ctx.operation, beverage_id = %beverage.id, "Saving beverage");
        map.insert(beverage.id, beverage.clone());
        Ok(())
    }

    async fn find_by_id(&self, ctx: &CallContext, id: BeverageId) -> Result<Option<Beverage>> {
        let map = self
            .beverages
            .read()
            .map_err(|_| Self::poisoned(&ctx.operation))?;
        Ok(map.get(&id).cloned())
    }

    async fn list(&self, ctx: &CallContext, filter: &BeverageFilter) -> Result<Vec<Beverage>> {
        let map = self
            .beverages
            .read()
            .map_err(|_| Self::poisoned(&ctx.operation))?;

        let mut matching: Vec<Beverage> = map.values().filter(|b| filter.matches(b)).cloned().collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        if let Some(limit) = filter.limit {
            matching.truncate(limit);
        }
        Ok(matching)
    }
}
