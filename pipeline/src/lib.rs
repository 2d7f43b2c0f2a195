//! # Beverage Inventor Pipeline
//!
//! The staged request pipeline and the operations on persisted beverages.
//!
//! ## Stages
//!
//! 1. **Validate**: ingredients, theme and creator must be present
//! 2. **Default**: serving size, batch size and analysis level
//! 3. **Generate**: AI generator under the `ai_provider` profile, falling
//!    back to the rule-based generator
//! 4. **Assign creator**
//! 5. **Enhanced analysis**: nutrition, cost and compatibility
//! 6. **Constraint check**
//! 7. **Optimize**: adopt the optimized recipe above the adoption threshold
//! 8. **Persist** under the `database` profile
//! 9. **Publish** `beverage_created` under the `event_bus` profile
//! 10. **Task** and 11. **Notify** under the `external_api` profile
//!
//! Stages 1 and 8 are terminal. Every other failure is recorded as a
//! warning and the run continues.
//!
//! ## Other operations
//!
//! [`Pipeline::get_beverage`], [`Pipeline::list_beverages`],
//! [`Pipeline::update_status`], [`Pipeline::update_beverage`] and
//! [`Pipeline::analyze_beverage`].

pub mod analysis;
pub mod config;
pub mod constraints;
pub mod environment;
pub mod fanout;
mod lifecycle;
pub mod pipeline;
mod report;

pub use config::PipelineConfig;
pub use environment::PipelineEnvironment;
pub use pipeline::{
    Pipeline, ADOPTED_RECOMMENDATION, AI_FALLBACK_WARNING, TASK_CIRCUIT_OPEN_WARNING,
};
