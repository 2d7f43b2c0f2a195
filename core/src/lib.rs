//! # Beverage Inventor Core
//!
//! Domain types shared by every crate of the beverage inventor service.
//!
//! ## Contents
//!
//! - **Domain model**: [`Beverage`], [`Ingredient`], [`BeverageStatus`] and metadata
//! - **Requests**: [`Request`] and its [`RequestBuilder`], which resolves defaults
//! - **Responses**: [`Response`] plus the analysis bundles in [`analysis`]
//! - **Errors**: [`InventorError`] carrying an [`ErrorKind`] as data
//! - **Events**: outbound [`BeverageEvent`] envelopes and the inbound payloads
//! - **Capabilities**: the collaborator traits in [`ports`]
//! - **Environment**: the [`Clock`](environment::Clock) abstraction
//!
//! ## Example
//!
//! ```
//! use beverage_inventor_core::Request;
//!
//! let request = Request::builder()
//!     .ingredients(["espresso", "whole milk"])
//!     .theme("comfort")
//!     .created_by("u1")
//!     .build();
//!
//! assert!(request.validate().is_ok());
//! assert_eq!(request.batch_size, 1);
//! ```

pub mod analysis;
pub mod beverage;
pub mod environment;
pub mod error;
pub mod event;
pub mod ports;
pub mod request;
pub mod response;

pub use beverage::{Beverage, BeverageId, BeverageMetadata, BeverageStatus, Ingredient, NutritionalInfo};
pub use error::{ErrorKind, InventorError, Result};
pub use event::{BeverageEvent, EventType, MessageHeaders};
pub use ports::{CallContext, DependencyKind};
pub use request::{AnalysisLevel, Request, RequestBuilder};
pub use response::Response;

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
