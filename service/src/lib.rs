//! # Beverage Inventor
//!
//! The service binary's library half: configuration, tracing setup, the HTTP
//! surface and the wiring that connects the Redpanda consumer and producer to
//! the pipeline.
//!
//! ```text
//!               ┌──────────── POST /invent ────────────┐
//!               │                                      ▼
//!  recipe.requests / ingredient.discovered ─► Dispatcher ─► Pipeline ─► beverage.events
//!                                                          │
//!                                          repository · task API · Slack
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod app;
pub mod config;
pub mod http;
pub mod shutdown;
pub mod telemetry;

pub use config::{ConfigError, ServiceConfig};
