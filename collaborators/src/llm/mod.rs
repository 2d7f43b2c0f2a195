//! LLM provider adapter.
//!
//! A Messages API client plus the [`LlmRecipeGenerator`] built on it.

pub mod client;
pub mod error;
pub mod generator;
pub mod messages;

pub use client::{LlmClient, LlmSettings};
pub use error::LlmError;
pub use generator::{LlmRecipeGenerator, AI_ENHANCED_TAG};
