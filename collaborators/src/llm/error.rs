//! Error types for the LLM client

use beverage_inventor_core::InventorError;
use thiserror::Error;

/// Errors that can occur when calling the LLM provider
#[derive(Debug, Error)]
pub enum LlmError {
    /// No API key configured
    #[error("Missing LLM API key")]
    MissingApiKey,

    /// HTTP request failed before a response arrived
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// The provider did not answer in time
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Response parsing failed
    #[error("Response parsing failed: {0}")]
    ResponseParseFailed(String),

    /// The response carried no text
    #[error("Response contained no text")]
    EmptyResponse,

    /// Rate limited - too many requests
    #[error("Rate limited - too many requests")]
    RateLimited,

    /// Unauthorized - invalid API key
    #[error("Unauthorized - invalid API key")]
    Unauthorized,

    /// API returned an error
    #[error("API error (status {status}): {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from API
        message: String,
    },
}

impl LlmError {
    /// Classify for the resilience kernel.
    #[must_use]
    pub fn classify(&self, operation: &str) -> InventorError {
        let message = self.to_string();
        match self {
            Self::RateLimited => InventorError::rate_limited(operation, message),
            Self::Timeout(_) => InventorError::timeout(operation, message),
            Self::RequestFailed(_) => InventorError::transient_io(operation, message),
            Self::ApiError { status, .. } if *status == 408 || *status >= 500 => {
                InventorError::transient_io(operation, message)
            }
            Self::MissingApiKey
            | Self::ResponseParseFailed(_)
            | Self::EmptyResponse
            | Self::Unauthorized
            | Self::ApiError { .. } => InventorError::ai_failed(operation, message),
        }
    }
}

impl From<LlmError> for InventorError {
    fn from(err: LlmError) -> Self {
        err.classify("llm.messages")
    }
}
