//! LLM provider HTTP client

use super::error::LlmError;
use super::messages::{MessagesRequest, MessagesResponse};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

/// Default Messages API base URL.
pub const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1";

/// Default model.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";

const API_VERSION: &str = "2023-06-01";

/// Connection settings for the provider.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Base URL; `/messages` is appended
    pub api_url: String,
    /// API key
    pub api_key: String,
    /// Model name
    pub model: String,
    /// Completion budget per call
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 1500,
            temperature: 0.3,
        }
    }
}

/// Messages API client
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    settings: LlmSettings,
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("api_url", &self.settings.api_url)
            .field("model", &self.settings.model)
            .finish_non_exhaustive()
    }
}

impl LlmClient {
    /// Create a client
    ///
    /// # Errors
    ///
    /// Returns `LlmError::MissingApiKey` if the key is blank
    pub fn new(settings: LlmSettings) -> Result<Self, LlmError> {
        if settings.api_key.trim().is_empty() {
            return Err(LlmError::MissingApiKey);
        }
        Ok(Self {
            client: Client::new(),
            settings,
        })
    }

    /// Settings in use
    #[must_use]
    pub const fn settings(&self) -> &LlmSettings {
        &self.settings
    }

    /// Create messages (non-streaming)
    ///
    /// # Errors
    ///
    /// Returns errors for network failures, API errors, or parsing failures
    pub async fn messages(&self, request: &MessagesRequest) -> Result<MessagesResponse, LlmError> {
        let response = self
            .client
            .post(format!("{}/messages", self.settings.api_url.trim_end_matches('/')))
            .header("x-api-key", &self.settings.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(e.to_string())
                } else {
                    LlmError::RequestFailed(e.to_string())
                }
            })?;

        match response.status() {
            StatusCode::OK => response
                .json::<MessagesResponse>()
                .await
                .map_err(|e| LlmError::ResponseParseFailed(e.to_string())),
            StatusCode::TOO_MANY_REQUESTS => Err(LlmError::RateLimited),
            StatusCode::UNAUTHORIZED => Err(LlmError::Unauthorized),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(LlmError::ApiError {
                    status: status.as_u16(),
                    message: body,
                })
            }
        }
    }

    /// Send one prompt with the configured model, budget and temperature and
    /// return the reply text.
    ///
    /// # Errors
    ///
    /// As [`messages`](Self::messages), plus `EmptyResponse` for a reply
    /// without text
    pub async fn complete(&self, system: &str, prompt: &str) -> Result<String, LlmError> {
        let request = MessagesRequest::new(self.settings.model.clone(), prompt)
            .with_system(system)
            .with_max_tokens(self.settings.max_tokens)
            .with_temperature(self.settings.temperature);
        let text = self.messages(&request).await?.text();
        if text.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(text)
    }
}
