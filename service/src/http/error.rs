//! Classified errors as HTTP responses.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use beverage_inventor_core::{ErrorKind, InventorError};
use std::fmt;

/// An [`InventorError`] on its way to the client.
///
/// The body is `{"kind", "operation", "message"}`. `circuit_open` responses
/// carry `Retry-After` when the breaker reports when it will admit a probe.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: InventorError,
}

impl ApiError {
    /// Status code for a failure kind.
    #[must_use]
    pub const fn status_for(kind: ErrorKind) -> StatusCode {
        match kind {
            ErrorKind::InvalidRequest | ErrorKind::InvalidObjectives => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::CircuitOpen | ErrorKind::RateLimited => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// HTTP status.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// The classified error.
    #[must_use]
    pub const fn error(&self) -> &InventorError {
        &self.error
    }
}

impl From<InventorError> for ApiError {
    fn from(error: InventorError) -> Self {
        Self {
            status: Self::status_for(error.kind),
            error,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        InventorError::invalid_request("http.decode_body", rejection.body_text()).into()
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        InventorError::invalid_request("http.decode_query", rejection.body_text()).into()
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        InventorError::invalid_request("http.decode_path", rejection.body_text()).into()
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.status, self.error)
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(
                status = %self.status,
                kind = %self.error.kind,
                operation = %self.error.operation,
                message = %self.error.message,
                "Request failed"
            );
        } else {
            tracing::debug!(
                status = %self.status,
                kind = %self.error.kind,
                message = %self.error.message,
                "Request rejected"
            );
        }

        let retry_after = self
            .error
            .retry_after
            .map(|d| d.as_secs().max(1))
            .and_then(|secs| HeaderValue::from_str(&secs.to_string()).ok());

        let mut response = (self.status, Json(self.error)).into_response();
        if let Some(value) = retry_after {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        response
    }
}
