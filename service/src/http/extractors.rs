//! Request extractors.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

/// Correlation id header.
pub const CORRELATION_ID_HEADER: &str = "X-Correlation-ID";

/// The caller's `X-Correlation-ID`.
///
/// Rejects when the header is missing or blank, so handlers take
/// `Option<CorrelationId>` and fall back to the id in the body or a fresh one.
///
/// ```ignore
/// async fn handler(correlation_id: Option<CorrelationId>) -> String {
///     correlation_id.map(|c| c.0).unwrap_or_default()
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationId(pub String);

/// Missing or unreadable correlation id.
#[derive(Debug, Clone, Copy)]
pub struct MissingCorrelationId;

impl axum::response::IntoResponse for MissingCorrelationId {
    fn into_response(self) -> axum::response::Response {
        (
            axum::http::StatusCode::BAD_REQUEST,
            format!("missing {CORRELATION_ID_HEADER} header"),
        )
            .into_response()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = MissingCorrelationId;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(CORRELATION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| Self(s.to_string()))
            .ok_or(MissingCorrelationId)
    }
}
