//! Failure classification shared by the HTTP adapters.

use beverage_inventor_core::InventorError;
use reqwest::StatusCode;

/// Longest response body quoted in an error message.
const MAX_BODY_CHARS: usize = 200;

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_BODY_CHARS {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(MAX_BODY_CHARS).collect();
        format!("{cut}...")
    }
}

/// Classify a non-success status.
///
/// 429 is `rate_limited`, 408 and 5xx are `transient_io`, every other
/// status is `permanent_io`.
#[must_use]
pub fn classify_status(operation: &str, status: StatusCode, body: &str) -> InventorError {
    let message = format!("HTTP {}: {}", status.as_u16(), excerpt(body));
    if status == StatusCode::TOO_MANY_REQUESTS {
        InventorError::rate_limited(operation, message)
    } else if status == StatusCode::REQUEST_TIMEOUT || status.is_server_error() {
        InventorError::transient_io(operation, message)
    } else {
        InventorError::permanent_io(operation, message)
    }
}

/// Classify a transport error raised before a status was received.
#[must_use]
pub fn classify_transport(operation: &str, err: &reqwest::Error) -> InventorError {
    if err.is_timeout() {
        InventorError::timeout(operation, err.to_string())
    } else if let Some(status) = err.status() {
        classify_status(operation, status, &err.to_string())
    } else if err.is_decode() || err.is_builder() {
        InventorError::permanent_io(operation, err.to_string())
    } else {
        InventorError::transient_io(operation, err.to_string())
    }
}
