//! Classified errors.
//!
//! Every failure that crosses a component boundary carries its [`ErrorKind`]
//! as data. Callers switch on the kind, never on the concrete error type.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result alias used throughout the workspace.
pub type Result<T, E = InventorError> = std::result::Result<T, E>;

/// Taxonomy of failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Request failed validation
    InvalidRequest,
    /// Lookup found nothing
    NotFound,
    /// Circuit breaker rejected the call
    CircuitOpen,
    /// Rate limiter (local or upstream) rejected the call
    RateLimited,
    /// Deadline elapsed before the call completed
    Timeout,
    /// Retryable network or 5xx failure
    TransientIo,
    /// Non-retryable 4xx or protocol failure
    PermanentIo,
    /// Beverage could not be persisted
    PersistFailed,
    /// Event could not be published
    PublishFailed,
    /// AI provider failed
    AiFailed,
    /// Optimization weights are inconsistent
    InvalidObjectives,
    /// Anything unclassified
    Internal,
}

impl ErrorKind {
    /// All kinds, in taxonomy order.
    pub const ALL: [Self; 12] = [
        Self::InvalidRequest,
        Self::NotFound,
        Self::CircuitOpen,
        Self::RateLimited,
        Self::Timeout,
        Self::TransientIo,
        Self::PermanentIo,
        Self::PersistFailed,
        Self::PublishFailed,
        Self::AiFailed,
        Self::InvalidObjectives,
        Self::Internal,
    ];

    /// Wire name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::NotFound => "not_found",
            Self::CircuitOpen => "circuit_open",
            Self::RateLimited => "rate_limited",
            Self::Timeout => "timeout",
            Self::TransientIo => "transient_io",
            Self::PermanentIo => "permanent_io",
            Self::PersistFailed => "persist_failed",
            Self::PublishFailed => "publish_failed",
            Self::AiFailed => "ai_failed",
            Self::InvalidObjectives => "invalid_objectives",
            Self::Internal => "internal",
        }
    }

    /// Kinds a retry loop may try again.
    ///
    /// `circuit_open` is listed here but the default retry predicate only
    /// honours it when the breaker reopens within the next backoff delay.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::TransientIo | Self::RateLimited | Self::CircuitOpen
        )
    }

    /// Kinds that abort the pipeline.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::InvalidRequest | Self::InvalidObjectives | Self::PersistFailed
        )
    }

    /// Whether a failure of this kind counts against a circuit breaker.
    ///
    /// Caller mistakes and the breaker's own rejections do not.
    #[must_use]
    pub const fn counts_as_failure(self) -> bool {
        !matches!(
            self,
            Self::InvalidRequest | Self::NotFound | Self::InvalidObjectives | Self::CircuitOpen
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified error: kind, the operation that produced it, and a one-line message.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{kind}: {operation}: {message}")]
pub struct InventorError {
    /// Failure kind
    pub kind: ErrorKind,
    /// Operation name (e.g. `repository.save`)
    pub operation: String,
    /// Human readable, single line
    pub message: String,
    /// Time until the rejecting component admits calls again, if known
    #[serde(skip)]
    pub retry_after: Option<Duration>,
}

impl InventorError {
    /// Create an error of the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind, operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            operation: operation.into(),
            message: message.into(),
            retry_after: None,
        }
    }

    /// `invalid_request`
    #[must_use]
    pub fn invalid_request(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequest, operation, message)
    }

    /// `not_found`
    #[must_use]
    pub fn not_found(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, operation, message)
    }

    /// `circuit_open`, with the time until the breaker admits a probe.
    #[must_use]
    pub fn circuit_open(operation: impl Into<String>, retry_after: Duration) -> Self {
        Self {
            retry_after: Some(retry_after),
            ..Self::new(ErrorKind::CircuitOpen, operation, "circuit breaker is open")
        }
    }

    /// `rate_limited`
    #[must_use]
    pub fn rate_limited(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RateLimited, operation, message)
    }

    /// `timeout`
    #[must_use]
    pub fn timeout(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, operation, message)
    }

    /// `transient_io`
    #[must_use]
    pub fn transient_io(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TransientIo, operation, message)
    }

    /// `permanent_io`
    #[must_use]
    pub fn permanent_io(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PermanentIo, operation, message)
    }

    /// `ai_failed`
    #[must_use]
    pub fn ai_failed(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AiFailed, operation, message)
    }

    /// `invalid_objectives`
    #[must_use]
    pub fn invalid_objectives(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidObjectives, operation, message)
    }

    /// `internal`
    #[must_use]
    pub fn internal(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, operation, message)
    }

    /// Re-tag `cause` as a different kind, keeping its operation and message.
    #[must_use]
    pub fn escalate(kind: ErrorKind, cause: &Self) -> Self {
        Self::new(
            kind,
            cause.operation.clone(),
            format!("{}: {}", cause.kind, cause.message),
        )
    }

    /// Whether the kind is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// Whether the kind aborts the pipeline.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.kind.is_terminal()
    }

    /// Shorthand for `self.kind == ErrorKind::CircuitOpen`.
    #[must_use]
    pub fn is_circuit_open(&self) -> bool {
        self.kind == ErrorKind::CircuitOpen
    }
}

impl From<serde_json::Error> for InventorError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid_request("decode", err.to_string())
    }
}
