// Typed ingestion failures
//
// Every failure a device can receive is one of these kinds; callers branch on
// the enum rather than parsing message text.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for ingestion operations.
pub type IngestResult<T> = std::result::Result<T, IngestError>;

/// Deterministic, non-retryable ingestion failures.
///
/// These are hard rejections: no state has changed when one is returned.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IngestError {
    /// Token is not bound to any subject (and enrollment capture is off).
    #[error("token not found")]
    TokenNotFound,

    /// Token exists but is not usable.
    #[error("token is {status} and cannot be used")]
    TokenInactive { status: String },

    /// The employee bound to the token is not active.
    #[error("employee is not active")]
    SubjectInactive,

    /// Same subject tapped again inside the duplicate-suppression window.
    #[error("duplicate event detected, wait {window_secs} seconds between taps")]
    DuplicateEvent { window_secs: i64 },

    /// Payload device id differs from the authenticated device.
    #[error("device id mismatch")]
    DeviceMismatch,
}

impl IngestError {
    pub fn kind(&self) -> FailureKind {
        match self {
            IngestError::TokenNotFound => FailureKind::TokenNotFound,
            IngestError::TokenInactive { .. } => FailureKind::TokenInactive,
            IngestError::SubjectInactive => FailureKind::SubjectInactive,
            IngestError::DuplicateEvent { .. } => FailureKind::DuplicateEvent,
            IngestError::DeviceMismatch => FailureKind::DeviceMismatch,
        }
    }
}

/// Wire identifier for a failure class, carried on non-2xx responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    TokenNotFound,
    TokenInactive,
    SubjectInactive,
    DuplicateEvent,
    DeviceMismatch,
    Unauthorized,
    Internal,
}
