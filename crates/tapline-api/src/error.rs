// API error type
//
// Every failing response carries a machine-readable kind next to the human
// message, so devices branch on the kind and never parse text.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tapline_core::{FailureBody, FailureKind, IngestError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Deterministic ingestion rejection (never retried by agents).
    #[error(transparent)]
    Ingest(#[from] IngestError),

    /// Missing or unknown device credential.
    #[error("invalid or missing device API key")]
    Unauthorized,

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Ingest(IngestError::TokenNotFound) => StatusCode::NOT_FOUND,
            ApiError::Ingest(IngestError::DuplicateEvent { .. }) => StatusCode::CONFLICT,
            ApiError::Ingest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> FailureKind {
        match self {
            ApiError::Ingest(err) => err.kind(),
            ApiError::Unauthorized => FailureKind::Unauthorized,
            ApiError::Internal(_) => FailureKind::Internal,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            // Internal details stay in the logs, not on the wire
            ApiError::Internal(err) => {
                tracing::error!("internal error: {err:#}");
                "internal error".to_string()
            }
            other => other.to_string(),
        };

        let body = FailureBody {
            error: self.kind(),
            message,
        };

        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ingest_errors_map_to_expected_statuses() {
        let cases = [
            (
                ApiError::Ingest(IngestError::TokenNotFound),
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError::Ingest(IngestError::DuplicateEvent { window_secs: 60 }),
                StatusCode::CONFLICT,
            ),
            (
                ApiError::Ingest(IngestError::DeviceMismatch),
                StatusCode::BAD_REQUEST,
            ),
            (ApiError::Unauthorized, StatusCode::UNAUTHORIZED),
        ];
        for (err, status) in cases {
            assert_eq!(err.status(), status);
        }
    }
}
