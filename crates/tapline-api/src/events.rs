// Attendance event submission route

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use std::sync::Arc;

use tapline_core::{EventAccepted, EventSubmission, PendingAssignment};
use tapline_storage::StorageBackend;

use crate::auth::authenticate_device;
use crate::error::ApiError;
use crate::services::{IngestOutcome, IngestionService};

/// App state for event routes
#[derive(Clone)]
pub struct AppState {
    pub db: StorageBackend,
    pub ingest: Arc<IngestionService>,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/attendance-events", post(submit_event))
        .with_state(state)
}

/// POST /v1/attendance-events - Record an attendance event from a token tap
///
/// Authenticated by the device's X-API-Key header. The payload device_id
/// must match the authenticated device. Redelivering a submission with the
/// same client_event_id returns the original event.
#[utoipa::path(
    post,
    path = "/v1/attendance-events",
    request_body = EventSubmission,
    responses(
        (status = 201, description = "Event recorded (or found under its idempotency key)", body = EventAccepted),
        (status = 202, description = "Unknown token parked for enrollment", body = PendingAssignment),
        (status = 400, description = "Token inactive, subject inactive, or device mismatch"),
        (status = 401, description = "Invalid or missing device API key"),
        (status = 404, description = "Token not found"),
        (status = 409, description = "Duplicate event inside the suppression window")
    ),
    tag = "attendance-events"
)]
pub async fn submit_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(submission): Json<EventSubmission>,
) -> Result<Response, ApiError> {
    let device = authenticate_device(&state.db, &headers).await?;

    match state.ingest.ingest(&device, submission).await? {
        IngestOutcome::Recorded(accepted) => {
            Ok((StatusCode::CREATED, Json(*accepted)).into_response())
        }
        IngestOutcome::PendingAssignment(pending) => {
            Ok((StatusCode::ACCEPTED, Json(pending)).into_response())
        }
    }
}
