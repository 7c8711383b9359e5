// Device-to-service wire contract
//
// Responses are constructed field by field; nothing is splatted from internal
// models, so the wire surface is exactly what is listed here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::FailureKind;
use crate::events::{AttendanceEvent, Direction};

/// A single tap submitted by a capture device.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct EventSubmission {
    /// Token identifier read from the physical credential.
    #[cfg_attr(feature = "openapi", schema(example = "04A2B3C4D5"))]
    pub token_id: String,
    /// Identifier of the submitting device; must match the authenticated device.
    #[cfg_attr(feature = "openapi", schema(example = "GATE-1"))]
    pub device_id: String,
    /// When the tap happened at the device, not when the request arrived.
    pub event_timestamp: DateTime<Utc>,
    /// Client-generated idempotency key; redelivery with the same id returns
    /// the original event.
    #[serde(default)]
    pub client_event_id: Option<Uuid>,
    /// Explicit direction; inferred from history when absent.
    #[serde(default)]
    pub direction: Option<Direction>,
}

/// Successful ingestion: the created (or previously created) event plus a
/// human-readable display message for the device.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct EventAccepted {
    pub event: AttendanceEvent,
    pub employee_name: String,
    pub employee_no: String,
    #[cfg_attr(feature = "openapi", schema(example = "Welcome, Jordan Alvarez!"))]
    pub message: String,
}

/// Response for a token not yet bound to any employee: the tap was captured
/// into the enrollment side channel instead of being rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PendingAssignment {
    #[cfg_attr(feature = "openapi", schema(example = "pending_assignment"))]
    pub status: String,
    pub token_id: String,
    pub detected_at: DateTime<Utc>,
    pub message: String,
}

impl PendingAssignment {
    pub fn new(token_id: impl Into<String>, detected_at: DateTime<Utc>) -> Self {
        let token_id = token_id.into();
        let message = format!("Token {token_id} detected and queued for assignment");
        Self {
            status: "pending_assignment".to_string(),
            token_id,
            detected_at,
            message,
        }
    }
}

/// Machine-readable body carried on every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct FailureBody {
    pub error: FailureKind,
    pub message: String,
}
