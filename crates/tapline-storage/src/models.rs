// Database models (internal, may differ from public DTOs)

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

// ============================================
// Employee models
// ============================================

#[derive(Debug, Clone, FromRow)]
pub struct EmployeeRow {
    pub id: Uuid,
    pub employee_no: String,
    pub full_name: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateEmployee {
    pub employee_no: String,
    pub full_name: String,
    pub status: String,
}

// ============================================
// Card models
// ============================================

#[derive(Debug, Clone, FromRow)]
pub struct CardRow {
    pub id: Uuid,
    pub card_uid: String,
    pub employee_id: Uuid,
    pub status: String,
    pub issued_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateCard {
    pub card_uid: String,
    pub employee_id: Uuid,
    pub status: String,
}

// ============================================
// Device models
// ============================================

#[derive(Debug, Clone, FromRow)]
pub struct DeviceRow {
    pub id: Uuid,
    pub device_id: String,
    pub name: String,
    pub location: String,
    pub api_key: String,
    pub status: String,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateDevice {
    pub device_id: String,
    pub name: String,
    pub location: String,
    pub api_key: String,
}

// ============================================
// Attendance event models
// ============================================

#[derive(Debug, Clone, FromRow)]
pub struct AttendanceEventRow {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub card_id: Option<Uuid>,
    pub direction: String,
    pub event_timestamp: DateTime<Utc>,
    pub device_id: String,
    pub entry_source: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for the single insert on the ingestion path.
/// `id` is the agent-supplied idempotency key when present.
#[derive(Debug, Clone)]
pub struct NewAttendanceEvent {
    pub id: Option<Uuid>,
    pub employee_id: Uuid,
    pub card_id: Option<Uuid>,
    pub direction: String,
    pub event_timestamp: DateTime<Utc>,
    pub device_id: String,
    pub entry_source: String,
    pub notes: Option<String>,
}
