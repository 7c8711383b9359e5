// Attendance event model and entity status enums
//
// Status columns are stored as strings; the enums here are the typed view
// used by services. `from` on an unknown string falls back to the safest
// variant rather than failing (rows predate code changes).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Polarity of a presence event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::In => "IN",
            Direction::Out => "OUT",
        }
    }

    /// The direction that follows this one in a well-formed day.
    pub fn opposite(&self) -> Direction {
        match self {
            Direction::In => Direction::Out,
            Direction::Out => Direction::In,
        }
    }
}

impl From<&str> for Direction {
    fn from(s: &str) -> Self {
        match s {
            "OUT" => Direction::Out,
            _ => Direction::In,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a presence event entered the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "UPPERCASE")]
pub enum EntrySource {
    /// Physical token tap at a capture device.
    Token,
    /// Any non-token path (manual entry, corrections).
    Manual,
}

impl EntrySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntrySource::Token => "TOKEN",
            EntrySource::Manual => "MANUAL",
        }
    }
}

impl From<&str> for EntrySource {
    fn from(s: &str) -> Self {
        match s {
            "MANUAL" => EntrySource::Manual,
            _ => EntrySource::Token,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EmployeeStatus {
    Active,
    Inactive,
}

impl EmployeeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmployeeStatus::Active => "ACTIVE",
            EmployeeStatus::Inactive => "INACTIVE",
        }
    }
}

impl From<&str> for EmployeeStatus {
    fn from(s: &str) -> Self {
        match s {
            "ACTIVE" => EmployeeStatus::Active,
            _ => EmployeeStatus::Inactive,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CardStatus {
    Active,
    Lost,
    Revoked,
}

impl CardStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardStatus::Active => "ACTIVE",
            CardStatus::Lost => "LOST",
            CardStatus::Revoked => "REVOKED",
        }
    }
}

impl From<&str> for CardStatus {
    fn from(s: &str) -> Self {
        match s {
            "ACTIVE" => CardStatus::Active,
            "LOST" => CardStatus::Lost,
            _ => CardStatus::Revoked,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeviceStatus {
    Online,
    Offline,
    Maintenance,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::Online => "ONLINE",
            DeviceStatus::Offline => "OFFLINE",
            DeviceStatus::Maintenance => "MAINTENANCE",
        }
    }
}

impl From<&str> for DeviceStatus {
    fn from(s: &str) -> Self {
        match s {
            "ONLINE" => DeviceStatus::Online,
            "MAINTENANCE" => DeviceStatus::Maintenance,
            _ => DeviceStatus::Offline,
        }
    }
}

/// A persisted presence event, as returned to devices and dashboards.
///
/// Immutable once created; corrections go through a separate authorized path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AttendanceEvent {
    pub id: Uuid,
    pub employee_id: Uuid,
    /// Absent for non-token entry paths.
    pub card_id: Option<Uuid>,
    pub direction: Direction,
    /// Event-source-supplied time, not server-receive time.
    pub event_timestamp: DateTime<Utc>,
    pub device_id: String,
    pub entry_source: EntrySource,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}
