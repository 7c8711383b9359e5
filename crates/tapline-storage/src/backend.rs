// Storage backend abstraction
// Decision: Use enum dispatch for simplicity over trait objects
//
// A unified StorageBackend that works with either PostgreSQL (production)
// or in-memory (dev mode, tests) storage.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::memory::InMemoryDatabase;
use crate::models::*;
use crate::repositories::Database;

/// Storage backend that can be either PostgreSQL or in-memory
#[derive(Clone)]
pub enum StorageBackend {
    /// PostgreSQL database (production)
    Postgres(Database),
    /// In-memory database (dev mode)
    InMemory(Arc<InMemoryDatabase>),
}

impl StorageBackend {
    /// Create a PostgreSQL storage backend from a database URL
    pub async fn postgres(database_url: &str) -> Result<Self> {
        let db = Database::from_url(database_url).await?;
        Ok(Self::Postgres(db))
    }

    /// Create an in-memory storage backend
    pub fn in_memory() -> Self {
        Self::InMemory(Arc::new(InMemoryDatabase::new()))
    }

    /// Check if this is dev mode (in-memory)
    pub fn is_dev_mode(&self) -> bool {
        matches!(self, Self::InMemory(_))
    }

    /// Get the PostgreSQL pool if using PostgreSQL backend.
    /// Returns None for in-memory backend.
    pub fn pool(&self) -> Option<&PgPool> {
        match self {
            Self::Postgres(db) => Some(db.pool()),
            Self::InMemory(_) => None,
        }
    }

    // ============================================
    // Employees
    // ============================================

    pub async fn create_employee(&self, input: CreateEmployee) -> Result<EmployeeRow> {
        match self {
            Self::Postgres(db) => db.create_employee(input).await,
            Self::InMemory(db) => db.create_employee(input).await,
        }
    }

    pub async fn get_employee(&self, id: Uuid) -> Result<Option<EmployeeRow>> {
        match self {
            Self::Postgres(db) => db.get_employee(id).await,
            Self::InMemory(db) => db.get_employee(id).await,
        }
    }

    // ============================================
    // Cards
    // ============================================

    pub async fn create_card(&self, input: CreateCard) -> Result<CardRow> {
        match self {
            Self::Postgres(db) => db.create_card(input).await,
            Self::InMemory(db) => db.create_card(input).await,
        }
    }

    pub async fn get_card_by_uid(&self, card_uid: &str) -> Result<Option<CardRow>> {
        match self {
            Self::Postgres(db) => db.get_card_by_uid(card_uid).await,
            Self::InMemory(db) => db.get_card_by_uid(card_uid).await,
        }
    }

    // ============================================
    // Devices
    // ============================================

    pub async fn create_device(&self, input: CreateDevice) -> Result<DeviceRow> {
        match self {
            Self::Postgres(db) => db.create_device(input).await,
            Self::InMemory(db) => db.create_device(input).await,
        }
    }

    pub async fn get_device_by_key(&self, api_key: &str) -> Result<Option<DeviceRow>> {
        match self {
            Self::Postgres(db) => db.get_device_by_key(api_key).await,
            Self::InMemory(db) => db.get_device_by_key(api_key).await,
        }
    }

    pub async fn get_device(&self, device_id: &str) -> Result<Option<DeviceRow>> {
        match self {
            Self::Postgres(db) => db.get_device(device_id).await,
            Self::InMemory(db) => db.get_device(device_id).await,
        }
    }

    pub async fn mark_device_online(&self, device_id: &str, seen_at: DateTime<Utc>) -> Result<()> {
        match self {
            Self::Postgres(db) => db.mark_device_online(device_id, seen_at).await,
            Self::InMemory(db) => db.mark_device_online(device_id, seen_at).await,
        }
    }

    // ============================================
    // Attendance events
    // ============================================

    pub async fn insert_event(&self, input: NewAttendanceEvent) -> Result<AttendanceEventRow> {
        match self {
            Self::Postgres(db) => db.insert_event(input).await,
            Self::InMemory(db) => db.insert_event(input).await,
        }
    }

    pub async fn get_event(&self, id: Uuid) -> Result<Option<AttendanceEventRow>> {
        match self {
            Self::Postgres(db) => db.get_event(id).await,
            Self::InMemory(db) => db.get_event(id).await,
        }
    }

    pub async fn last_event_for_employee(
        &self,
        employee_id: Uuid,
    ) -> Result<Option<AttendanceEventRow>> {
        match self {
            Self::Postgres(db) => db.last_event_for_employee(employee_id).await,
            Self::InMemory(db) => db.last_event_for_employee(employee_id).await,
        }
    }

    pub async fn last_event_for_employee_between(
        &self,
        employee_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Option<AttendanceEventRow>> {
        match self {
            Self::Postgres(db) => {
                db.last_event_for_employee_between(employee_id, start, end)
                    .await
            }
            Self::InMemory(db) => {
                db.last_event_for_employee_between(employee_id, start, end)
                    .await
            }
        }
    }

    pub async fn list_events_for_employee(
        &self,
        employee_id: Uuid,
    ) -> Result<Vec<AttendanceEventRow>> {
        match self {
            Self::Postgres(db) => db.list_events_for_employee(employee_id).await,
            Self::InMemory(db) => db.list_events_for_employee(employee_id).await,
        }
    }
}
