// In-memory storage implementation for dev mode
// Decision: Use parking_lot for thread-safe access
// Decision: UUIDs generated via uuid v7 (time-ordered)
//
// Provides a Postgres-compatible API backed by HashMaps so the ingestion
// service can run and be tested without a database.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::*;

/// In-memory database for dev mode.
/// All data is stored in memory and lost on restart.
#[derive(Default)]
pub struct InMemoryDatabase {
    employees: RwLock<HashMap<Uuid, EmployeeRow>>,
    cards: RwLock<HashMap<Uuid, CardRow>>,
    devices: RwLock<HashMap<Uuid, DeviceRow>>,
    events: RwLock<HashMap<Uuid, AttendanceEventRow>>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    // ============================================
    // Employees
    // ============================================

    pub async fn create_employee(&self, input: CreateEmployee) -> Result<EmployeeRow> {
        let row = EmployeeRow {
            id: Uuid::now_v7(),
            employee_no: input.employee_no,
            full_name: input.full_name,
            status: input.status,
            created_at: Self::now(),
        };
        self.employees.write().insert(row.id, row.clone());
        Ok(row)
    }

    pub async fn get_employee(&self, id: Uuid) -> Result<Option<EmployeeRow>> {
        Ok(self.employees.read().get(&id).cloned())
    }

    // ============================================
    // Cards
    // ============================================

    pub async fn create_card(&self, input: CreateCard) -> Result<CardRow> {
        if self
            .cards
            .read()
            .values()
            .any(|c| c.card_uid == input.card_uid)
        {
            return Err(anyhow!("card_uid already exists: {}", input.card_uid));
        }
        let now = Self::now();
        let row = CardRow {
            id: Uuid::now_v7(),
            card_uid: input.card_uid,
            employee_id: input.employee_id,
            status: input.status,
            issued_at: now,
            revoked_at: None,
            created_at: now,
        };
        self.cards.write().insert(row.id, row.clone());
        Ok(row)
    }

    pub async fn get_card_by_uid(&self, card_uid: &str) -> Result<Option<CardRow>> {
        Ok(self
            .cards
            .read()
            .values()
            .find(|c| c.card_uid == card_uid)
            .cloned())
    }

    // ============================================
    // Devices
    // ============================================

    pub async fn create_device(&self, input: CreateDevice) -> Result<DeviceRow> {
        let row = DeviceRow {
            id: Uuid::now_v7(),
            device_id: input.device_id,
            name: input.name,
            location: input.location,
            api_key: input.api_key,
            status: "OFFLINE".to_string(),
            last_seen_at: None,
            created_at: Self::now(),
        };
        self.devices.write().insert(row.id, row.clone());
        Ok(row)
    }

    pub async fn get_device_by_key(&self, api_key: &str) -> Result<Option<DeviceRow>> {
        Ok(self
            .devices
            .read()
            .values()
            .find(|d| d.api_key == api_key)
            .cloned())
    }

    pub async fn get_device(&self, device_id: &str) -> Result<Option<DeviceRow>> {
        Ok(self
            .devices
            .read()
            .values()
            .find(|d| d.device_id == device_id)
            .cloned())
    }

    pub async fn mark_device_online(&self, device_id: &str, seen_at: DateTime<Utc>) -> Result<()> {
        let mut devices = self.devices.write();
        if let Some(device) = devices.values_mut().find(|d| d.device_id == device_id) {
            device.status = "ONLINE".to_string();
            device.last_seen_at = Some(seen_at);
        }
        Ok(())
    }

    // ============================================
    // Attendance events
    // ============================================

    pub async fn insert_event(&self, input: NewAttendanceEvent) -> Result<AttendanceEventRow> {
        let id = input.id.unwrap_or_else(Uuid::now_v7);
        let mut events = self.events.write();
        if events.contains_key(&id) {
            return Err(anyhow!("event id already exists: {id}"));
        }
        let row = AttendanceEventRow {
            id,
            employee_id: input.employee_id,
            card_id: input.card_id,
            direction: input.direction,
            event_timestamp: input.event_timestamp,
            device_id: input.device_id,
            entry_source: input.entry_source,
            notes: input.notes,
            created_at: Self::now(),
        };
        events.insert(id, row.clone());
        Ok(row)
    }

    pub async fn get_event(&self, id: Uuid) -> Result<Option<AttendanceEventRow>> {
        Ok(self.events.read().get(&id).cloned())
    }

    pub async fn last_event_for_employee(
        &self,
        employee_id: Uuid,
    ) -> Result<Option<AttendanceEventRow>> {
        Ok(self
            .events
            .read()
            .values()
            .filter(|e| e.employee_id == employee_id)
            .max_by_key(|e| e.event_timestamp)
            .cloned())
    }

    pub async fn last_event_for_employee_between(
        &self,
        employee_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Option<AttendanceEventRow>> {
        Ok(self
            .events
            .read()
            .values()
            .filter(|e| {
                e.employee_id == employee_id
                    && e.event_timestamp >= start
                    && e.event_timestamp < end
            })
            .max_by_key(|e| e.event_timestamp)
            .cloned())
    }

    pub async fn list_events_for_employee(
        &self,
        employee_id: Uuid,
    ) -> Result<Vec<AttendanceEventRow>> {
        let mut rows: Vec<_> = self
            .events
            .read()
            .values()
            .filter(|e| e.employee_id == employee_id)
            .cloned()
            .collect();
        rows.sort_by_key(|e| e.event_timestamp);
        Ok(rows)
    }
}
