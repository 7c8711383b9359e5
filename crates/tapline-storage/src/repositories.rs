// Repository layer for database operations
//
// Only what the ingestion path, dev seeding, and tests need: token/employee
// resolution, the event ledger, and device liveness. Resource CRUD beyond
// that belongs to collaborators outside this repository.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::*;

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create database connection from URL
    pub async fn from_url(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run pending migrations from the crate's migrations directory
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    // ============================================
    // Employees
    // ============================================

    pub async fn create_employee(&self, input: CreateEmployee) -> Result<EmployeeRow> {
        let row = sqlx::query_as::<_, EmployeeRow>(
            r#"
            INSERT INTO employees (id, employee_no, full_name, status)
            VALUES ($1, $2, $3, $4)
            RETURNING id, employee_no, full_name, status, created_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(&input.employee_no)
        .bind(&input.full_name)
        .bind(&input.status)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn get_employee(&self, id: Uuid) -> Result<Option<EmployeeRow>> {
        let row = sqlx::query_as::<_, EmployeeRow>(
            r#"
            SELECT id, employee_no, full_name, status, created_at
            FROM employees
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    // ============================================
    // Cards
    // ============================================

    pub async fn create_card(&self, input: CreateCard) -> Result<CardRow> {
        let row = sqlx::query_as::<_, CardRow>(
            r#"
            INSERT INTO cards (id, card_uid, employee_id, status)
            VALUES ($1, $2, $3, $4)
            RETURNING id, card_uid, employee_id, status, issued_at, revoked_at, created_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(&input.card_uid)
        .bind(input.employee_id)
        .bind(&input.status)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn get_card_by_uid(&self, card_uid: &str) -> Result<Option<CardRow>> {
        let row = sqlx::query_as::<_, CardRow>(
            r#"
            SELECT id, card_uid, employee_id, status, issued_at, revoked_at, created_at
            FROM cards
            WHERE card_uid = $1
            "#,
        )
        .bind(card_uid)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    // ============================================
    // Devices
    // ============================================

    pub async fn create_device(&self, input: CreateDevice) -> Result<DeviceRow> {
        let row = sqlx::query_as::<_, DeviceRow>(
            r#"
            INSERT INTO devices (id, device_id, name, location, api_key, status)
            VALUES ($1, $2, $3, $4, $5, 'OFFLINE')
            RETURNING id, device_id, name, location, api_key, status, last_seen_at, created_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(&input.device_id)
        .bind(&input.name)
        .bind(&input.location)
        .bind(&input.api_key)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn get_device_by_key(&self, api_key: &str) -> Result<Option<DeviceRow>> {
        let row = sqlx::query_as::<_, DeviceRow>(
            r#"
            SELECT id, device_id, name, location, api_key, status, last_seen_at, created_at
            FROM devices
            WHERE api_key = $1
            "#,
        )
        .bind(api_key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn get_device(&self, device_id: &str) -> Result<Option<DeviceRow>> {
        let row = sqlx::query_as::<_, DeviceRow>(
            r#"
            SELECT id, device_id, name, location, api_key, status, last_seen_at, created_at
            FROM devices
            WHERE device_id = $1
            "#,
        )
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Liveness side effect of a successful ingest: ONLINE + fresh last_seen.
    pub async fn mark_device_online(&self, device_id: &str, seen_at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE devices
            SET status = 'ONLINE', last_seen_at = $2
            WHERE device_id = $1
            "#,
        )
        .bind(device_id)
        .bind(seen_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ============================================
    // Attendance events (append-only ledger)
    // ============================================

    pub async fn insert_event(&self, input: NewAttendanceEvent) -> Result<AttendanceEventRow> {
        let row = sqlx::query_as::<_, AttendanceEventRow>(
            r#"
            INSERT INTO attendance_events
                (id, employee_id, card_id, direction, event_timestamp, device_id, entry_source, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, employee_id, card_id, direction, event_timestamp, device_id,
                      entry_source, notes, created_at
            "#,
        )
        .bind(input.id.unwrap_or_else(Uuid::now_v7))
        .bind(input.employee_id)
        .bind(input.card_id)
        .bind(&input.direction)
        .bind(input.event_timestamp)
        .bind(&input.device_id)
        .bind(&input.entry_source)
        .bind(&input.notes)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn get_event(&self, id: Uuid) -> Result<Option<AttendanceEventRow>> {
        let row = sqlx::query_as::<_, AttendanceEventRow>(
            r#"
            SELECT id, employee_id, card_id, direction, event_timestamp, device_id,
                   entry_source, notes, created_at
            FROM attendance_events
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Most recent event for a subject across all devices.
    pub async fn last_event_for_employee(
        &self,
        employee_id: Uuid,
    ) -> Result<Option<AttendanceEventRow>> {
        let row = sqlx::query_as::<_, AttendanceEventRow>(
            r#"
            SELECT id, employee_id, card_id, direction, event_timestamp, device_id,
                   entry_source, notes, created_at
            FROM attendance_events
            WHERE employee_id = $1
            ORDER BY event_timestamp DESC
            LIMIT 1
            "#,
        )
        .bind(employee_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Most recent event for a subject inside [start, end), used by
    /// direction inference over the event's calendar day.
    pub async fn last_event_for_employee_between(
        &self,
        employee_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Option<AttendanceEventRow>> {
        let row = sqlx::query_as::<_, AttendanceEventRow>(
            r#"
            SELECT id, employee_id, card_id, direction, event_timestamp, device_id,
                   entry_source, notes, created_at
            FROM attendance_events
            WHERE employee_id = $1
              AND event_timestamp >= $2
              AND event_timestamp < $3
            ORDER BY event_timestamp DESC
            LIMIT 1
            "#,
        )
        .bind(employee_id)
        .bind(start)
        .bind(end)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn list_events_for_employee(
        &self,
        employee_id: Uuid,
    ) -> Result<Vec<AttendanceEventRow>> {
        let rows = sqlx::query_as::<_, AttendanceEventRow>(
            r#"
            SELECT id, employee_id, card_id, direction, event_timestamp, device_id,
                   entry_source, notes, created_at
            FROM attendance_events
            WHERE employee_id = $1
            ORDER BY event_timestamp ASC
            "#,
        )
        .bind(employee_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
