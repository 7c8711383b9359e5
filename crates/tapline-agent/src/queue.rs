// Local durable queue for captured events
//
// SQLite with WAL journaling and synchronous=FULL: every mutation is on disk
// before the call returns. The pool holds a single connection, which also
// serializes writers. This component has no network dependency and must keep
// working with the service fully unreachable.
//
// Rows are never deleted while PENDING or FAILED; SYNCED rows are retained
// for audit until the retention sweep removes them.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{FromRow, SqlitePool};
use std::path::Path;
use uuid::Uuid;

use tapline_core::EventSubmission;

/// Delivery state of a buffered event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Pending,
    Synced,
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "PENDING",
            SyncStatus::Synced => "SYNCED",
            SyncStatus::Failed => "FAILED",
        }
    }

    fn parse(s: &str) -> Result<Self> {
        match s {
            "PENDING" => Ok(SyncStatus::Pending),
            "SYNCED" => Ok(SyncStatus::Synced),
            "FAILED" => Ok(SyncStatus::Failed),
            other => Err(anyhow::anyhow!("unknown sync status in queue: {other}")),
        }
    }
}

/// One tap as captured at the device.
#[derive(Debug, Clone)]
pub struct CapturedEvent {
    /// Client-generated, globally unique; doubles as the idempotency key.
    pub id: Uuid,
    pub token_id: String,
    pub device_id: String,
    /// When the tap happened.
    pub timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub sync_attempts: i64,
    pub last_sync_attempt: Option<DateTime<Utc>>,
    /// Rejection reason for events the service refused.
    pub last_error: Option<String>,
    pub status: SyncStatus,
}

impl CapturedEvent {
    pub fn new(token_id: impl Into<String>, device_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            token_id: token_id.into(),
            device_id: device_id.into(),
            timestamp: now,
            created_at: now,
            sync_attempts: 0,
            last_sync_attempt: None,
            last_error: None,
            status: SyncStatus::Pending,
        }
    }

    /// The wire submission for this tap. The event id rides along as the
    /// idempotency key so redelivery is safe.
    pub fn submission(&self) -> EventSubmission {
        EventSubmission {
            token_id: self.token_id.clone(),
            device_id: self.device_id.clone(),
            event_timestamp: self.timestamp,
            client_event_id: Some(self.id),
            direction: None,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
struct CapturedEventRow {
    id: String,
    token_id: String,
    device_id: String,
    timestamp: DateTime<Utc>,
    created_at: DateTime<Utc>,
    sync_attempts: i64,
    last_sync_attempt: Option<DateTime<Utc>>,
    last_error: Option<String>,
    status: String,
}

impl TryFrom<CapturedEventRow> for CapturedEvent {
    type Error = anyhow::Error;

    fn try_from(row: CapturedEventRow) -> Result<Self> {
        Ok(CapturedEvent {
            id: Uuid::parse_str(&row.id).context("corrupt event id in queue")?,
            token_id: row.token_id,
            device_id: row.device_id,
            timestamp: row.timestamp,
            created_at: row.created_at,
            sync_attempts: row.sync_attempts,
            last_sync_attempt: row.last_sync_attempt,
            last_error: row.last_error,
            status: SyncStatus::parse(&row.status)?,
        })
    }
}

/// Buffer totals by status, surfaced to the operator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub pending: i64,
    pub synced: i64,
    pub failed: i64,
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS captured_events (
    id TEXT PRIMARY KEY,
    token_id TEXT NOT NULL,
    device_id TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    created_at TEXT NOT NULL,
    sync_attempts INTEGER NOT NULL DEFAULT 0,
    last_sync_attempt TEXT,
    last_error TEXT,
    status TEXT NOT NULL DEFAULT 'PENDING'
)
"#;

pub struct LocalQueue {
    pool: SqlitePool,
}

impl LocalQueue {
    /// Open (creating if needed) the queue database at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating queue directory {}", parent.display()))?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full);

        // Single connection: the queue is single-writer by design
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .with_context(|| format!("opening queue database {}", path.display()))?;

        sqlx::query(SCHEMA).execute(&pool).await?;

        tracing::info!(path = %path.display(), "local event queue ready");
        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Persist a captured event as PENDING. Idempotent: re-enqueueing the
    /// same event id is a no-op, not an error.
    pub async fn enqueue(&self, event: &CapturedEvent) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO captured_events
                (id, token_id, device_id, timestamp, created_at, sync_attempts, last_sync_attempt, last_error, status)
            VALUES (?, ?, ?, ?, ?, 0, NULL, NULL, 'PENDING')
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(event.id.to_string())
        .bind(&event.token_id)
        .bind(&event.device_id)
        .bind(event.timestamp)
        .bind(event.created_at)
        .execute(&self.pool)
        .await?;

        tracing::info!(event_id = %event.id, token_id = %event.token_id, "event buffered");
        Ok(())
    }

    /// Pending events in capture order (FIFO delivery preserves the causal
    /// ordering of taps from this device).
    pub async fn list_pending(&self, limit: i64) -> Result<Vec<CapturedEvent>> {
        let rows = sqlx::query_as::<_, CapturedEventRow>(
            r#"
            SELECT id, token_id, device_id, timestamp, created_at,
                   sync_attempts, last_sync_attempt, last_error, status
            FROM captured_events
            WHERE status = 'PENDING'
            ORDER BY timestamp ASC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(CapturedEvent::try_from).collect()
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<CapturedEvent>> {
        let row = sqlx::query_as::<_, CapturedEventRow>(
            r#"
            SELECT id, token_id, device_id, timestamp, created_at,
                   sync_attempts, last_sync_attempt, last_error, status
            FROM captured_events
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(CapturedEvent::try_from).transpose()
    }

    /// The service durably accepted this event.
    pub async fn mark_synced(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE captured_events
            SET status = 'SYNCED', last_sync_attempt = ?
            WHERE id = ?
            "#,
        )
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        tracing::info!(event_id = %id, "event marked as synced");
        Ok(())
    }

    /// A transient delivery failure: stays PENDING and retry-eligible until
    /// the attempt count reaches `max_attempts`, then flips to FAILED.
    pub async fn record_transient_failure(&self, id: Uuid, max_attempts: i64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE captured_events
            SET
                sync_attempts = sync_attempts + 1,
                last_sync_attempt = ?,
                status = CASE
                    WHEN sync_attempts + 1 >= ? THEN 'FAILED'
                    ELSE 'PENDING'
                END
            WHERE id = ?
            "#,
        )
        .bind(Utc::now())
        .bind(max_attempts)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        tracing::warn!(event_id = %id, "event sync failed");
        Ok(())
    }

    /// A deterministic rejection: FAILED immediately, reason recorded,
    /// never retried.
    pub async fn record_rejection(&self, id: Uuid, reason: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE captured_events
            SET
                sync_attempts = sync_attempts + 1,
                last_sync_attempt = ?,
                last_error = ?,
                status = 'FAILED'
            WHERE id = ?
            "#,
        )
        .bind(Utc::now())
        .bind(reason)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        tracing::warn!(event_id = %id, reason, "event rejected by service");
        Ok(())
    }

    pub async fn counts(&self) -> Result<QueueStats> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT status, COUNT(*)
            FROM captured_events
            GROUP BY status
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut stats = QueueStats::default();
        for (status, count) in rows {
            match status.as_str() {
                "PENDING" => stats.pending = count,
                "SYNCED" => stats.synced = count,
                "FAILED" => stats.failed = count,
                _ => {}
            }
        }
        Ok(stats)
    }

    /// Retention sweep: drop SYNCED rows older than the cutoff. PENDING and
    /// FAILED rows are never touched.
    pub async fn prune_synced(&self, older_than: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM captured_events
            WHERE status = 'SYNCED' AND created_at < ?
            "#,
        )
        .bind(older_than)
        .execute(&self.pool)
        .await?;

        let deleted = result.rows_affected();
        if deleted > 0 {
            tracing::info!(deleted, "pruned old synced events");
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use std::path::PathBuf;

    /// Unique queue file under the system temp dir.
    fn temp_queue_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("tapline_{name}_{}.db", Uuid::now_v7()))
    }

    async fn open_queue(name: &str) -> (LocalQueue, PathBuf) {
        let path = temp_queue_path(name);
        (LocalQueue::open(&path).await.unwrap(), path)
    }

    #[tokio::test]
    async fn enqueue_is_idempotent_per_event_id() {
        let (queue, _path) = open_queue("idempotent").await;
        let event = CapturedEvent::new("04A2B3C4D5", "GATE-1");

        queue.enqueue(&event).await.unwrap();
        queue.enqueue(&event).await.unwrap();

        let stats = queue.counts().await.unwrap();
        assert_eq!(stats.pending, 1);
    }

    #[tokio::test]
    async fn list_pending_returns_capture_order() {
        let (queue, _path) = open_queue("fifo").await;
        let base = Utc::now();

        // Enqueue out of capture order
        let mut third = CapturedEvent::new("T3", "GATE-1");
        third.timestamp = base + ChronoDuration::seconds(120);
        let mut first = CapturedEvent::new("T1", "GATE-1");
        first.timestamp = base;
        let mut second = CapturedEvent::new("T2", "GATE-1");
        second.timestamp = base + ChronoDuration::seconds(60);

        for event in [&third, &first, &second] {
            queue.enqueue(event).await.unwrap();
        }

        let pending = queue.list_pending(10).await.unwrap();
        let tokens: Vec<_> = pending.iter().map(|e| e.token_id.as_str()).collect();
        assert_eq!(tokens, ["T1", "T2", "T3"]);
    }

    #[tokio::test]
    async fn mark_synced_removes_from_pending_but_keeps_row() {
        let (queue, _path) = open_queue("synced").await;
        let event = CapturedEvent::new("04A2B3C4D5", "GATE-1");
        queue.enqueue(&event).await.unwrap();

        queue.mark_synced(event.id).await.unwrap();

        assert!(queue.list_pending(10).await.unwrap().is_empty());
        let stored = queue.get(event.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SyncStatus::Synced);
        assert!(stored.last_sync_attempt.is_some());
    }

    #[tokio::test]
    async fn transient_failures_stay_pending_until_attempt_cap() {
        let (queue, _path) = open_queue("attempts").await;
        let event = CapturedEvent::new("04A2B3C4D5", "GATE-1");
        queue.enqueue(&event).await.unwrap();

        for attempt in 1..5 {
            queue.record_transient_failure(event.id, 5).await.unwrap();
            let stored = queue.get(event.id).await.unwrap().unwrap();
            assert_eq!(stored.sync_attempts, attempt);
            assert_eq!(stored.status, SyncStatus::Pending, "attempt {attempt}");
        }

        // Fifth failure reaches the cap
        queue.record_transient_failure(event.id, 5).await.unwrap();
        let stored = queue.get(event.id).await.unwrap().unwrap();
        assert_eq!(stored.sync_attempts, 5);
        assert_eq!(stored.status, SyncStatus::Failed);
        assert!(queue.list_pending(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejection_fails_immediately_with_reason() {
        let (queue, _path) = open_queue("rejected").await;
        let event = CapturedEvent::new("04A2B3C4D5", "GATE-1");
        queue.enqueue(&event).await.unwrap();

        queue
            .record_rejection(event.id, "token not found")
            .await
            .unwrap();

        let stored = queue.get(event.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SyncStatus::Failed);
        assert_eq!(stored.last_error.as_deref(), Some("token not found"));
        assert!(queue.list_pending(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn pending_events_survive_reopen() {
        let path = temp_queue_path("reopen");
        let event = CapturedEvent::new("04A2B3C4D5", "GATE-1");

        {
            let queue = LocalQueue::open(&path).await.unwrap();
            queue.enqueue(&event).await.unwrap();
            queue.close().await;
        }

        // Process restarted between enqueue and mark_synced
        let queue = LocalQueue::open(&path).await.unwrap();
        let pending = queue.list_pending(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, event.id);
        assert_eq!(pending[0].status, SyncStatus::Pending);
    }

    #[tokio::test]
    async fn prune_only_touches_old_synced_rows() {
        let (queue, _path) = open_queue("prune").await;

        let synced = CapturedEvent::new("S", "GATE-1");
        let pending = CapturedEvent::new("P", "GATE-1");
        queue.enqueue(&synced).await.unwrap();
        queue.enqueue(&pending).await.unwrap();
        queue.mark_synced(synced.id).await.unwrap();

        // Cutoff in the future: the synced row qualifies, pending never does
        let deleted = queue
            .prune_synced(Utc::now() + ChronoDuration::days(1))
            .await
            .unwrap();
        assert_eq!(deleted, 1);

        let stats = queue.counts().await.unwrap();
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.synced, 0);
    }

    #[tokio::test]
    async fn submission_carries_the_event_id_as_idempotency_key() {
        let event = CapturedEvent::new("04A2B3C4D5", "GATE-1");
        let submission = event.submission();
        assert_eq!(submission.client_event_id, Some(event.id));
        assert_eq!(submission.event_timestamp, event.timestamp);
        assert_eq!(submission.direction, None);
    }
}
