// Ingestion service: the authoritative end of the capture pipeline
//
// A submission passes, in order: device identity check, token resolution,
// idempotency lookup, duplicate-tap suppression, direction inference,
// persistence, device liveness refresh. The first three rejections leave no
// state behind; the insert is the sole durability point.
//
// Concurrency: submissions for the same employee serialize on a per-employee
// async mutex so the duplicate check and direction inference are race-free.
// Different employees proceed independently.

use chrono::{DateTime, NaiveTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use tapline_core::{
    AttendanceEvent, CardStatus, Direction, EmployeeStatus, EntrySource, EventAccepted,
    EventSubmission, IngestError, PendingAssignment,
};
use tapline_storage::{
    AttendanceEventRow, DeviceRow, EmployeeRow, NewAttendanceEvent, StorageBackend,
};

use crate::enrollment::PendingTokenBuffer;
use crate::error::ApiError;

/// Policy knobs. The duplicate window and the unknown-token behavior are
/// deployment policy, not invariants.
#[derive(Debug, Clone)]
pub struct IngestSettings {
    /// Two taps by the same subject closer than this are treated as one
    /// physical double-tap.
    pub duplicate_window_secs: i64,
    /// Park unknown tokens for enrollment (202) instead of rejecting (404).
    pub capture_unknown_tokens: bool,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            duplicate_window_secs: 60,
            capture_unknown_tokens: true,
        }
    }
}

impl IngestSettings {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            duplicate_window_secs: std::env::var("TAPLINE_DUPLICATE_WINDOW_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.duplicate_window_secs),
            capture_unknown_tokens: std::env::var("TAPLINE_CAPTURE_UNKNOWN_TOKENS")
                .ok()
                .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
                .unwrap_or(defaults.capture_unknown_tokens),
        }
    }
}

/// What a successful call to [`IngestionService::ingest`] produced.
#[derive(Debug)]
pub enum IngestOutcome {
    /// Event persisted (or found under its idempotency key).
    Recorded(Box<EventAccepted>),
    /// Unknown token parked in the enrollment side channel.
    PendingAssignment(PendingAssignment),
}

pub struct IngestionService {
    db: StorageBackend,
    pending: Arc<PendingTokenBuffer>,
    settings: IngestSettings,
    subject_locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl IngestionService {
    pub fn new(
        db: StorageBackend,
        pending: Arc<PendingTokenBuffer>,
        settings: IngestSettings,
    ) -> Self {
        Self {
            db,
            pending,
            settings,
            subject_locks: DashMap::new(),
        }
    }

    /// Ingest one tap submitted by `device`.
    pub async fn ingest(
        &self,
        device: &DeviceRow,
        submission: EventSubmission,
    ) -> Result<IngestOutcome, ApiError> {
        if submission.device_id != device.device_id {
            return Err(IngestError::DeviceMismatch.into());
        }

        let Some(card) = self
            .db
            .get_card_by_uid(&submission.token_id)
            .await
            .map_err(ApiError::Internal)?
        else {
            if self.settings.capture_unknown_tokens {
                let detected_at = Utc::now();
                self.pending.put(&submission.token_id, detected_at);
                return Ok(IngestOutcome::PendingAssignment(PendingAssignment::new(
                    submission.token_id,
                    detected_at,
                )));
            }
            return Err(IngestError::TokenNotFound.into());
        };

        if CardStatus::from(card.status.as_str()) != CardStatus::Active {
            return Err(IngestError::TokenInactive {
                status: card.status.to_lowercase(),
            }
            .into());
        }

        let employee = self
            .db
            .get_employee(card.employee_id)
            .await
            .map_err(ApiError::Internal)?
            .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("card without employee")))?;

        if EmployeeStatus::from(employee.status.as_str()) != EmployeeStatus::Active {
            return Err(IngestError::SubjectInactive.into());
        }

        // Serialize the check-infer-persist section per subject
        let lock = self
            .subject_locks
            .entry(employee.id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // Idempotent redelivery: the prior Accepted response was lost in
        // transit, return the original event unchanged
        if let Some(id) = submission.client_event_id {
            if let Some(existing) = self.db.get_event(id).await.map_err(ApiError::Internal)? {
                tracing::info!(event_id = %id, "idempotent redelivery, returning existing event");
                return Ok(IngestOutcome::Recorded(Box::new(
                    self.accepted(existing, &employee),
                )));
            }
        }

        self.check_duplicate(employee.id, submission.event_timestamp)
            .await?;

        let direction = match submission.direction {
            Some(direction) => direction,
            None => {
                self.infer_direction(employee.id, submission.event_timestamp)
                    .await?
            }
        };

        let row = self
            .db
            .insert_event(NewAttendanceEvent {
                id: submission.client_event_id,
                employee_id: employee.id,
                card_id: Some(card.id),
                direction: direction.as_str().to_string(),
                event_timestamp: submission.event_timestamp,
                device_id: device.device_id.clone(),
                entry_source: EntrySource::Token.as_str().to_string(),
                notes: None,
            })
            .await
            .map_err(ApiError::Internal)?;

        self.db
            .mark_device_online(&device.device_id, Utc::now())
            .await
            .map_err(ApiError::Internal)?;

        tracing::info!(
            employee_no = %employee.employee_no,
            direction = %direction,
            device_id = %device.device_id,
            "attendance event recorded"
        );

        Ok(IngestOutcome::Recorded(Box::new(self.accepted(row, &employee))))
    }

    /// Reject a tap landing inside the duplicate window of the subject's most
    /// recent event, on any device. Absolute difference: redelivered pairs
    /// collapse to one event no matter which arrives first.
    async fn check_duplicate(
        &self,
        employee_id: Uuid,
        event_timestamp: DateTime<Utc>,
    ) -> Result<(), ApiError> {
        let last = self
            .db
            .last_event_for_employee(employee_id)
            .await
            .map_err(ApiError::Internal)?;

        if let Some(last) = last {
            let gap = (event_timestamp - last.event_timestamp).num_seconds().abs();
            if gap < self.settings.duplicate_window_secs {
                return Err(IngestError::DuplicateEvent {
                    window_secs: self.settings.duplicate_window_secs,
                }
                .into());
            }
        }
        Ok(())
    }

    /// IN/OUT from the subject's most recent event within the same UTC
    /// calendar day as the tap: none or OUT means IN, otherwise OUT. A pure
    /// function of stored history, so replaying history reproduces it.
    async fn infer_direction(
        &self,
        employee_id: Uuid,
        event_timestamp: DateTime<Utc>,
    ) -> Result<Direction, ApiError> {
        let day_start = event_timestamp
            .date_naive()
            .and_time(NaiveTime::MIN)
            .and_utc();
        let day_end = day_start + chrono::Duration::days(1);

        let last_today = self
            .db
            .last_event_for_employee_between(employee_id, day_start, day_end)
            .await
            .map_err(ApiError::Internal)?;

        Ok(match last_today {
            None => Direction::In,
            Some(event) => Direction::from(event.direction.as_str()).opposite(),
        })
    }

    fn accepted(&self, row: AttendanceEventRow, employee: &EmployeeRow) -> EventAccepted {
        let direction = Direction::from(row.direction.as_str());
        EventAccepted {
            event: row_to_event(row),
            employee_name: employee.full_name.clone(),
            employee_no: employee.employee_no.clone(),
            message: greeting(direction, &employee.full_name),
        }
    }
}

fn row_to_event(row: AttendanceEventRow) -> AttendanceEvent {
    AttendanceEvent {
        id: row.id,
        employee_id: row.employee_id,
        card_id: row.card_id,
        direction: Direction::from(row.direction.as_str()),
        event_timestamp: row.event_timestamp,
        device_id: row.device_id,
        entry_source: EntrySource::from(row.entry_source.as_str()),
        notes: row.notes,
        created_at: row.created_at,
    }
}

fn greeting(direction: Direction, name: &str) -> String {
    match direction {
        Direction::In => format!("Welcome, {name}!"),
        Direction::Out => format!("Goodbye, {name}. Have a great day!"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration as StdDuration;
    use tapline_storage::{CreateCard, CreateDevice, CreateEmployee};

    struct Fixture {
        service: IngestionService,
        db: StorageBackend,
        device: DeviceRow,
        employee: EmployeeRow,
    }

    async fn fixture() -> Fixture {
        fixture_with(IngestSettings::default()).await
    }

    async fn fixture_with(settings: IngestSettings) -> Fixture {
        let db = StorageBackend::in_memory();
        let device = db
            .create_device(CreateDevice {
                device_id: "GATE-1".to_string(),
                name: "Main gate".to_string(),
                location: "Lobby".to_string(),
                api_key: "gate-1-key".to_string(),
            })
            .await
            .unwrap();
        let employee = db
            .create_employee(CreateEmployee {
                employee_no: "E-100".to_string(),
                full_name: "Jordan Alvarez".to_string(),
                status: "ACTIVE".to_string(),
            })
            .await
            .unwrap();
        db.create_card(CreateCard {
            card_uid: "04A2B3C4D5".to_string(),
            employee_id: employee.id,
            status: "ACTIVE".to_string(),
        })
        .await
        .unwrap();

        let pending = Arc::new(PendingTokenBuffer::new(StdDuration::from_secs(60)));
        let service = IngestionService::new(db.clone(), pending, settings);
        Fixture {
            service,
            db,
            device,
            employee,
        }
    }

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 5, h, m, s).unwrap()
    }

    fn submission(ts: DateTime<Utc>) -> EventSubmission {
        EventSubmission {
            token_id: "04A2B3C4D5".to_string(),
            device_id: "GATE-1".to_string(),
            event_timestamp: ts,
            client_event_id: None,
            direction: None,
        }
    }

    fn unwrap_recorded(outcome: IngestOutcome) -> EventAccepted {
        match outcome {
            IngestOutcome::Recorded(accepted) => *accepted,
            other => panic!("expected Recorded, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn first_tap_of_day_is_in_with_welcome() {
        let fx = fixture().await;
        let outcome = fx
            .service
            .ingest(&fx.device, submission(at(8, 30, 0)))
            .await
            .unwrap();

        let accepted = unwrap_recorded(outcome);
        assert_eq!(accepted.event.direction, Direction::In);
        assert_eq!(accepted.message, "Welcome, Jordan Alvarez!");
        assert_eq!(accepted.employee_no, "E-100");
    }

    #[tokio::test]
    async fn second_tap_within_window_is_duplicate() {
        let fx = fixture().await;
        fx.service
            .ingest(&fx.device, submission(at(8, 30, 0)))
            .await
            .unwrap();

        let err = fx
            .service
            .ingest(&fx.device, submission(at(8, 30, 10)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ApiError::Ingest(IngestError::DuplicateEvent { window_secs: 60 })
        ));

        // Exactly one event persisted
        let events = fx.db.list_events_for_employee(fx.employee.id).await.unwrap();
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_window_applies_regardless_of_submission_order() {
        let fx = fixture().await;
        // The later tap arrives first (redelivery can reorder)
        fx.service
            .ingest(&fx.device, submission(at(8, 30, 10)))
            .await
            .unwrap();

        let err = fx
            .service
            .ingest(&fx.device, submission(at(8, 30, 0)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ApiError::Ingest(IngestError::DuplicateEvent { .. })
        ));
        let events = fx.db.list_events_for_employee(fx.employee.id).await.unwrap();
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn evening_tap_infers_out_with_goodbye() {
        let fx = fixture().await;
        fx.service
            .ingest(&fx.device, submission(at(8, 30, 0)))
            .await
            .unwrap();

        let outcome = fx
            .service
            .ingest(&fx.device, submission(at(17, 0, 0)))
            .await
            .unwrap();
        let accepted = unwrap_recorded(outcome);
        assert_eq!(accepted.event.direction, Direction::Out);
        assert!(accepted.message.starts_with("Goodbye"));
    }

    #[tokio::test]
    async fn direction_alternates_across_a_day_and_resets_next_day() {
        let fx = fixture().await;
        let taps = [at(8, 0, 0), at(12, 0, 0), at(13, 0, 0), at(17, 30, 0)];
        let mut directions = Vec::new();
        for ts in taps {
            let accepted =
                unwrap_recorded(fx.service.ingest(&fx.device, submission(ts)).await.unwrap());
            directions.push(accepted.event.direction);
        }
        assert_eq!(
            directions,
            [Direction::In, Direction::Out, Direction::In, Direction::Out]
        );

        // Next day starts fresh: no prior event today, infer IN even though
        // yesterday ended on OUT
        let next_day = Utc.with_ymd_and_hms(2026, 8, 6, 8, 0, 0).unwrap();
        let accepted = unwrap_recorded(
            fx.service
                .ingest(&fx.device, submission(next_day))
                .await
                .unwrap(),
        );
        assert_eq!(accepted.event.direction, Direction::In);
    }

    #[tokio::test]
    async fn redelivery_with_same_client_event_id_returns_existing_event() {
        let fx = fixture().await;
        let id = Uuid::now_v7();
        let mut sub = submission(at(8, 30, 0));
        sub.client_event_id = Some(id);

        let first = unwrap_recorded(fx.service.ingest(&fx.device, sub.clone()).await.unwrap());
        // Redelivered after the Accepted response was lost in transit
        let second = unwrap_recorded(fx.service.ingest(&fx.device, sub).await.unwrap());

        assert_eq!(first.event.id, id);
        assert_eq!(second.event.id, id);
        assert_eq!(second.event.direction, first.event.direction);
        assert_eq!(second.message, first.message);

        let events = fx.db.list_events_for_employee(fx.employee.id).await.unwrap();
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn replaying_history_reproduces_directions() {
        let fx = fixture().await;
        let taps = [at(8, 0, 0), at(12, 30, 0), at(13, 45, 0), at(18, 0, 0)];
        let mut first_pass = Vec::new();
        for ts in taps {
            let accepted =
                unwrap_recorded(fx.service.ingest(&fx.device, submission(ts)).await.unwrap());
            first_pass.push(accepted.event.direction);
        }

        // Re-ingest the same history, in timestamp order, into a fresh store
        let replay = fixture().await;
        let mut second_pass = Vec::new();
        for ts in taps {
            let accepted = unwrap_recorded(
                replay
                    .service
                    .ingest(&replay.device, submission(ts))
                    .await
                    .unwrap(),
            );
            second_pass.push(accepted.event.direction);
        }
        assert_eq!(first_pass, second_pass);
    }

    #[tokio::test]
    async fn explicit_direction_bypasses_inference() {
        let fx = fixture().await;
        let mut sub = submission(at(8, 30, 0));
        sub.direction = Some(Direction::Out);

        let accepted = unwrap_recorded(fx.service.ingest(&fx.device, sub).await.unwrap());
        assert_eq!(accepted.event.direction, Direction::Out);
    }

    #[tokio::test]
    async fn device_mismatch_is_rejected_before_anything_else() {
        let fx = fixture().await;
        let mut sub = submission(at(8, 30, 0));
        sub.device_id = "GATE-2".to_string();

        let err = fx.service.ingest(&fx.device, sub).await.unwrap_err();
        assert!(matches!(err, ApiError::Ingest(IngestError::DeviceMismatch)));
    }

    #[tokio::test]
    async fn unknown_token_is_parked_for_enrollment() {
        let fx = fixture().await;
        let mut sub = submission(at(8, 30, 0));
        sub.token_id = "FFEE0011".to_string();

        let outcome = fx.service.ingest(&fx.device, sub).await.unwrap();
        match outcome {
            IngestOutcome::PendingAssignment(pending) => {
                assert_eq!(pending.token_id, "FFEE0011");
                assert_eq!(pending.status, "pending_assignment");
            }
            other => panic!("expected PendingAssignment, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_token_rejected_when_capture_disabled() {
        let fx = fixture_with(IngestSettings {
            capture_unknown_tokens: false,
            ..IngestSettings::default()
        })
        .await;
        let mut sub = submission(at(8, 30, 0));
        sub.token_id = "FFEE0011".to_string();

        let err = fx.service.ingest(&fx.device, sub).await.unwrap_err();
        assert!(matches!(err, ApiError::Ingest(IngestError::TokenNotFound)));
    }

    #[tokio::test]
    async fn revoked_card_is_token_inactive() {
        let fx = fixture().await;
        db_card(&fx.db, "DEAD0001", fx.employee.id, "REVOKED").await;
        let mut sub = submission(at(8, 30, 0));
        sub.token_id = "DEAD0001".to_string();

        let err = fx.service.ingest(&fx.device, sub).await.unwrap_err();
        match err {
            ApiError::Ingest(IngestError::TokenInactive { status }) => {
                assert_eq!(status, "revoked");
            }
            other => panic!("expected TokenInactive, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn inactive_employee_is_subject_inactive() {
        let fx = fixture().await;
        let inactive = fx
            .db
            .create_employee(CreateEmployee {
                employee_no: "E-200".to_string(),
                full_name: "Sam Okafor".to_string(),
                status: "INACTIVE".to_string(),
            })
            .await
            .unwrap();
        db_card(&fx.db, "BEEF0002", inactive.id, "ACTIVE").await;
        let mut sub = submission(at(8, 30, 0));
        sub.token_id = "BEEF0002".to_string();

        let err = fx.service.ingest(&fx.device, sub).await.unwrap_err();
        assert!(matches!(err, ApiError::Ingest(IngestError::SubjectInactive)));
    }

    #[tokio::test]
    async fn custom_duplicate_window_is_honored() {
        let fx = fixture_with(IngestSettings {
            duplicate_window_secs: 5,
            ..IngestSettings::default()
        })
        .await;
        fx.service
            .ingest(&fx.device, submission(at(8, 30, 0)))
            .await
            .unwrap();

        // 10 s apart clears a 5 s window
        let outcome = fx
            .service
            .ingest(&fx.device, submission(at(8, 30, 10)))
            .await
            .unwrap();
        unwrap_recorded(outcome);
    }

    #[tokio::test]
    async fn concurrent_same_subject_taps_yield_one_event_and_one_duplicate() {
        let fx = fixture().await;
        let service = Arc::new(fx.service);

        let a = {
            let service = service.clone();
            let device = fx.device.clone();
            tokio::spawn(async move { service.ingest(&device, submission(at(8, 30, 0))).await })
        };
        let b = {
            let service = service.clone();
            let device = fx.device.clone();
            tokio::spawn(async move { service.ingest(&device, submission(at(8, 30, 10))).await })
        };

        let results = [a.await.unwrap(), b.await.unwrap()];
        let recorded = results.iter().filter(|r| r.is_ok()).count();
        let duplicates = results
            .iter()
            .filter(|r| {
                matches!(
                    r,
                    Err(ApiError::Ingest(IngestError::DuplicateEvent { .. }))
                )
            })
            .count();
        assert_eq!(recorded, 1);
        assert_eq!(duplicates, 1);

        let events = fx.db.list_events_for_employee(fx.employee.id).await.unwrap();
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn successful_ingest_marks_device_online() {
        let fx = fixture().await;
        fx.service
            .ingest(&fx.device, submission(at(8, 30, 0)))
            .await
            .unwrap();

        let device = fx.db.get_device("GATE-1").await.unwrap().unwrap();
        assert_eq!(device.status, "ONLINE");
        assert!(device.last_seen_at.is_some());
    }

    async fn db_card(db: &StorageBackend, uid: &str, employee_id: Uuid, status: &str) {
        db.create_card(CreateCard {
            card_uid: uid.to_string(),
            employee_id,
            status: status.to_string(),
        })
        .await
        .unwrap();
    }
}
