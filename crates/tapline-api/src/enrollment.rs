// Pending-token side channel for the enrollment workflow
//
// When a tap arrives for a token bound to nobody, the tap is parked here for
// the (external) enrollment wizard instead of being rejected. Single slot,
// short TTL: the wizard polls while an operator holds the token at a reader.
//
// Constructor-injected state with its own lifecycle, not a process-wide
// singleton.

use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PendingToken {
    pub token_id: String,
    pub detected_at: DateTime<Utc>,
}

/// Single-slot buffer holding the most recently seen unassigned token.
pub struct PendingTokenBuffer {
    slot: Mutex<Option<PendingToken>>,
    ttl: Duration,
}

impl PendingTokenBuffer {
    pub fn new(ttl: Duration) -> Self {
        Self {
            slot: Mutex::new(None),
            ttl,
        }
    }

    /// Park a token; a newer detection replaces an older one.
    pub fn put(&self, token_id: impl Into<String>, detected_at: DateTime<Utc>) {
        let token = PendingToken {
            token_id: token_id.into(),
            detected_at,
        };
        tracing::info!(token_id = %token.token_id, "unassigned token parked for enrollment");
        *self.slot.lock() = Some(token);
    }

    /// Current occupant, dropping it first if it outlived the TTL.
    pub fn peek(&self) -> Option<PendingToken> {
        let mut slot = self.slot.lock();
        if let Some(token) = slot.as_ref() {
            let age = Utc::now().signed_duration_since(token.detected_at);
            if age.num_seconds() >= self.ttl.as_secs() as i64 {
                *slot = None;
                return None;
            }
        }
        slot.clone()
    }

    pub fn clear(&self) {
        *self.slot.lock() = None;
    }
}

/// Buffer status as exposed to the enrollment workflow.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PendingTokenStatus {
    pub has_token: bool,
    pub token: Option<PendingToken>,
}

#[derive(Clone)]
pub struct AppState {
    pub pending: Arc<PendingTokenBuffer>,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route(
            "/v1/enrollment/pending-token",
            get(get_pending_token).delete(clear_pending_token),
        )
        .with_state(state)
}

/// GET /v1/enrollment/pending-token - Peek the enrollment side channel
#[utoipa::path(
    get,
    path = "/v1/enrollment/pending-token",
    responses(
        (status = 200, description = "Current pending token, if any", body = PendingTokenStatus)
    ),
    tag = "enrollment"
)]
pub async fn get_pending_token(State(state): State<AppState>) -> Json<PendingTokenStatus> {
    let token = state.pending.peek();
    Json(PendingTokenStatus {
        has_token: token.is_some(),
        token,
    })
}

/// DELETE /v1/enrollment/pending-token - Clear the enrollment side channel
#[utoipa::path(
    delete,
    path = "/v1/enrollment/pending-token",
    responses(
        (status = 204, description = "Buffer cleared")
    ),
    tag = "enrollment"
)]
pub async fn clear_pending_token(State(state): State<AppState>) -> StatusCode {
    state.pending.clear();
    StatusCode::NO_CONTENT
}
