// Tapline ingestion server
// Decision: Postgres when DATABASE_URL is set; otherwise in-memory dev mode
// with a seeded demo device so a field agent can talk to it out of the box

mod auth;
mod enrollment;
mod error;
mod events;
mod services;

use anyhow::{Context, Result};
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tapline_core::{
    AttendanceEvent, Direction, EntrySource, EventAccepted, EventSubmission, FailureBody,
    FailureKind, PendingAssignment,
};
use tapline_storage::{CreateCard, CreateDevice, CreateEmployee, StorageBackend};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::enrollment::PendingTokenBuffer;
use crate::services::{IngestSettings, IngestionService};

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    storage_mode: &'static str,
}

async fn health(State(state): State<HealthState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        storage_mode: state.storage_mode,
    })
}

/// State for health endpoint
#[derive(Clone)]
struct HealthState {
    storage_mode: &'static str,
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        events::submit_event,
        enrollment::get_pending_token,
        enrollment::clear_pending_token,
    ),
    components(
        schemas(
            EventSubmission, EventAccepted, PendingAssignment,
            AttendanceEvent, Direction, EntrySource,
            FailureBody, FailureKind,
            enrollment::PendingToken, enrollment::PendingTokenStatus,
        )
    ),
    tags(
        (name = "attendance-events", description = "Device event submission"),
        (name = "enrollment", description = "Pending-token side channel for the enrollment workflow")
    ),
    info(
        title = "Tapline API",
        version = "0.2.0",
        description = "Authoritative ingestion service for attendance capture devices",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tapline_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("tapline-api starting...");

    // Select storage backend
    let (db, storage_mode) = match std::env::var("DATABASE_URL") {
        Ok(url) => {
            let backend = StorageBackend::postgres(&url)
                .await
                .context("Failed to connect to database")?;
            if let StorageBackend::Postgres(pg) = &backend {
                tapline_storage::Database::migrate(pg)
                    .await
                    .context("Failed to run migrations")?;
            }
            tracing::info!("Connected to Postgres");
            (backend, "postgres")
        }
        Err(_) => {
            tracing::warn!("DATABASE_URL not set, using in-memory storage (dev mode)");
            let backend = StorageBackend::in_memory();
            seed_dev_data(&backend).await?;
            (backend, "in-memory")
        }
    };

    // Ingestion policy
    let settings = IngestSettings::from_env();
    tracing::info!(
        duplicate_window_secs = settings.duplicate_window_secs,
        capture_unknown_tokens = settings.capture_unknown_tokens,
        "Ingestion policy configured"
    );

    let pending_ttl = std::env::var("TAPLINE_PENDING_TOKEN_TTL_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(60);
    let pending = Arc::new(PendingTokenBuffer::new(Duration::from_secs(pending_ttl)));

    let ingest = Arc::new(IngestionService::new(db.clone(), pending.clone(), settings));

    // Module-specific states
    let events_state = events::AppState {
        db: db.clone(),
        ingest,
    };
    let enrollment_state = enrollment::AppState { pending };
    let health_state = HealthState { storage_mode };

    let app = Router::new()
        .route("/health", get(health).with_state(health_state))
        .merge(events::routes(events_state))
        .merge(enrollment::routes(enrollment_state))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http());

    let addr = std::env::var("TAPLINE_API_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

/// Seed a demo device, employee, and card for dev mode.
async fn seed_dev_data(db: &StorageBackend) -> Result<()> {
    let api_key =
        std::env::var("TAPLINE_DEV_DEVICE_KEY").unwrap_or_else(|_| "dev-device-key".to_string());

    db.create_device(CreateDevice {
        device_id: "GATE-1".to_string(),
        name: "Main gate reader".to_string(),
        location: "Lobby".to_string(),
        api_key: api_key.clone(),
    })
    .await?;

    let employee = db
        .create_employee(CreateEmployee {
            employee_no: "E-100".to_string(),
            full_name: "Jordan Alvarez".to_string(),
            status: "ACTIVE".to_string(),
        })
        .await?;

    db.create_card(CreateCard {
        card_uid: "04A2B3C4D5".to_string(),
        employee_id: employee.id,
        status: "ACTIVE".to_string(),
    })
    .await?;

    tracing::info!(
        device_id = "GATE-1",
        api_key = %api_key,
        card_uid = "04A2B3C4D5",
        "Dev data seeded"
    );
    Ok(())
}
