// Delivery client for the central ingestion service
//
// Every delivery resolves to an explicit outcome so callers must branch on
// the failure class; there is no exception path to forget. The device API
// key is attached to every request as a default header.

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::StatusCode;
use std::time::Duration;

use tapline_core::{EventAccepted, FailureBody};

use crate::config::AgentConfig;
use crate::queue::CapturedEvent;

const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// How a single delivery attempt resolved.
#[derive(Debug)]
pub enum DeliveryOutcome {
    /// Durable commitment by the service; safe to mark the event synced.
    Accepted(Box<EventAccepted>),
    /// Token unknown to the service, parked for enrollment. Not retryable,
    /// not a hard failure.
    PendingAssignment,
    /// Deterministic rejection; retrying can never succeed.
    Rejected(String),
    /// Anything that may succeed on retry: timeouts, refused connections,
    /// server errors.
    Transient(String),
}

pub struct DeliveryClient {
    http: reqwest::Client,
    base_url: String,
}

impl DeliveryClient {
    pub fn new(config: &AgentConfig) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_str(&config.api_key)?);

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Submit one event and classify the result.
    pub async fn deliver(&self, event: &CapturedEvent) -> DeliveryOutcome {
        let url = format!("{}/v1/attendance-events", self.base_url);
        let submission = event.submission();

        tracing::debug!(event_id = %event.id, token_id = %event.token_id, "delivering event");

        let response = match self.http.post(&url).json(&submission).send().await {
            Ok(response) => response,
            Err(err) => return DeliveryOutcome::Transient(err.to_string()),
        };

        let status = response.status();
        if status == StatusCode::ACCEPTED {
            return DeliveryOutcome::PendingAssignment;
        }
        if status.is_success() {
            return match response.json::<EventAccepted>().await {
                Ok(accepted) => DeliveryOutcome::Accepted(Box::new(accepted)),
                // The service may have committed; redelivery is idempotent
                Err(err) => DeliveryOutcome::Transient(format!("malformed success body: {err}")),
            };
        }
        if status.is_server_error()
            || status == StatusCode::REQUEST_TIMEOUT
            || status == StatusCode::TOO_MANY_REQUESTS
        {
            return DeliveryOutcome::Transient(format!("service error: {status}"));
        }

        // Remaining 4xx: deterministic, never retried
        let reason = match response.json::<FailureBody>().await {
            Ok(body) => format!("{:?}: {}", body.error, body.message),
            Err(_) => format!("rejected with status {status}"),
        };
        DeliveryOutcome::Rejected(reason)
    }

    /// Best-effort reachability probe, used to skip futile sync passes.
    /// Not a correctness mechanism.
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.http.get(&url).timeout(HEALTH_TIMEOUT).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}
