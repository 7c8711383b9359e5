// Capture loop: token reads in, delivered or buffered events out
//
// Every tap resolves within bounded time to exactly one of: delivered,
// buffered for retry, or permanently rejected. The direct delivery attempt
// is bounded by the client timeout, so a hung service cannot stall reads
// past it.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use crate::client::{DeliveryClient, DeliveryOutcome};
use crate::config::AgentConfig;
use crate::queue::{CapturedEvent, LocalQueue};
use crate::source::{Debounce, TokenSource};

pub struct CaptureLoop {
    source: Box<dyn TokenSource>,
    client: Arc<DeliveryClient>,
    queue: Arc<LocalQueue>,
    sync_trigger: Arc<Notify>,
    device_id: String,
    poll_interval: Duration,
    debounce: Debounce,
}

impl CaptureLoop {
    pub fn new(
        source: Box<dyn TokenSource>,
        client: Arc<DeliveryClient>,
        queue: Arc<LocalQueue>,
        sync_trigger: Arc<Notify>,
        config: &AgentConfig,
    ) -> Self {
        Self {
            source,
            client,
            queue,
            sync_trigger,
            device_id: config.device_id.clone(),
            poll_interval: config.poll_interval,
            debounce: Debounce::new(),
        }
    }

    /// Poll the token source until a fatal (local storage) error.
    pub async fn run(&mut self) -> Result<()> {
        tracing::info!(device_id = %self.device_id, "capture loop started");
        loop {
            match self.source.read().await {
                Ok(read) => {
                    if let Some(token_id) = self.debounce.observe(read) {
                        self.handle_tap(token_id).await?;
                    }
                }
                Err(err) => {
                    // Reader hiccup: log and keep polling
                    tracing::error!("token source error: {err:#}");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Handle one debounced tap: direct delivery first, queue on transient
    /// failure. Queue errors propagate; losing the buffer means losing taps,
    /// so the agent must stop rather than capture into the void.
    pub async fn handle_tap(&self, token_id: String) -> Result<()> {
        let event = CapturedEvent::new(token_id, self.device_id.clone());
        tracing::info!(token_id = %event.token_id, event_id = %event.id, "token detected");

        match self.client.deliver(&event).await {
            DeliveryOutcome::Accepted(accepted) => {
                tracing::info!(
                    message = %accepted.message,
                    employee = %accepted.employee_name,
                    direction = %accepted.event.direction,
                    "attendance recorded"
                );
            }
            DeliveryOutcome::PendingAssignment => {
                tracing::info!(token_id = %event.token_id, "token queued for assignment");
            }
            DeliveryOutcome::Rejected(reason) => {
                // Known-invalid: surfacing it is all there is to do
                tracing::warn!(token_id = %event.token_id, reason, "tap rejected");
            }
            DeliveryOutcome::Transient(reason) => {
                tracing::warn!(reason, "service unreachable, buffering tap");
                self.queue.enqueue(&event).await?;
                self.sync_trigger.notify_one();
            }
        }
        Ok(())
    }
}
