// Sync coordinator: drains the local queue to the service
//
// One background task owns draining, so at most one drain pass runs at a
// time; immediate-sync triggers raised while a pass is running coalesce in
// the Notify. Each pass is bounded to one batch to keep cycle latency
// predictable, and a transient failure aborts the remainder of the batch
// rather than burning attempts on a dead connection.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;

use crate::client::{DeliveryClient, DeliveryOutcome};
use crate::config::AgentConfig;
use crate::queue::LocalQueue;

/// What one drain pass accomplished.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    /// Accepted by the service (including pending-assignment parks).
    pub delivered: usize,
    /// Deterministically rejected, recorded, never retried.
    pub rejected: usize,
    /// Hit a transient failure; batch aborted, retried next pass.
    pub deferred: usize,
}

pub struct SyncCoordinator {
    queue: Arc<LocalQueue>,
    client: Arc<DeliveryClient>,
    trigger: Arc<Notify>,
    sync_interval: Duration,
    batch_size: i64,
    max_attempts: i64,
}

impl SyncCoordinator {
    pub fn new(
        queue: Arc<LocalQueue>,
        client: Arc<DeliveryClient>,
        trigger: Arc<Notify>,
        config: &AgentConfig,
    ) -> Self {
        Self {
            queue,
            client,
            trigger,
            sync_interval: config.sync_interval,
            batch_size: config.sync_batch_size,
            max_attempts: config.max_sync_attempts,
        }
    }

    /// Drain on a fixed cadence and on demand, until a fatal queue error.
    pub async fn run(&self) -> Result<()> {
        tracing::info!(
            interval_secs = self.sync_interval.as_secs(),
            "sync coordinator started"
        );

        let mut ticker = tokio::time::interval(self.sync_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // First tick fires immediately: events left over from a previous
            // run start syncing at startup
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.trigger.notified() => {}
            }

            let report = self.drain().await?;
            if report.delivered > 0 || report.rejected > 0 {
                tracing::info!(
                    delivered = report.delivered,
                    rejected = report.rejected,
                    deferred = report.deferred,
                    "sync pass finished"
                );
            }
        }
    }

    /// One bounded drain pass over the pending queue, FIFO.
    pub async fn drain(&self) -> Result<DrainReport> {
        let mut report = DrainReport::default();

        if !self.client.health_check().await {
            tracing::debug!("service not reachable, skipping sync");
            return Ok(report);
        }

        let pending = self.queue.list_pending(self.batch_size).await?;
        if pending.is_empty() {
            return Ok(report);
        }

        tracing::info!(count = pending.len(), "syncing buffered events");

        for event in pending {
            match self.client.deliver(&event).await {
                DeliveryOutcome::Accepted(_) | DeliveryOutcome::PendingAssignment => {
                    self.queue.mark_synced(event.id).await?;
                    report.delivered += 1;
                }
                DeliveryOutcome::Rejected(reason) => {
                    self.queue.record_rejection(event.id, &reason).await?;
                    report.rejected += 1;
                }
                DeliveryOutcome::Transient(reason) => {
                    tracing::warn!(
                        event_id = %event.id,
                        reason,
                        "transient failure, aborting sync batch"
                    );
                    self.queue
                        .record_transient_failure(event.id, self.max_attempts)
                        .await?;
                    report.deferred += 1;
                    break;
                }
            }
        }

        Ok(report)
    }
}
