// Tapline field agent entry point
//
// Two tasks share the local queue: the capture loop (foreground) and the
// sync coordinator (background, woken by a timer or an immediate-sync
// trigger from the capture side). A queue failure anywhere is fatal; the
// agent must not keep capturing taps it cannot durably buffer.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tapline_agent::{AgentConfig, CaptureLoop, DeliveryClient, LocalQueue, StdinSource, SyncCoordinator};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tapline_agent=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AgentConfig::from_env()?;
    tracing::info!(
        device_id = %config.device_id,
        api_url = %config.api_base_url,
        "tapline-agent starting..."
    );

    // The queue is the only durability guarantee between a tap and a
    // confirmed delivery; refusing to start beats capturing into the void
    let queue = Arc::new(
        LocalQueue::open(&config.queue_path)
            .await
            .context("Failed to open local event queue")?,
    );
    let client = Arc::new(DeliveryClient::new(&config)?);
    let sync_trigger = Arc::new(Notify::new());

    let coordinator = SyncCoordinator::new(queue.clone(), client.clone(), sync_trigger.clone(), &config);
    let sync_task = tokio::spawn(async move { coordinator.run().await });

    let source = StdinSource::new(config.poll_interval);
    let mut capture = CaptureLoop::new(Box::new(source), client, queue.clone(), sync_trigger, &config);

    tokio::select! {
        result = capture.run() => {
            result.context("capture loop failed")?;
        }
        result = sync_task => {
            result.context("sync task panicked")?.context("sync coordinator failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown requested");
        }
    }

    let stats = queue.counts().await?;
    if stats.pending > 0 {
        tracing::warn!(
            pending = stats.pending,
            "events pending sync; they will be synced on next startup"
        );
    }
    if stats.failed > 0 {
        tracing::warn!(failed = stats.failed, "events need operator attention");
    }
    queue.close().await;
    tracing::info!("agent stopped");

    Ok(())
}
