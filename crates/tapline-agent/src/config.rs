// Agent configuration from environment variables

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for one capture device.
///
/// The API key is the device's identity; it rides on every request and is
/// never part of the payload.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub api_base_url: String,
    pub device_id: String,
    pub api_key: String,
    pub request_timeout: Duration,
    pub poll_interval: Duration,
    pub sync_interval: Duration,
    pub queue_path: PathBuf,
    pub max_sync_attempts: i64,
    pub sync_batch_size: i64,
}

impl AgentConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let api_base_url = std::env::var("TAPLINE_API_URL")
            .context("TAPLINE_API_URL environment variable required")?;
        let device_id = std::env::var("TAPLINE_DEVICE_ID")
            .context("TAPLINE_DEVICE_ID environment variable required")?;
        let api_key = std::env::var("TAPLINE_DEVICE_KEY")
            .context("TAPLINE_DEVICE_KEY environment variable required")?;

        Ok(Self {
            api_base_url,
            device_id,
            api_key,
            request_timeout: Duration::from_secs(env_u64("TAPLINE_REQUEST_TIMEOUT_SECS", 10)),
            poll_interval: Duration::from_millis(env_u64("TAPLINE_POLL_INTERVAL_MS", 500)),
            sync_interval: Duration::from_secs(env_u64("TAPLINE_SYNC_INTERVAL_SECS", 30)),
            queue_path: std::env::var("TAPLINE_QUEUE_PATH")
                .unwrap_or_else(|_| "./tapline-agent.db".to_string())
                .into(),
            max_sync_attempts: env_u64("TAPLINE_MAX_SYNC_ATTEMPTS", 5) as i64,
            sync_batch_size: env_u64("TAPLINE_SYNC_BATCH_SIZE", 50) as i64,
        })
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
