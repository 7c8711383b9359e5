// Tapline field agent
//
// Reads physical tokens from a TokenSource, delivers taps to the central
// service, and falls back to a local durable queue drained by a background
// sync coordinator when the service is unreachable.

pub mod capture;
pub mod client;
pub mod config;
pub mod queue;
pub mod source;
pub mod sync;

pub use capture::CaptureLoop;
pub use client::{DeliveryClient, DeliveryOutcome};
pub use config::AgentConfig;
pub use queue::{CapturedEvent, LocalQueue, QueueStats, SyncStatus};
pub use source::{Debounce, StdinSource, TokenRead, TokenSource};
pub use sync::{DrainReport, SyncCoordinator};
