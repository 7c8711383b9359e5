pub mod ingest;

pub use ingest::{IngestOutcome, IngestSettings, IngestionService};
