// Postgres storage layer with sqlx, plus an in-memory backend for dev mode
//
// The ingestion service talks to StorageBackend; production selects
// Postgres, dev mode and unit tests select InMemory.

pub mod backend;
pub mod memory;
pub mod models;
pub mod repositories;

pub use backend::StorageBackend;
pub use memory::InMemoryDatabase;
pub use models::*;
pub use repositories::Database;
