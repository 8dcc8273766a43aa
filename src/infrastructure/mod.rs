// Storage infrastructure - the ingestion store seam and its two backends
pub mod database;      // Store traits and the PostgreSQL backend
pub mod memory_store;  // In-process backend for dry runs and tests
pub mod schema;        // Table, index and view bootstrap

pub use database::{IngestStore, IngestTransaction, PostgresStore, TableCounts};
pub use memory_store::MemoryStore;
pub use schema::AggregateView;
