// CivicWatch ingest - bulk loader for legislator posts

// Core types and primitives
pub mod core;

// Row models for legislators, topics and posts
pub mod models;

// Storage seam, PostgreSQL and in-memory backends, schema bootstrap
pub mod infrastructure;

// Two-pass ingestion pipeline
pub mod ingest;

// Common utilities
pub mod cli;
pub mod config;
pub mod error;

// Re-exports for convenience
pub use error::{AppError, AppResult};
