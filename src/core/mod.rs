// Core types and primitives shared by the ingestion stages

pub mod strong_types;

pub use strong_types::{LegislatorId, PostId, TopicCode};
