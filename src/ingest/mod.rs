// Ingestion stages - sources, casting, batching and the pipeline that drives them
pub mod batching;
pub mod cast;
pub mod extractor;
pub mod pipeline;
pub mod record;
pub mod reference_writer;
pub mod refresher;
pub mod source;
pub mod streamer;
pub mod summary;

pub use cast::CastTable;
pub use pipeline::{ImportPipeline, PipelineOptions, PipelineStage};
pub use record::RawRecord;
pub use source::{open_source, RecordSource, SourceFormat};
pub use summary::ImportSummary;
