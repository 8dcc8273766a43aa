// Import pipeline - drives the four stages against one store
// Extraction, reference writes and fact rows share one transaction; views refresh after commit

use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::config::ImportConfig;
use crate::error::AppResult;
use crate::infrastructure::database::{IngestStore, IngestTransaction};
use crate::ingest::cast::CastTable;
use crate::ingest::extractor::{Extraction, ReferenceExtractor};
use crate::ingest::reference_writer::{ReferenceWriteStats, ReferenceWriter};
use crate::ingest::refresher::refresh_views;
use crate::ingest::source::RecordSource;
use crate::ingest::streamer::{FactStreamer, StreamStats};
use crate::ingest::summary::ImportSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Idle,
    Scanning,
    WritingReferences,
    Streaming,
    Committing,
    RefreshingViews,
    Done,
    RolledBack,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Idle => "idle",
            PipelineStage::Scanning => "scanning",
            PipelineStage::WritingReferences => "writing references",
            PipelineStage::Streaming => "streaming",
            PipelineStage::Committing => "committing",
            PipelineStage::RefreshingViews => "refreshing views",
            PipelineStage::Done => "done",
            PipelineStage::RolledBack => "rolled back",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineOptions {
    pub skip_refresh: bool,
}

struct Loaded {
    extraction: Extraction,
    references: ReferenceWriteStats,
    stream: StreamStats,
}

pub struct ImportPipeline {
    store: Arc<dyn IngestStore>,
    config: ImportConfig,
    options: PipelineOptions,
    casts: CastTable,
    stage: PipelineStage,
}

impl ImportPipeline {
    pub fn new(store: Arc<dyn IngestStore>, config: ImportConfig) -> Self {
        Self {
            store,
            config,
            options: PipelineOptions::default(),
            casts: CastTable::new(),
            stage: PipelineStage::Idle,
        }
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    fn enter(&mut self, stage: PipelineStage) {
        info!("Pipeline: {} -> {}", self.stage, stage);
        self.stage = stage;
    }

    /// Run every stage over `source`.
    ///
    /// Any failure before the commit rolls the whole load back. A refresh
    /// failure is returned as is; the committed rows are kept.
    pub async fn run(&mut self, source: &dyn RecordSource) -> AppResult<ImportSummary> {
        self.config.validate()?;
        let started = Instant::now();

        let mut tx = self.store.begin().await?;
        let loaded = match self.load(source, tx.as_mut()).await {
            Ok(loaded) => loaded,
            Err(e) => {
                error!("Import failed while {}: {}", self.stage, e);
                if let Err(rollback_err) = tx.rollback().await {
                    warn!("Rollback failed: {}", rollback_err);
                }
                self.enter(PipelineStage::RolledBack);
                return Err(e);
            }
        };

        self.enter(PipelineStage::Committing);
        if let Err(e) = tx.commit().await {
            error!("Commit failed: {}", e);
            self.enter(PipelineStage::RolledBack);
            return Err(e);
        }

        let table_counts = self.store.table_counts().await?;

        let mut views_refreshed = Vec::new();
        if self.options.skip_refresh {
            info!("View refresh skipped");
        } else {
            self.enter(PipelineStage::RefreshingViews);
            views_refreshed = refresh_views(self.store.as_ref())
                .await?
                .into_iter()
                .map(|(view, _)| view)
                .collect();
        }
        self.enter(PipelineStage::Done);

        Ok(ImportSummary {
            source: source.describe(),
            backend: self.store.backend_name(),
            legislators_written: loaded.references.legislators,
            topics_written: loaded.references.topics,
            posts_written: loaded.stream.posts_written,
            rows_skipped: loaded.stream.skipped,
            malformed_rows: loaded.extraction.stats.faults + loaded.stream.faults,
            duplicates_collapsed: loaded.stream.duplicates_collapsed,
            pass_ended_at: loaded.extraction.stats.ended_at.or(loaded.stream.ended_at),
            statements: loaded.references.statements as u64 + loaded.stream.statements,
            table_counts,
            views_refreshed,
            elapsed: started.elapsed(),
        })
    }

    async fn load(
        &mut self,
        source: &dyn RecordSource,
        tx: &mut dyn IngestTransaction,
    ) -> AppResult<Loaded> {
        self.enter(PipelineStage::Scanning);
        let extraction = ReferenceExtractor::new(self.config.log_interval)
            .run(source)
            .await?;

        self.enter(PipelineStage::WritingReferences);
        let references = ReferenceWriter::new(&self.config)
            .write(tx, &extraction.references)
            .await?;

        self.enter(PipelineStage::Streaming);
        let stream = FactStreamer::new(&self.casts, &self.config)
            .run(source, tx)
            .await?;

        Ok(Loaded {
            extraction,
            references,
            stream,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::memory_store::MemoryStore;
    use crate::infrastructure::schema::AggregateView;
    use crate::ingest::record::RawRecord;
    use crate::ingest::source::{SourceFault, VecSource};

    fn source() -> VecSource {
        let record: RawRecord = [("id", "1"), ("lid", "L1"), ("topic", "T1")].into_iter().collect();
        VecSource::new(vec![record])
    }

    #[tokio::test]
    async fn test_successful_run_ends_done() {
        let store = MemoryStore::new();
        let mut pipeline = ImportPipeline::new(Arc::new(store.clone()), ImportConfig::default());
        let summary = pipeline.run(&source()).await.unwrap();

        assert_eq!(pipeline.stage(), PipelineStage::Done);
        assert_eq!(summary.table_counts.posts, 1);
        assert_eq!(summary.views_refreshed, AggregateView::ALL.to_vec());
    }

    #[tokio::test]
    async fn test_skip_refresh_leaves_views_untouched() {
        let store = MemoryStore::new();
        let mut pipeline = ImportPipeline::new(Arc::new(store.clone()), ImportConfig::default())
            .with_options(PipelineOptions { skip_refresh: true });
        let summary = pipeline.run(&source()).await.unwrap();

        assert!(summary.views_refreshed.is_empty());
        assert!(store.view_rows(AggregateView::TopicEngagementDaily).await.is_none());
    }

    #[tokio::test]
    async fn test_summary_reports_an_input_that_ended_early() {
        let record: RawRecord = [("id", "1"), ("lid", "L1"), ("topic", "T1")].into_iter().collect();
        let source = VecSource::with_items(vec![
            Ok(record),
            Err(SourceFault::StreamBroken { position: 7, reason: "unexpected EOF".into() }),
        ]);
        let mut pipeline = ImportPipeline::new(Arc::new(MemoryStore::new()), ImportConfig::default());
        let summary = pipeline.run(&source).await.unwrap();

        assert_eq!(summary.pass_ended_at, Some(7));
        assert_eq!(summary.posts_written, 1);
    }

    #[tokio::test]
    async fn test_storage_failure_rolls_back() {
        let store = MemoryStore::failing_post_statement(1);
        let mut pipeline = ImportPipeline::new(Arc::new(store.clone()), ImportConfig::default());

        assert!(pipeline.run(&source()).await.is_err());
        assert_eq!(pipeline.stage(), PipelineStage::RolledBack);
        assert!(store.tables().await.legislators.is_empty());
    }

    #[tokio::test]
    async fn test_param_ceiling_below_one_post_row_is_rejected() {
        let store = MemoryStore::new();
        let config = ImportConfig {
            param_limit: 10,
            ..ImportConfig::default()
        };
        let mut pipeline = ImportPipeline::new(Arc::new(store.clone()), config);

        assert!(pipeline.run(&source()).await.is_err());
        assert!(store.statements().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected_before_any_write() {
        let store = MemoryStore::new();
        let config = ImportConfig {
            batch_size: 0,
            ..ImportConfig::default()
        };
        let mut pipeline = ImportPipeline::new(Arc::new(store.clone()), config);

        assert!(pipeline.run(&source()).await.is_err());
        assert_eq!(pipeline.stage(), PipelineStage::Idle);
        assert!(store.statements().is_empty());
    }
}
