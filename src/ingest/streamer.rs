// Fact-row streamer - second pass over the source
// Casts every record into a post, buffers valid rows and flushes them in bounded statements

use futures::StreamExt;
use tracing::{debug, error, info, warn};

use crate::config::ImportConfig;
use crate::error::AppResult;
use crate::infrastructure::database::IngestTransaction;
use crate::ingest::batching::{dedupe_last_by_key, rows_per_statement};
use crate::ingest::cast::CastTable;
use crate::ingest::source::RecordSource;
use crate::models::Post;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub records_read: u64,
    /// Rows written, counted once per statement row
    pub posts_written: u64,
    /// Records dropped for a missing id, lid or topic
    pub skipped: u64,
    /// Rows the source could not decode
    pub faults: u64,
    /// Rows superseded by a later row with the same id in the same batch
    pub duplicates_collapsed: u64,
    pub batches: u64,
    pub statements: u64,
    /// Set when a structural fault ended the pass early
    pub ended_at: Option<u64>,
}

pub struct FactStreamer<'a> {
    casts: &'a CastTable,
    batch_size: usize,
    rows_per_statement: usize,
    log_interval: u64,
}

impl<'a> FactStreamer<'a> {
    pub fn new(casts: &'a CastTable, config: &ImportConfig) -> Self {
        Self {
            casts,
            batch_size: config.batch_size.max(1),
            rows_per_statement: rows_per_statement(
                Post::COLUMNS.len(),
                config.param_limit,
                config.sub_batch_size,
            ),
            log_interval: config.log_interval.max(1),
        }
    }

    pub async fn run(
        &self,
        source: &dyn RecordSource,
        tx: &mut dyn IngestTransaction,
    ) -> AppResult<StreamStats> {
        info!(
            "Streaming posts from {} (batch {}, {} rows per statement)",
            source.describe(),
            self.batch_size,
            self.rows_per_statement
        );
        let mut stream = source.open()?;
        let mut stats = StreamStats::default();
        let mut batch: Vec<Post> = Vec::with_capacity(self.batch_size);

        while let Some(item) = stream.next().await {
            match item {
                Ok(record) => {
                    stats.records_read += 1;
                    match self.casts.build_post(&record) {
                        Ok(post) => batch.push(post),
                        Err(missing) => {
                            stats.skipped += 1;
                            debug!("Record {} dropped: missing {}", stats.records_read, missing);
                        }
                    }
                    if batch.len() >= self.batch_size {
                        self.flush(&mut batch, tx, &mut stats).await?;
                    }
                    if stats.records_read % self.log_interval == 0 {
                        info!(
                            "Progress: {} records read, {} posts written, {} skipped",
                            stats.records_read, stats.posts_written, stats.skipped
                        );
                    }
                }
                Err(fault) if fault.ends_pass() => {
                    warn!("Streamer stopped: {}", fault);
                    stats.ended_at = Some(fault.position());
                    break;
                }
                Err(fault) => {
                    stats.faults += 1;
                    warn!("Streamer {}", fault);
                }
            }
        }

        self.flush(&mut batch, tx, &mut stats).await?;
        info!(
            "Streaming complete: {} records, {} posts written in {} statements, {} skipped",
            stats.records_read, stats.posts_written, stats.statements, stats.skipped
        );
        Ok(stats)
    }

    /// Write the buffered rows, one statement per sub-batch, in source order.
    async fn flush(
        &self,
        batch: &mut Vec<Post>,
        tx: &mut dyn IngestTransaction,
        stats: &mut StreamStats,
    ) -> AppResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let buffered = batch.len();
        let rows = dedupe_last_by_key(std::mem::take(batch), |post| post.id.clone());
        stats.duplicates_collapsed += (buffered - rows.len()) as u64;
        stats.batches += 1;

        for chunk in rows.chunks(self.rows_per_statement) {
            if let Err(e) = tx.upsert_posts(chunk).await {
                error!(
                    "Post statement of {} rows in batch {} failed: {}",
                    chunk.len(),
                    stats.batches,
                    e
                );
                return Err(e);
            }
            stats.posts_written += chunk.len() as u64;
            stats.statements += 1;
        }
        debug!("Flushed batch {} ({} rows)", stats.batches, rows.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::IngestStore;
    use crate::infrastructure::memory_store::{MemoryStore, StatementTable};
    use crate::ingest::extractor::ReferenceSet;
    use crate::ingest::record::RawRecord;
    use crate::ingest::reference_writer::ReferenceWriter;
    use crate::ingest::source::{SourceFault, SourceItem, VecSource};

    fn post_record(id: &str, likes: &str) -> RawRecord {
        [("id", id), ("lid", "L1"), ("topic", "T1"), ("like_count", likes)]
            .into_iter()
            .collect()
    }

    async fn load(items: Vec<SourceItem>, config: &ImportConfig) -> (MemoryStore, AppResult<StreamStats>) {
        let store = MemoryStore::new();
        let mut references = ReferenceSet::default();
        references.observe(&post_record("0", "0"));

        let mut tx = store.begin().await.unwrap();
        ReferenceWriter::new(config)
            .write(tx.as_mut(), &references)
            .await
            .unwrap();
        let casts = CastTable::new();
        let source = VecSource::with_items(items);
        let result = FactStreamer::new(&casts, config).run(&source, tx.as_mut()).await;
        if result.is_ok() {
            tx.commit().await.unwrap();
        }
        (store, result)
    }

    #[tokio::test]
    async fn test_batches_are_split_into_sub_batches() {
        let config = ImportConfig {
            batch_size: 5,
            sub_batch_size: 3,
            ..ImportConfig::default()
        };
        let items = (0..7).map(|i| Ok(post_record(&i.to_string(), "1"))).collect();
        let (store, result) = load(items, &config).await;
        let stats = result.unwrap();

        assert_eq!(store.statements_for(StatementTable::Posts), vec![3, 2, 2]);
        assert_eq!(stats.batches, 2);
        assert_eq!(stats.posts_written, 7);
    }

    #[tokio::test]
    async fn test_duplicate_ids_in_one_batch_keep_the_last_row() {
        let config = ImportConfig::default();
        let items = vec![
            Ok(post_record("1", "3")),
            Ok(post_record("2", "4")),
            Ok(post_record("1", "9")),
        ];
        let (store, result) = load(items, &config).await;
        let stats = result.unwrap();

        assert_eq!(stats.duplicates_collapsed, 1);
        let tables = store.tables().await;
        let id = crate::core::PostId::parse("1").unwrap();
        assert_eq!(tables.posts[&id].like_count, 9);
        assert_eq!(tables.posts.len(), 2);
    }

    #[tokio::test]
    async fn test_rows_missing_keys_are_counted() {
        let config = ImportConfig::default();
        let no_topic: RawRecord = [("id", "5"), ("lid", "L1")].into_iter().collect();
        let items = vec![Ok(post_record("1", "0")), Ok(no_topic)];
        let (store, result) = load(items, &config).await;

        assert_eq!(result.unwrap().skipped, 1);
        assert_eq!(store.tables().await.posts.len(), 1);
    }

    #[tokio::test]
    async fn test_structural_fault_flushes_and_ends_the_pass() {
        let config = ImportConfig::default();
        let items = vec![
            Ok(post_record("1", "0")),
            Err(SourceFault::RowSkipped { position: 3, reason: "ragged".into() }),
            Ok(post_record("2", "0")),
            Err(SourceFault::StreamBroken { position: 4, reason: "io".into() }),
            Ok(post_record("3", "0")),
        ];
        let (store, result) = load(items, &config).await;
        let stats = result.unwrap();

        assert_eq!(stats.faults, 1);
        assert_eq!(stats.ended_at, Some(4));
        assert_eq!(store.tables().await.posts.len(), 2);
    }
}
