// Reference-entity writer - legislators first, then topics, in parameter-bounded statements

use tracing::{error, info};

use crate::config::ImportConfig;
use crate::error::AppResult;
use crate::infrastructure::database::IngestTransaction;
use crate::ingest::batching::rows_per_statement;
use crate::ingest::extractor::ReferenceSet;
use crate::models::{Legislator, Topic};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReferenceWriteStats {
    pub legislators: usize,
    pub topics: usize,
    pub statements: usize,
}

pub struct ReferenceWriter {
    legislator_rows: usize,
    topic_rows: usize,
}

impl ReferenceWriter {
    pub fn new(config: &ImportConfig) -> Self {
        Self {
            legislator_rows: rows_per_statement(
                Legislator::COLUMNS.len(),
                config.param_limit,
                config.reference_batch_size,
            ),
            topic_rows: rows_per_statement(
                Topic::COLUMNS.len(),
                config.param_limit,
                config.reference_batch_size,
            ),
        }
    }

    /// Upsert every candidate in key order. Any failing statement aborts the load.
    pub async fn write(
        &self,
        tx: &mut dyn IngestTransaction,
        references: &ReferenceSet,
    ) -> AppResult<ReferenceWriteStats> {
        let mut stats = ReferenceWriteStats::default();

        let legislators: Vec<Legislator> = references.legislators.values().cloned().collect();
        for chunk in legislators.chunks(self.legislator_rows) {
            if let Err(e) = tx.upsert_legislators(chunk).await {
                error!("Legislator batch at offset {} failed: {}", stats.legislators, e);
                return Err(e);
            }
            stats.legislators += chunk.len();
            stats.statements += 1;
        }
        info!("Wrote {} legislators", stats.legislators);

        let topics: Vec<Topic> = references.topics.values().cloned().collect();
        for chunk in topics.chunks(self.topic_rows) {
            if let Err(e) = tx.upsert_topics(chunk).await {
                error!("Topic batch at offset {} failed: {}", stats.topics, e);
                return Err(e);
            }
            stats.topics += chunk.len();
            stats.statements += 1;
        }
        info!("Wrote {} topics", stats.topics);

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::IngestStore;
    use crate::infrastructure::memory_store::{MemoryStore, StatementTable};
    use crate::ingest::record::RawRecord;

    #[tokio::test]
    async fn test_references_are_split_by_reference_batch_size() {
        let mut references = ReferenceSet::default();
        for i in 0..5 {
            let record: RawRecord = [("lid", format!("L{}", i)), ("topic", format!("T{}", i % 2))]
                .into_iter()
                .collect();
            references.observe(&record);
        }
        let config = ImportConfig {
            reference_batch_size: 2,
            ..ImportConfig::default()
        };

        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let stats = ReferenceWriter::new(&config)
            .write(tx.as_mut(), &references)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(stats, ReferenceWriteStats { legislators: 5, topics: 2, statements: 4 });
        assert_eq!(store.statements_for(StatementTable::Legislators), vec![2, 2, 1]);
        assert_eq!(store.statements_for(StatementTable::Topics), vec![2]);
    }

    #[test]
    fn test_param_ceiling_bounds_reference_statements() {
        let config = ImportConfig {
            param_limit: 24,
            ..ImportConfig::default()
        };
        let writer = ReferenceWriter::new(&config);
        assert_eq!(writer.legislator_rows, 4);
        assert_eq!(writer.topic_rows, 12);
    }
}
