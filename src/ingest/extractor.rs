// Reference-entity extractor - first pass over the source
// Builds the deduplicated legislator and topic sets the fact rows will point at

use futures::StreamExt;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::core::{LegislatorId, TopicCode};
use crate::error::AppResult;
use crate::ingest::record::RawRecord;
use crate::ingest::source::RecordSource;
use crate::models::{Legislator, Topic};

/// Legislator and topic candidates keyed for deterministic write order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceSet {
    pub legislators: BTreeMap<LegislatorId, Legislator>,
    pub topics: BTreeMap<TopicCode, Topic>,
}

impl ReferenceSet {
    /// Add the candidates carried by one record. The first sighting of a key wins.
    /// Returns false when the record has no legislator key.
    pub fn observe(&mut self, record: &RawRecord) -> bool {
        if let Some(code) = record.get("topic").and_then(TopicCode::parse) {
            self.topics
                .entry(code.clone())
                .or_insert_with(|| Topic::new(code, record.get("topic_label")));
        }

        let Some(lid) = record.get("lid").and_then(LegislatorId::parse) else {
            return false;
        };
        self.legislators.entry(lid.clone()).or_insert_with(|| {
            Legislator::new(
                lid,
                record.get("name"),
                record.get("handle"),
                record.get("state"),
                record.get("chamber"),
                record.get("party"),
            )
        });
        true
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionStats {
    pub records_scanned: u64,
    /// Records without a legislator key
    pub skipped: u64,
    /// Rows the source could not decode
    pub faults: u64,
    /// Set when a structural fault ended the pass early
    pub ended_at: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub references: ReferenceSet,
    pub stats: ExtractionStats,
}

pub struct ReferenceExtractor {
    log_interval: u64,
}

impl ReferenceExtractor {
    pub fn new(log_interval: u64) -> Self {
        Self {
            log_interval: log_interval.max(1),
        }
    }

    pub async fn run(&self, source: &dyn RecordSource) -> AppResult<Extraction> {
        info!("Scanning {} for legislators and topics", source.describe());
        let mut stream = source.open()?;
        let mut extraction = Extraction::default();

        while let Some(item) = stream.next().await {
            let stats = &mut extraction.stats;
            match item {
                Ok(record) => {
                    stats.records_scanned += 1;
                    if !extraction.references.observe(&record) {
                        stats.skipped += 1;
                        debug!("Record {} has no lid, skipped by extractor", stats.records_scanned);
                    }
                    if stats.records_scanned % self.log_interval == 0 {
                        info!(
                            "Scanned {} records: {} legislators, {} topics",
                            stats.records_scanned,
                            extraction.references.legislators.len(),
                            extraction.references.topics.len()
                        );
                    }
                }
                Err(fault) if fault.ends_pass() => {
                    warn!("Extractor stopped: {}", fault);
                    stats.ended_at = Some(fault.position());
                    break;
                }
                Err(fault) => {
                    stats.faults += 1;
                    warn!("Extractor {}", fault);
                }
            }
        }

        info!(
            "Extraction complete: {} records, {} legislators, {} topics, {} skipped",
            extraction.stats.records_scanned,
            extraction.references.legislators.len(),
            extraction.references.topics.len(),
            extraction.stats.skipped
        );
        Ok(extraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::source::{SourceFault, VecSource};

    fn record(pairs: &[(&str, &str)]) -> RawRecord {
        pairs.iter().copied().collect()
    }

    #[tokio::test]
    async fn test_first_sighting_wins() {
        let source = VecSource::new(vec![
            record(&[("lid", "L2"), ("name", "First"), ("topic", "T1")]),
            record(&[("lid", "L2"), ("name", "Second"), ("topic", "T1"), ("topic_label", "Later")]),
        ]);
        let extraction = ReferenceExtractor::new(100).run(&source).await.unwrap();

        let lid = LegislatorId::parse("L2").unwrap();
        assert_eq!(extraction.references.legislators[&lid].name, "First");
        let code = TopicCode::parse("T1").unwrap();
        assert_eq!(extraction.references.topics[&code].topic_label, "T1");
    }

    #[tokio::test]
    async fn test_topic_is_kept_without_lid() {
        let source = VecSource::new(vec![record(&[("id", "1"), ("topic", "T9"), ("topic_label", "Energy")])]);
        let extraction = ReferenceExtractor::new(100).run(&source).await.unwrap();

        assert!(extraction.references.legislators.is_empty());
        assert_eq!(extraction.references.topics.len(), 1);
        assert_eq!(extraction.stats.skipped, 1);
    }

    #[tokio::test]
    async fn test_structural_fault_keeps_scanned_records() {
        let source = VecSource::with_items(vec![
            Ok(record(&[("lid", "L1"), ("topic", "T1")])),
            Err(SourceFault::RowSkipped { position: 3, reason: "bad utf-8".into() }),
            Ok(record(&[("lid", "L2"), ("topic", "T1")])),
            Err(SourceFault::StreamBroken { position: 5, reason: "io".into() }),
            Ok(record(&[("lid", "L3"), ("topic", "T1")])),
        ]);
        let extraction = ReferenceExtractor::new(100).run(&source).await.unwrap();

        assert_eq!(extraction.references.legislators.len(), 2);
        assert_eq!(extraction.stats.faults, 1);
        assert_eq!(extraction.stats.ended_at, Some(5));
    }
}
