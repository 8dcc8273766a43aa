// Run summary logged at the end of a successful import

use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

use crate::infrastructure::database::TableCounts;
use crate::infrastructure::schema::AggregateView;

#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    pub source: String,
    pub backend: &'static str,
    pub legislators_written: usize,
    pub topics_written: usize,
    pub posts_written: u64,
    /// Fact rows dropped for a missing key
    pub rows_skipped: u64,
    /// Rows the source could not decode, both passes
    pub malformed_rows: u64,
    pub duplicates_collapsed: u64,
    /// Line at which an unreadable input ended a pass early
    pub pass_ended_at: Option<u64>,
    pub statements: u64,
    pub table_counts: TableCounts,
    pub views_refreshed: Vec<AggregateView>,
    pub elapsed: Duration,
}

impl ImportSummary {
    pub fn rows_per_minute(&self) -> f64 {
        let minutes = self.elapsed.as_secs_f64() / 60.0;
        if minutes <= 0.0 {
            return self.posts_written as f64;
        }
        self.posts_written as f64 / minutes
    }

    pub fn log(&self) {
        info!("Import of {} into {} finished", self.source, self.backend);
        info!(
            "  written: {} legislators, {} topics, {} posts ({} statements)",
            self.legislators_written, self.topics_written, self.posts_written, self.statements
        );
        info!(
            "  skipped: {} rows missing a key, {} malformed rows, {} duplicate ids collapsed",
            self.rows_skipped, self.malformed_rows, self.duplicates_collapsed
        );
        if let Some(line) = self.pass_ended_at {
            warn!("  input ended early near line {}; later rows were not loaded", line);
        }
        info!(
            "  tables: legislators={}, topics={}, posts={}",
            self.table_counts.legislators, self.table_counts.topics, self.table_counts.posts
        );
        if self.views_refreshed.is_empty() {
            info!("  views: refresh skipped");
        } else {
            let views: Vec<&str> = self.views_refreshed.iter().map(|view| view.name()).collect();
            info!("  views: {}", views.join(", "));
        }
        info!(
            "  elapsed: {:.1}s ({:.0} rows/min)",
            self.elapsed.as_secs_f64(),
            self.rows_per_minute()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_per_minute() {
        let summary = ImportSummary {
            source: "test".into(),
            backend: "memory",
            legislators_written: 1,
            topics_written: 1,
            posts_written: 600,
            rows_skipped: 0,
            malformed_rows: 0,
            duplicates_collapsed: 0,
            pass_ended_at: None,
            statements: 1,
            table_counts: TableCounts::default(),
            views_refreshed: Vec::new(),
            elapsed: Duration::from_secs(30),
        };
        assert_eq!(summary.rows_per_minute(), 1200.0);
    }
}
