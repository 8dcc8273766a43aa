// In-memory ingestion store
// Mirrors the PostgreSQL contract closely enough to run the whole pipeline without a server:
// key upserts, foreign keys, [0,1] checks, staged writes until commit, and one
// recorded statement per upsert call.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;

use crate::core::{LegislatorId, PostId, TopicCode};
use crate::error::{AppError, AppResult};
use crate::infrastructure::database::{IngestStore, IngestTransaction, TableCounts};
use crate::infrastructure::schema::AggregateView;
use crate::models::{Legislator, Post, Topic};

/// Committed (or staged) table contents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryTables {
    pub legislators: BTreeMap<LegislatorId, Legislator>,
    pub topics: BTreeMap<TopicCode, Topic>,
    pub posts: BTreeMap<PostId, Post>,
}

impl MemoryTables {
    /// Posts whose legislator or topic row is missing.
    pub fn dangling_posts(&self) -> Vec<&Post> {
        self.posts
            .values()
            .filter(|post| {
                !self.legislators.contains_key(&post.lid) || !self.topics.contains_key(&post.topic)
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementTable {
    Legislators,
    Topics,
    Posts,
}

/// One executed upsert statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatementRecord {
    pub table: StatementTable,
    pub rows: usize,
}

/// One row of a derived aggregate view.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRow {
    /// Date, party or state depending on the view
    pub dimension: Option<String>,
    pub topic: String,
    pub topic_label: String,
    pub post_count: i64,
    pub total_likes: i64,
    pub total_retweets: i64,
    pub total_replies: i64,
    pub total_quotes: i64,
}

#[derive(Debug, Default)]
struct FailurePlan {
    /// 1-based index of the post statement that fails
    post_statement: Option<usize>,
    views: HashSet<AggregateView>,
}

#[derive(Debug, Default)]
struct Shared {
    tables: RwLock<MemoryTables>,
    views: RwLock<HashMap<AggregateView, Vec<AggregateRow>>>,
    statements: Mutex<Vec<StatementRecord>>,
    post_statements: AtomicUsize,
    failures: FailurePlan,
}

/// In-process store used for dry runs and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose `n`th post statement (1-based) fails.
    pub fn failing_post_statement(n: usize) -> Self {
        Self::with_failures(FailurePlan {
            post_statement: Some(n),
            views: HashSet::new(),
        })
    }

    /// A store whose refresh of `view` fails.
    pub fn failing_refresh(view: AggregateView) -> Self {
        Self::with_failures(FailurePlan {
            post_statement: None,
            views: HashSet::from([view]),
        })
    }

    fn with_failures(failures: FailurePlan) -> Self {
        Self {
            shared: Arc::new(Shared {
                failures,
                ..Shared::default()
            }),
        }
    }

    pub async fn tables(&self) -> MemoryTables {
        self.shared.tables.read().await.clone()
    }

    pub async fn view_rows(&self, view: AggregateView) -> Option<Vec<AggregateRow>> {
        self.shared.views.read().await.get(&view).cloned()
    }

    pub fn statements(&self) -> Vec<StatementRecord> {
        self.shared
            .statements
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    pub fn statements_for(&self, table: StatementTable) -> Vec<usize> {
        self.statements()
            .into_iter()
            .filter(|stmt| stmt.table == table)
            .map(|stmt| stmt.rows)
            .collect()
    }
}

#[async_trait]
impl IngestStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn ensure_schema(&self) -> AppResult<()> {
        Ok(())
    }

    async fn begin(&self) -> AppResult<Box<dyn IngestTransaction>> {
        let staged = self.shared.tables.read().await.clone();
        Ok(Box::new(MemoryTransaction {
            shared: self.shared.clone(),
            staged,
        }))
    }

    async fn refresh_view(&self, view: AggregateView) -> AppResult<()> {
        if self.shared.failures.views.contains(&view) {
            return Err(AppError::RefreshError {
                view: view.name().to_string(),
                message: "refresh failed".to_string(),
            });
        }
        let rows = {
            let tables = self.shared.tables.read().await;
            aggregate(&tables, view)
        };
        self.shared.views.write().await.insert(view, rows);
        Ok(())
    }

    async fn table_counts(&self) -> AppResult<TableCounts> {
        let tables = self.shared.tables.read().await;
        Ok(TableCounts {
            legislators: tables.legislators.len() as i64,
            topics: tables.topics.len() as i64,
            posts: tables.posts.len() as i64,
        })
    }
}

/// Writes are applied to a private copy and published on commit.
pub struct MemoryTransaction {
    shared: Arc<Shared>,
    staged: MemoryTables,
}

impl MemoryTransaction {
    fn record(&self, table: StatementTable, rows: usize) {
        if let Ok(mut log) = self.shared.statements.lock() {
            log.push(StatementRecord { table, rows });
        }
    }
}

fn check_unit(column: &str, value: Option<f64>) -> AppResult<()> {
    match value {
        Some(v) if !(0.0..=1.0).contains(&v) => Err(AppError::DatabaseError(format!(
            "new row for relation \"posts\" violates check constraint on {} ({})",
            column, v
        ))),
        _ => Ok(()),
    }
}

#[async_trait]
impl IngestTransaction for MemoryTransaction {
    async fn upsert_legislators(&mut self, rows: &[Legislator]) -> AppResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        for row in rows {
            self.staged.legislators.insert(row.lid.clone(), row.clone());
        }
        self.record(StatementTable::Legislators, rows.len());
        Ok(())
    }

    async fn upsert_topics(&mut self, rows: &[Topic]) -> AppResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        for row in rows {
            self.staged.topics.insert(row.topic.clone(), row.clone());
        }
        self.record(StatementTable::Topics, rows.len());
        Ok(())
    }

    async fn upsert_posts(&mut self, rows: &[Post]) -> AppResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let ordinal = self.shared.post_statements.fetch_add(1, Ordering::SeqCst) + 1;
        if self.shared.failures.post_statement == Some(ordinal) {
            return Err(AppError::DatabaseError(format!(
                "injected failure on post statement {}",
                ordinal
            )));
        }

        // The statement is validated as a whole before any row is applied
        let mut seen = HashSet::new();
        for post in rows {
            if !seen.insert(&post.id) {
                return Err(AppError::DatabaseError(format!(
                    "ON CONFLICT DO UPDATE command cannot affect row a second time (id {})",
                    post.id
                )));
            }
            if !self.staged.legislators.contains_key(&post.lid) {
                return Err(AppError::DatabaseError(format!(
                    "insert on table \"posts\" violates foreign key: lid {} not present",
                    post.lid
                )));
            }
            if !self.staged.topics.contains_key(&post.topic) {
                return Err(AppError::DatabaseError(format!(
                    "insert on table \"posts\" violates foreign key: topic {} not present",
                    post.topic
                )));
            }
            check_unit("civility_score", post.civility_score)?;
            check_unit("topic_probability", post.topic_probability)?;
        }

        for post in rows {
            self.staged.posts.insert(post.id.clone(), post.clone());
        }
        self.record(StatementTable::Posts, rows.len());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let this = *self;
        *this.shared.tables.write().await = this.staged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        Ok(())
    }
}

#[derive(Default)]
struct Totals {
    label: String,
    posts: i64,
    likes: i64,
    retweets: i64,
    replies: i64,
    quotes: i64,
}

fn aggregate(tables: &MemoryTables, view: AggregateView) -> Vec<AggregateRow> {
    let mut groups: BTreeMap<(Option<String>, String), Totals> = BTreeMap::new();

    for post in tables.posts.values() {
        let Some(topic) = tables.topics.get(&post.topic) else {
            continue;
        };
        let dimension = match view {
            AggregateView::TopicEngagementDaily => post.created_at.map(format_date),
            AggregateView::TopicPartyBreakdown | AggregateView::TopicStateBreakdown => {
                let Some(legislator) = tables.legislators.get(&post.lid) else {
                    continue;
                };
                let value = if view == AggregateView::TopicPartyBreakdown {
                    legislator.party.clone()
                } else {
                    legislator.state.clone()
                };
                match value {
                    Some(value) => Some(value),
                    None => continue,
                }
            }
        };

        let totals = groups
            .entry((dimension, post.topic.as_str().to_string()))
            .or_default();
        totals.label = topic.topic_label.clone();
        totals.posts += 1;
        totals.likes += i64::from(post.like_count);
        totals.retweets += i64::from(post.retweet_count);
        totals.replies += i64::from(post.reply_count);
        totals.quotes += i64::from(post.quote_count);
    }

    groups
        .into_iter()
        .map(|((dimension, topic), totals)| AggregateRow {
            dimension,
            topic,
            topic_label: totals.label,
            post_count: totals.posts,
            total_likes: totals.likes,
            total_retweets: totals.retweets,
            total_replies: totals.replies,
            total_quotes: totals.quotes,
        })
        .collect()
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::post::ToxicityScores;

    fn legislator(lid: &str, party: Option<&str>) -> Legislator {
        Legislator::new(LegislatorId::parse(lid).unwrap(), Some("Name"), None, Some("NY"), None, party)
    }

    fn topic(code: &str) -> Topic {
        Topic::new(TopicCode::parse(code).unwrap(), None)
    }

    fn post(id: &str, lid: &str, topic: &str, likes: i32) -> Post {
        Post {
            id: PostId::parse(id).unwrap(),
            lid: LegislatorId::parse(lid).unwrap(),
            topic: TopicCode::parse(topic).unwrap(),
            created_at: NaiveDate::from_ymd_opt(2021, 1, 1),
            text: None,
            attachment: None,
            retweet_count: 1,
            like_count: likes,
            reply_count: 0,
            quote_count: 0,
            count_misinfo: 0,
            interaction_score: None,
            overperforming_score: None,
            civility_score: None,
            topic_probability: None,
            toxicity: ToxicityScores::default(),
        }
    }

    #[tokio::test]
    async fn test_uncommitted_writes_are_invisible() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.upsert_legislators(&[legislator("L1", None)]).await.unwrap();
        drop(tx);

        assert!(store.tables().await.legislators.is_empty());
    }

    #[tokio::test]
    async fn test_commit_publishes_writes() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.upsert_legislators(&[legislator("L1", None)]).await.unwrap();
        tx.upsert_topics(&[topic("T1")]).await.unwrap();
        tx.upsert_posts(&[post("1", "L1", "T1", 3)]).await.unwrap();
        tx.commit().await.unwrap();

        let counts = store.table_counts().await.unwrap();
        assert_eq!(counts, TableCounts { legislators: 1, topics: 1, posts: 1 });
        assert_eq!(store.statements().len(), 3);
    }

    #[tokio::test]
    async fn test_foreign_keys_are_enforced() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.upsert_topics(&[topic("T1")]).await.unwrap();
        let err = tx.upsert_posts(&[post("1", "L404", "T1", 0)]).await.unwrap_err();
        assert!(err.to_string().contains("foreign key"));
    }

    #[tokio::test]
    async fn test_duplicate_ids_in_one_statement_are_rejected() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.upsert_legislators(&[legislator("L1", None)]).await.unwrap();
        tx.upsert_topics(&[topic("T1")]).await.unwrap();
        let rows = [post("1", "L1", "T1", 0), post("1", "L1", "T1", 5)];
        assert!(tx.upsert_posts(&rows).await.is_err());
    }

    #[tokio::test]
    async fn test_refresh_aggregates_committed_posts() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.upsert_legislators(&[legislator("L1", Some("Democratic")), legislator("L2", None)])
            .await
            .unwrap();
        tx.upsert_topics(&[topic("T1")]).await.unwrap();
        tx.upsert_posts(&[post("1", "L1", "T1", 3), post("2", "L2", "T1", 4)])
            .await
            .unwrap();
        tx.commit().await.unwrap();

        store.refresh_view(AggregateView::TopicPartyBreakdown).await.unwrap();
        let rows = store.view_rows(AggregateView::TopicPartyBreakdown).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].dimension.as_deref(), Some("Democratic"));
        assert_eq!(rows[0].total_likes, 3);

        store.refresh_view(AggregateView::TopicEngagementDaily).await.unwrap();
        let daily = store.view_rows(AggregateView::TopicEngagementDaily).await.unwrap();
        assert_eq!(daily[0].dimension.as_deref(), Some("2021-01-01"));
        assert_eq!(daily[0].post_count, 2);
    }
}
