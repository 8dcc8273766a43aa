// Database Interface - Storage seam for the ingestion pipeline
// Each upsert call issues exactly one statement; batching is the caller's job

use async_trait::async_trait;
use serde::Serialize;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder, Transaction};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::DatabaseConfig;
use crate::error::{AppError, AppResult};
use crate::infrastructure::schema::{AggregateView, SCHEMA_STATEMENTS};
use crate::models::{Legislator, Post, Topic};

/// Row counts read back after a load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TableCounts {
    pub legislators: i64,
    pub topics: i64,
    pub posts: i64,
}

/// One open, exclusively owned transaction.
///
/// Dropping it without calling `commit` discards every write made through it.
#[async_trait]
pub trait IngestTransaction: Send {
    async fn upsert_legislators(&mut self, rows: &[Legislator]) -> AppResult<()>;
    async fn upsert_topics(&mut self, rows: &[Topic]) -> AppResult<()>;
    async fn upsert_posts(&mut self, rows: &[Post]) -> AppResult<()>;
    async fn commit(self: Box<Self>) -> AppResult<()>;
    async fn rollback(self: Box<Self>) -> AppResult<()>;
}

/// Storage backend the pipeline writes into.
#[async_trait]
pub trait IngestStore: Send + Sync {
    fn backend_name(&self) -> &'static str;

    /// Create missing tables, indexes and views
    async fn ensure_schema(&self) -> AppResult<()>;

    async fn begin(&self) -> AppResult<Box<dyn IngestTransaction>>;

    /// Recompute one derived view from committed data
    async fn refresh_view(&self, view: AggregateView) -> AppResult<()>;

    async fn table_counts(&self) -> AppResult<TableCounts>;
}

/// `ON CONFLICT (key) DO UPDATE SET col = EXCLUDED.col, ...` for every non-key column.
pub fn conflict_update_clause(key: &str, columns: &[&str]) -> String {
    let assignments = columns
        .iter()
        .filter(|column| **column != key)
        .map(|column| format!("{0} = EXCLUDED.{0}", column))
        .collect::<Vec<_>>()
        .join(", ");
    format!(" ON CONFLICT ({}) DO UPDATE SET {}", key, assignments)
}

fn insert_prefix(table: &str, columns: &[&str]) -> String {
    format!("INSERT INTO {} ({}) ", table, columns.join(", "))
}

/// PostgreSQL implementation of the ingestion store
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &DatabaseConfig) -> AppResult<Self> {
        info!("Connecting to PostgreSQL at {}", config.display_target());
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connection_timeout())
            .idle_timeout(Duration::from_secs(600))
            .test_before_acquire(true)
            .connect_with(config.connect_options()?)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to connect to database: {}", e)))?;

        let store = Self::new(pool);
        store.health_check().await?;
        Ok(store)
    }

    /// Health check to verify database connectivity
    pub async fn health_check(&self) -> AppResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Database health check failed: {}", e)))?;
        Ok(())
    }

    /// Release pooled connections
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn count(&self, table: &str) -> AppResult<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", table);
        sqlx::query_scalar::<_, i64>(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to count {}: {}", table, e)))
    }
}

#[async_trait]
impl IngestStore for PostgresStore {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn ensure_schema(&self) -> AppResult<()> {
        for statement in SCHEMA_STATEMENTS {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::DatabaseError(format!("Failed to create schema: {}", e)))?;
        }
        info!("Schema verified ({} statements)", SCHEMA_STATEMENTS.len());
        Ok(())
    }

    async fn begin(&self) -> AppResult<Box<dyn IngestTransaction>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to begin transaction: {}", e)))?;
        Ok(Box::new(PostgresTransaction { tx }))
    }

    async fn refresh_view(&self, view: AggregateView) -> AppResult<()> {
        let sql = format!("REFRESH MATERIALIZED VIEW {}", view.name());
        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::RefreshError {
                view: view.name().to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn table_counts(&self) -> AppResult<TableCounts> {
        Ok(TableCounts {
            legislators: self.count("legislators").await?,
            topics: self.count("topics").await?,
            posts: self.count("posts").await?,
        })
    }
}

/// Transaction wrapper for the pipeline's single connection
pub struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl IngestTransaction for PostgresTransaction {
    async fn upsert_legislators(&mut self, rows: &[Legislator]) -> AppResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(insert_prefix("legislators", &Legislator::COLUMNS));
        qb.push_values(rows, |mut b, leg| {
            b.push_bind(leg.lid.as_str())
                .push_bind(leg.name.as_str())
                .push_bind(leg.handle.as_deref())
                .push_bind(leg.state.as_deref())
                .push_bind(leg.chamber.as_deref())
                .push_bind(leg.party.as_deref());
        });
        qb.push(conflict_update_clause("lid", &Legislator::COLUMNS));

        qb.build()
            .execute(&mut *self.tx)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to upsert {} legislators: {}", rows.len(), e)))?;
        debug!("Upserted {} legislators", rows.len());
        Ok(())
    }

    async fn upsert_topics(&mut self, rows: &[Topic]) -> AppResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(insert_prefix("topics", &Topic::COLUMNS));
        qb.push_values(rows, |mut b, topic| {
            b.push_bind(topic.topic.as_str())
                .push_bind(topic.topic_label.as_str());
        });
        qb.push(conflict_update_clause("topic", &Topic::COLUMNS));

        qb.build()
            .execute(&mut *self.tx)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to upsert {} topics: {}", rows.len(), e)))?;
        debug!("Upserted {} topics", rows.len());
        Ok(())
    }

    async fn upsert_posts(&mut self, rows: &[Post]) -> AppResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        // Bind order must follow Post::COLUMNS
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(insert_prefix("posts", &Post::COLUMNS));
        qb.push_values(rows, |mut b, post| {
            b.push_bind(post.id.as_str())
                .push_bind(post.lid.as_str())
                .push_bind(post.created_at)
                .push_bind(post.text.as_deref())
                .push_bind(post.attachment.as_deref())
                .push_bind(post.retweet_count)
                .push_bind(post.like_count)
                .push_bind(post.reply_count)
                .push_bind(post.quote_count)
                .push_bind(post.count_misinfo)
                .push_bind(post.interaction_score)
                .push_bind(post.overperforming_score)
                .push_bind(post.civility_score)
                .push_bind(post.topic.as_str())
                .push_bind(post.topic_probability)
                .push_bind(post.toxicity.toxicity)
                .push_bind(post.toxicity.severe_toxicity)
                .push_bind(post.toxicity.obscene)
                .push_bind(post.toxicity.threat)
                .push_bind(post.toxicity.insult)
                .push_bind(post.toxicity.identity_attack);
        });
        qb.push(conflict_update_clause("id", &Post::COLUMNS));

        qb.build()
            .execute(&mut *self.tx)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to upsert {} posts: {}", rows.len(), e)))?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let this = *self;
        this.tx
            .commit()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to commit transaction: {}", e)))
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        let this = *self;
        this.tx
            .rollback()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to rollback transaction: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_clause_skips_key() {
        let clause = conflict_update_clause("topic", &Topic::COLUMNS);
        assert_eq!(
            clause,
            " ON CONFLICT (topic) DO UPDATE SET topic_label = EXCLUDED.topic_label"
        );
    }

    #[test]
    fn test_post_clause_overwrites_every_non_key_column() {
        let clause = conflict_update_clause("id", &Post::COLUMNS);
        for column in Post::COLUMNS.iter().filter(|c| **c != "id") {
            assert!(clause.contains(&format!("{0} = EXCLUDED.{0}", column)));
        }
        assert!(!clause.contains(" id = EXCLUDED.id"));
    }

    #[test]
    fn test_insert_prefix_lists_columns() {
        assert_eq!(
            insert_prefix("legislators", &Legislator::COLUMNS),
            "INSERT INTO legislators (lid, name, handle, state, chamber, party) "
        );
    }
}
