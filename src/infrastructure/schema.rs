// Schema bootstrap - tables, indexes and the derived aggregate views
// Every statement is idempotent; existing objects are never dropped or altered

use serde::Serialize;
use std::fmt;

/// Derived aggregate views recomputed after every load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateView {
    TopicEngagementDaily,
    TopicPartyBreakdown,
    TopicStateBreakdown,
}

impl AggregateView {
    /// Refresh order.
    pub const ALL: [AggregateView; 3] = [
        AggregateView::TopicEngagementDaily,
        AggregateView::TopicPartyBreakdown,
        AggregateView::TopicStateBreakdown,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AggregateView::TopicEngagementDaily => "topic_engagement_daily",
            AggregateView::TopicPartyBreakdown => "topic_party_breakdown",
            AggregateView::TopicStateBreakdown => "topic_state_breakdown",
        }
    }
}

impl fmt::Display for AggregateView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub const SCHEMA_STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS legislators (
        lid TEXT PRIMARY KEY NOT NULL,
        name TEXT NOT NULL,
        handle TEXT,
        state TEXT,
        chamber TEXT,
        party TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS topics (
        topic TEXT PRIMARY KEY NOT NULL,
        topic_label TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS posts (
        id TEXT PRIMARY KEY NOT NULL,
        lid TEXT NOT NULL REFERENCES legislators(lid) ON DELETE CASCADE,
        created_at DATE,
        text TEXT,
        attachment TEXT,
        retweet_count INTEGER NOT NULL DEFAULT 0,
        like_count INTEGER NOT NULL DEFAULT 0,
        reply_count INTEGER NOT NULL DEFAULT 0,
        quote_count INTEGER NOT NULL DEFAULT 0,
        count_misinfo INTEGER NOT NULL DEFAULT 0,
        interaction_score DOUBLE PRECISION,
        overperforming_score DOUBLE PRECISION,
        civility_score DOUBLE PRECISION CHECK (civility_score IS NULL OR (civility_score >= 0 AND civility_score <= 1)),
        topic TEXT NOT NULL REFERENCES topics(topic) ON DELETE RESTRICT,
        topic_probability DOUBLE PRECISION CHECK (topic_probability IS NULL OR (topic_probability >= 0 AND topic_probability <= 1)),
        tox_toxicity DOUBLE PRECISION,
        tox_severe_toxicity DOUBLE PRECISION,
        tox_obscene DOUBLE PRECISION,
        tox_threat DOUBLE PRECISION,
        tox_insult DOUBLE PRECISION,
        tox_identity_attack DOUBLE PRECISION
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_legislators_state ON legislators(state)",
    "CREATE INDEX IF NOT EXISTS idx_legislators_party ON legislators(party)",
    "CREATE INDEX IF NOT EXISTS idx_posts_created_at ON posts(created_at)",
    "CREATE INDEX IF NOT EXISTS idx_posts_lid ON posts(lid)",
    "CREATE INDEX IF NOT EXISTS idx_posts_topic ON posts(topic)",
    "CREATE INDEX IF NOT EXISTS idx_posts_lid_date ON posts(lid, created_at)",
    r#"
    CREATE MATERIALIZED VIEW IF NOT EXISTS topic_engagement_daily AS
    SELECT
        p.created_at AS date,
        p.topic,
        t.topic_label,
        count(*) AS post_count,
        sum(p.like_count) AS total_likes,
        sum(p.retweet_count) AS total_retweets,
        sum(p.reply_count) AS total_replies,
        sum(p.quote_count) AS total_quotes
    FROM posts p
    JOIN topics t ON p.topic = t.topic
    GROUP BY p.created_at, p.topic, t.topic_label
    WITH NO DATA
    "#,
    r#"
    CREATE MATERIALIZED VIEW IF NOT EXISTS topic_party_breakdown AS
    SELECT
        p.topic,
        t.topic_label,
        l.party,
        count(*) AS post_count,
        sum(p.like_count) AS total_likes,
        sum(p.retweet_count) AS total_retweets,
        sum(p.reply_count) AS total_replies,
        sum(p.quote_count) AS total_quotes
    FROM posts p
    JOIN topics t ON p.topic = t.topic
    JOIN legislators l ON p.lid = l.lid
    WHERE l.party IS NOT NULL
    GROUP BY p.topic, t.topic_label, l.party
    WITH NO DATA
    "#,
    r#"
    CREATE MATERIALIZED VIEW IF NOT EXISTS topic_state_breakdown AS
    SELECT
        p.topic,
        t.topic_label,
        l.state,
        count(*) AS post_count,
        sum(p.like_count) AS total_likes,
        sum(p.retweet_count) AS total_retweets,
        sum(p.reply_count) AS total_replies,
        sum(p.quote_count) AS total_quotes
    FROM posts p
    JOIN topics t ON p.topic = t.topic
    JOIN legislators l ON p.lid = l.lid
    WHERE l.state IS NOT NULL
    GROUP BY p.topic, t.topic_label, l.state
    WITH NO DATA
    "#,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_view_is_created_by_the_bootstrap() {
        for view in AggregateView::ALL {
            let ddl = format!("MATERIALIZED VIEW IF NOT EXISTS {} ", view.name());
            assert!(
                SCHEMA_STATEMENTS.iter().any(|stmt| stmt.contains(&ddl)),
                "missing DDL for {}",
                view
            );
        }
    }

    #[test]
    fn test_bootstrap_never_drops() {
        for stmt in SCHEMA_STATEMENTS {
            assert!(!stmt.to_uppercase().contains("DROP "));
        }
    }
}
