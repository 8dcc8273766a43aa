use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::core::{LegislatorId, PostId, TopicCode};

/// A validated row of the `posts` table.
///
/// Every optional numeric column has already been through its fallback rule,
/// so a `Post` can always be written as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub lid: LegislatorId,
    pub topic: TopicCode,
    pub created_at: Option<NaiveDate>,
    pub text: Option<String>,
    pub attachment: Option<String>,

    // Engagement counters, 0 when absent
    pub retweet_count: i32,
    pub like_count: i32,
    pub reply_count: i32,
    pub quote_count: i32,
    pub count_misinfo: i32,

    pub interaction_score: Option<f64>,
    pub overperforming_score: Option<f64>,

    /// Clamped to [0, 1]
    pub civility_score: Option<f64>,
    /// Clamped to [0, 1]
    pub topic_probability: Option<f64>,

    pub toxicity: ToxicityScores,
}

/// Toxicity sub-scores, stored exactly as parsed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToxicityScores {
    pub toxicity: Option<f64>,
    pub severe_toxicity: Option<f64>,
    pub obscene: Option<f64>,
    pub threat: Option<f64>,
    pub insult: Option<f64>,
    pub identity_attack: Option<f64>,
}

impl Post {
    /// Column order used by every upsert statement.
    pub const COLUMNS: [&'static str; 21] = [
        "id",
        "lid",
        "created_at",
        "text",
        "attachment",
        "retweet_count",
        "like_count",
        "reply_count",
        "quote_count",
        "count_misinfo",
        "interaction_score",
        "overperforming_score",
        "civility_score",
        "topic",
        "topic_probability",
        "tox_toxicity",
        "tox_severe_toxicity",
        "tox_obscene",
        "tox_threat",
        "tox_insult",
        "tox_identity_attack",
    ];
}
