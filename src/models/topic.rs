use serde::{Deserialize, Serialize};

use crate::core::TopicCode;

/// A row of the `topics` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub topic: TopicCode,
    pub topic_label: String,
}

impl Topic {
    pub const COLUMNS: [&'static str; 2] = ["topic", "topic_label"];

    /// The label defaults to the code when the source carries none.
    pub fn new(topic: TopicCode, label: Option<&str>) -> Self {
        let topic_label = match label.map(str::trim) {
            Some(label) if !label.is_empty() => label.to_string(),
            _ => topic.as_str().to_string(),
        };
        Self { topic, topic_label }
    }
}
