// Strong Types - Newtype keys for the three ingested tables
// Keeps legislator, topic and post keys from being mixed up at call sites

use serde::{Deserialize, Serialize};
use std::fmt;

/// Trim a raw key and reject it when nothing is left.
fn normalize_key(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Strongly-typed legislator key (`lid`) - external and opaque
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LegislatorId(String);

impl LegislatorId {
    /// Create a legislator key, returning None for blank input
    pub fn parse(raw: &str) -> Option<Self> {
        normalize_key(raw).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for LegislatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Strongly-typed topic code
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TopicCode(String);

impl TopicCode {
    /// Create a topic code, returning None for blank input
    pub fn parse(raw: &str) -> Option<Self> {
        normalize_key(raw).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for TopicCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Strongly-typed post key (`id`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PostId(String);

impl PostId {
    /// Create a post key, returning None for blank input
    pub fn parse(raw: &str) -> Option<Self> {
        normalize_key(raw).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_keys_are_rejected() {
        assert!(LegislatorId::parse("").is_none());
        assert!(TopicCode::parse("   ").is_none());
        assert!(PostId::parse("\t").is_none());
    }

    #[test]
    fn test_keys_are_trimmed() {
        let lid = LegislatorId::parse("  L1 ").unwrap();
        assert_eq!(lid.as_str(), "L1");
        assert_eq!(lid.to_string(), "L1");

        let topic = TopicCode::parse("T1").unwrap();
        assert_eq!(topic.into_string(), "T1");
    }

    #[test]
    fn test_keys_order_lexically() {
        let a = LegislatorId::parse("A").unwrap();
        let b = LegislatorId::parse("B").unwrap();
        assert!(a < b);
    }
}
