use serde::{Deserialize, Serialize};

use crate::core::LegislatorId;

/// A row of the `legislators` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Legislator {
    pub lid: LegislatorId,
    pub name: String,
    pub handle: Option<String>,
    pub state: Option<String>,
    pub chamber: Option<String>,
    pub party: Option<String>,
}

impl Legislator {
    /// Column order used by every upsert statement.
    pub const COLUMNS: [&'static str; 6] = ["lid", "name", "handle", "state", "chamber", "party"];

    /// Build a legislator, synthesizing a name from the key when the source name is blank.
    pub fn new(
        lid: LegislatorId,
        name: Option<&str>,
        handle: Option<&str>,
        state: Option<&str>,
        chamber: Option<&str>,
        party: Option<&str>,
    ) -> Self {
        let name = match name.map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => Self::placeholder_name(&lid),
        };
        Self {
            lid,
            name,
            handle: handle.map(str::to_string),
            state: state.map(str::to_string),
            chamber: chamber.map(str::to_string),
            party: party.map(str::to_string),
        }
    }

    pub fn placeholder_name(lid: &LegislatorId) -> String {
        format!("Legislator {}", lid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_name_falls_back_to_placeholder() {
        let lid = LegislatorId::parse("L1").unwrap();
        let legislator = Legislator::new(lid, Some("   "), None, None, None, None);
        assert_eq!(legislator.name, "Legislator L1");
        assert!(legislator.handle.is_none());
    }

    #[test]
    fn test_name_is_trimmed() {
        let lid = LegislatorId::parse("L2").unwrap();
        let legislator = Legislator::new(lid, Some(" Jane Doe "), Some("jdoe"), Some("NY"), Some("H"), Some("Democratic"));
        assert_eq!(legislator.name, "Jane Doe");
        assert_eq!(legislator.handle.as_deref(), Some("jdoe"));
        assert_eq!(legislator.party.as_deref(), Some("Democratic"));
    }
}
