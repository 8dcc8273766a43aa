use std::collections::HashMap;

/// One raw input record: column name to cell text.
///
/// Cells are stored as read; blank cells behave as absent through [`RawRecord::get`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    fields: HashMap<String, String>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(column.into(), value.into());
    }

    /// The cell for `column`, or None when it is missing or blank.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .get(column)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    /// The first non-blank cell among `columns`.
    pub fn first_of(&self, columns: &[&str]) -> Option<&str> {
        columns.iter().find_map(|column| self.get(column))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = RawRecord::new();
        for (column, value) in iter {
            record.insert(column, value);
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_cells_read_as_absent() {
        let record: RawRecord = [("name", "  "), ("lid", "L1")].into_iter().collect();
        assert_eq!(record.get("name"), None);
        assert_eq!(record.get("lid"), Some("L1"));
        assert_eq!(record.get("missing"), None);
    }

    #[test]
    fn test_first_of_skips_blank_aliases() {
        let record: RawRecord = [("text", ""), ("full_text", "hello")].into_iter().collect();
        assert_eq!(record.first_of(&["text", "full_text"]), Some("hello"));
        assert_eq!(record.first_of(&["hydrated_text"]), None);
    }
}
