// Statement sizing and per-batch key deduplication

use std::collections::HashMap;
use std::hash::Hash;

/// Rows that fit in one statement: bounded by `row_limit` and by the
/// bound-parameter ceiling, never less than one.
///
/// Callers validate that `param_limit` covers at least one row.
pub fn rows_per_statement(column_count: usize, param_limit: usize, row_limit: usize) -> usize {
    let by_params = param_limit / column_count.max(1);
    row_limit.min(by_params).max(1)
}

/// Keep only the last occurrence of each key, ordered by that last occurrence.
pub fn dedupe_last_by_key<T, K, F>(rows: Vec<T>, key: F) -> Vec<T>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut last_index: HashMap<K, usize> = HashMap::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        last_index.insert(key(row), index);
    }
    if last_index.len() == rows.len() {
        return rows;
    }

    rows.into_iter()
        .enumerate()
        .filter(|(index, row)| last_index.get(&key(row)) == Some(index))
        .map(|(_, row)| row)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_limit_wins_when_smaller() {
        assert_eq!(rows_per_statement(21, 65_535, 3_000), 3_000);
    }

    #[test]
    fn test_param_ceiling_wins_when_smaller() {
        assert_eq!(rows_per_statement(21, 65_535, 5_000), 3_120);
        assert_eq!(rows_per_statement(6, 65_535, 100_000), 10_922);
    }

    #[test]
    fn test_never_below_one_row() {
        assert_eq!(rows_per_statement(21, 65_535, 0), 1);
        assert_eq!(rows_per_statement(0, 10, 0), 1);
    }

    #[test]
    fn test_statement_stays_under_param_ceiling() {
        for param_limit in [21, 22, 100, 1_000, 65_535] {
            let rows = rows_per_statement(21, param_limit, 5_000);
            assert!(rows * 21 <= param_limit, "{} rows over {}", rows, param_limit);
        }
    }

    #[test]
    fn test_dedupe_keeps_last_occurrence() {
        let rows = vec![("a", 1), ("b", 2), ("a", 3), ("c", 4)];
        let kept = dedupe_last_by_key(rows, |row| row.0);
        assert_eq!(kept, vec![("b", 2), ("a", 3), ("c", 4)]);
    }

    #[test]
    fn test_dedupe_without_duplicates_is_identity() {
        let rows = vec![1, 2, 3];
        assert_eq!(dedupe_last_by_key(rows.clone(), |row| *row), rows);
    }
}
