use crate::error::Result;
use crate::types::{JoinRow, RecordBatch, Scalar};
use std::collections::HashSet;
use tracing::debug;

/// Split a delimiter-joined field into its non-empty tokens, in order.
///
/// `None` and `""` both yield no tokens.
pub fn split_delimited(field: Option<&str>, delimiter: char) -> Vec<&str> {
    match field {
        Some(value) if !value.is_empty() => value
            .split(delimiter)
            .filter(|token| !token.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

/// Join rows of one source batch plus the number of source rows that yielded none.
#[derive(Debug, Default)]
pub struct JoinExtraction {
    pub rows: Vec<JoinRow>,
    pub skipped: usize,
}

/// One join row per (`left_column`, token of `right_column`) pair.
///
/// Rows whose left key is null are skipped, as are rows whose delimited field
/// has no tokens (null, empty, or only delimiters).
pub fn extract_join_rows(
    batch: &RecordBatch,
    left_column: &str,
    right_column: &str,
    delimiter: char,
) -> Result<JoinExtraction> {
    let mut join_rows = Vec::new();
    let mut skipped = 0usize;

    for row in batch.rows() {
        let left = match row.require(left_column)? {
            Scalar::Text(s) => s.clone(),
            Scalar::Integer(i) => i.to_string(),
            _ => {
                skipped += 1;
                continue;
            }
        };
        let tokens = split_delimited(row.require(right_column)?.as_str(), delimiter);
        if tokens.is_empty() {
            skipped += 1;
            continue;
        }
        join_rows.extend(tokens.into_iter().map(|t| JoinRow::new(left.clone(), t)));
    }

    debug!(
        "Extracted {} join rows from {} source rows ({} without relations)",
        join_rows.len(),
        batch.len(),
        skipped
    );
    Ok(JoinExtraction {
        rows: join_rows,
        skipped,
    })
}

/// Every token of every field, deduplicated, in first-seen order.
pub fn unique_tokens<'a, I>(fields: I, delimiter: char) -> Vec<String>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let mut seen = HashSet::new();
    let mut unique = Vec::new();
    for field in fields {
        for token in split_delimited(field, delimiter) {
            if seen.insert(token) {
                unique.push(token.to_string());
            }
        }
    }
    unique
}
