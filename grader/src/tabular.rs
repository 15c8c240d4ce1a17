//! The normalized result of running one query.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One result row: column name to text value (or `null` for SQL NULL).
///
/// Column order is kept for display; equality ignores it.
pub type Row = Map<String, Value>;

/// Rows plus the diagnostics filled in by [`crate::compare::check_results`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TabularResult {
    pub result: Vec<Row>,
    #[serde(default)]
    pub miss_cols: Vec<String>,
    #[serde(default)]
    pub miss_rows: Vec<usize>,
}

impl TabularResult {
    pub fn new(result: Vec<Row>) -> Self {
        Self {
            result,
            miss_cols: Vec::new(),
            miss_rows: Vec::new(),
        }
    }

    /// A result consisting of a single `{key: message}` row.
    pub fn sentinel(key: &str, message: impl Into<String>) -> Self {
        let mut row = Row::new();
        row.insert(key.to_string(), Value::String(message.into()));
        Self::new(vec![row])
    }

    /// Column names of the first row, in result order.
    pub fn columns(&self) -> Vec<&str> {
        self.result
            .first()
            .map(|row| row.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.result.len()
    }

    pub fn is_empty(&self) -> bool {
        self.result.is_empty()
    }

    /// Whether the only row carries `key`, i.e. this is a sentinel result.
    pub fn is_sentinel(&self, key: &str) -> bool {
        self.result.len() == 1 && self.result[0].len() == 1 && self.result[0].contains_key(key)
    }
}
