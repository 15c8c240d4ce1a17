//! Deciding whether a student's result matches the reference result.

use crate::tabular::{Row, TabularResult};

/// Results whose row counts differ by more than this are rejected without a
/// row-by-row comparison.
pub const MAX_ROW_COUNT_DIFFERENCE: usize = 30;

/// Compare `user` against `solution`, filling in `miss_cols` and `miss_rows`
/// on both sides.
///
/// Rows are matched by content. With `check_order` the two row sequences must
/// also be equal element for element.
pub fn check_results(user: &mut TabularResult, solution: &mut TabularResult, check_order: bool) -> bool {
    user.miss_cols = missing_columns(user, solution);
    solution.miss_cols = missing_columns(solution, user);
    user.miss_rows.clear();
    solution.miss_rows.clear();

    if user.len().abs_diff(solution.len()) > MAX_ROW_COUNT_DIFFERENCE {
        return false;
    }

    solution.miss_rows = missing_rows(&solution.result, &user.result);
    user.miss_rows = missing_rows(&user.result, &solution.result);

    let misses = user.miss_cols.len()
        + user.miss_rows.len()
        + solution.miss_cols.len()
        + solution.miss_rows.len();
    if misses > 0 {
        return false;
    }
    if !check_order {
        return true;
    }
    user.result == solution.result
}

/// Columns of `this` first row that the `other` first row lacks.
fn missing_columns(this: &TabularResult, other: &TabularResult) -> Vec<String> {
    let Some(first) = this.result.first() else {
        return Vec::new();
    };
    let other_first = other.result.first();
    first
        .keys()
        .filter(|name| !other_first.is_some_and(|row| row.contains_key(*name)))
        .cloned()
        .collect()
}

/// Indices of rows in `rows` that appear nowhere in `other`.
fn missing_rows(rows: &[Row], other: &[Row]) -> Vec<usize> {
    rows.iter()
        .enumerate()
        .filter(|(_, row)| !other.contains(row))
        .map(|(index, _)| index)
        .collect()
}
