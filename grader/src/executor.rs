//! Running student SQL and normalising whatever comes back.
//!
//! Queries go through the simple-query protocol, so every value arrives as
//! the server's text rendering. SQL errors raised by the server are data, not
//! failures: they come back as an [`ERROR_IN_QUERY`] row. Only connection
//! level faults surface as `Err`.

use std::collections::{HashMap, HashSet};

use serde_json::Value;
use tokio_postgres::{Client, SimpleQueryMessage, Transaction};

use crate::error::{EvalFault, GraderError, GraderResult};
use crate::schema;
use crate::tabular::{Row, TabularResult};

/// Sentinel key of a result whose last statement produced no row set.
pub const NO_OUTPUT: &str = "no_output";
/// Sentinel key of a result whose statement raised an SQL error.
pub const ERROR_IN_QUERY: &str = "error_in_query";

const NO_OUTPUT_MESSAGE: &str = "the last operation didn't produce a result";

/// What the last statement of a query text produced.
#[derive(Debug, Clone, PartialEq)]
pub enum StatementOutput {
    Rows {
        columns: Vec<String>,
        rows: Vec<Vec<Option<String>>>,
    },
    NoResult,
}

/// Outcome of [`execute`].
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    pub result: TabularResult,
    /// The driver rejected the exchange and the session must not be reused.
    pub broken: bool,
}

impl Execution {
    fn usable(result: TabularResult) -> Self {
        Self {
            result,
            broken: false,
        }
    }
}

/// Run `query` against the `short` schema in its own transaction.
///
/// A closed connection is an `Err`. Anything else the query provokes,
/// including messages the driver cannot handle (`COPY ... FROM STDIN`),
/// comes back as an [`ERROR_IN_QUERY`] result.
pub async fn execute(client: &mut Client, query: &str, short: &str) -> GraderResult<Execution> {
    let tx = client.transaction().await?;
    tx.batch_execute(&schema::search_path(short)).await?;

    let messages = match tx.simple_query(query).await {
        Ok(messages) => messages,
        Err(err) => return sql_fault(Some(tx), err, short).await,
    };
    if let Err(err) = tx.commit().await {
        return sql_fault(None, err, short).await;
    }
    Ok(Execution::usable(tabulate(collect_output(&messages))))
}

async fn sql_fault(
    tx: Option<Transaction<'_>>,
    err: tokio_postgres::Error,
    short: &str,
) -> GraderResult<Execution> {
    if err.is_closed() {
        return Err(GraderError::Postgres(err));
    }
    let Some(db) = err.as_db_error() else {
        tracing::warn!(topic = short, "Driver rejected student query: {err}");
        drop(tx);
        return Ok(Execution {
            result: TabularResult::sentinel(ERROR_IN_QUERY, err.to_string()),
            broken: true,
        });
    };
    let message = db.to_string();
    tracing::debug!(topic = short, code = db.code().code(), "Student query failed");
    if let Some(tx) = tx {
        tx.rollback().await?;
    }
    Ok(Execution::usable(TabularResult::sentinel(ERROR_IN_QUERY, message)))
}

/// Reduce the protocol messages of a (possibly multi-statement) query to the
/// outcome of its last statement.
pub fn collect_output(messages: &[SimpleQueryMessage]) -> StatementOutput {
    let mut last = StatementOutput::NoResult;
    let mut current: Option<(Vec<String>, Vec<Vec<Option<String>>>)> = None;

    for message in messages {
        match message {
            SimpleQueryMessage::RowDescription(columns) => {
                let names = columns.iter().map(|c| c.name().to_string()).collect();
                current = Some((names, Vec::new()));
            }
            SimpleQueryMessage::Row(row) => {
                let (_, rows) = current.get_or_insert_with(|| {
                    let names = row.columns().iter().map(|c| c.name().to_string()).collect();
                    (names, Vec::new())
                });
                rows.push((0..row.len()).map(|i| row.get(i).map(str::to_string)).collect());
            }
            SimpleQueryMessage::CommandComplete(_) => {
                last = match current.take() {
                    Some((columns, rows)) => StatementOutput::Rows { columns, rows },
                    None => StatementOutput::NoResult,
                };
            }
            _ => {}
        }
    }
    last
}

/// Turn a statement outcome into rows.
///
/// Zero rows become one row of empty strings so that "found nothing" stays
/// distinguishable from "had no output".
pub fn tabulate(output: StatementOutput) -> TabularResult {
    let (columns, rows) = match output {
        StatementOutput::NoResult => {
            return TabularResult::sentinel(NO_OUTPUT, NO_OUTPUT_MESSAGE);
        }
        StatementOutput::Rows { columns, rows } => (disambiguate(&columns), rows),
    };

    if rows.is_empty() {
        let empty: Row = columns
            .into_iter()
            .map(|name| (name, Value::String(String::new())))
            .collect();
        return TabularResult::new(vec![empty]);
    }

    let result = rows
        .into_iter()
        .map(|cells| {
            columns
                .iter()
                .cloned()
                .zip(cells)
                .map(|(name, cell)| (name, cell.map_or(Value::Null, Value::String)))
                .collect::<Row>()
        })
        .collect();
    TabularResult::new(result)
}

/// Rename every column whose name repeats to `name{k}`, `k` counting up
/// from the occurrence index and skipping names already taken by another
/// column.
pub fn disambiguate(columns: &[String]) -> Vec<String> {
    let mut totals: HashMap<&str, usize> = HashMap::new();
    for name in columns {
        *totals.entry(name.as_str()).or_default() += 1;
    }
    let mut taken: HashSet<String> = columns
        .iter()
        .filter(|name| totals[name.as_str()] == 1)
        .cloned()
        .collect();
    let mut next: HashMap<&str, usize> = HashMap::new();
    columns
        .iter()
        .map(|name| {
            if totals[name.as_str()] == 1 {
                return name.clone();
            }
            let index = next.entry(name.as_str()).or_default();
            let mut renamed = format!("{name}{index}");
            while taken.contains(&renamed) {
                *index += 1;
                renamed = format!("{name}{index}");
            }
            *index += 1;
            taken.insert(renamed.clone());
            renamed
        })
        .collect()
}

/// Run an evaluation statement and read its first cell as a boolean.
///
/// The statement runs in a transaction that is always rolled back.
pub async fn evaluate(client: &mut Client, statement: &str, short: &str) -> Result<bool, EvalFault> {
    let tx = client.transaction().await?;
    let outcome = first_cell(&tx, statement, short).await;
    tx.rollback().await?;
    parse_bool(outcome?)
}

async fn first_cell(
    tx: &Transaction<'_>,
    statement: &str,
    short: &str,
) -> Result<Option<Option<String>>, EvalFault> {
    tx.batch_execute(&schema::search_path(short)).await?;
    let messages = tx.simple_query(statement).await?;
    Ok(messages.iter().find_map(|message| match message {
        SimpleQueryMessage::Row(row) => Some(row.get(0).map(str::to_string)),
        _ => None,
    }))
}

fn parse_bool(cell: Option<Option<String>>) -> Result<bool, EvalFault> {
    match cell {
        None => Err(EvalFault::NoRow),
        Some(Some(text)) if text == "t" || text == "true" => Ok(true),
        Some(Some(text)) if text == "f" || text == "false" => Ok(false),
        Some(other) => Err(EvalFault::NotBoolean(other)),
    }
}

/// [`evaluate`], with every fault counted as an incorrect answer.
pub async fn execute_check(client: &mut Client, statement: &str, short: &str) -> bool {
    match evaluate(client, statement, short).await {
        Ok(verdict) => verdict,
        Err(fault) => {
            tracing::warn!(topic = short, "Evaluation statement failed: {fault}");
            false
        }
    }
}
