//! The operations offered to the request layer.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::catalog::{Catalog, Evaluation, UserStateStore};
use crate::compare::check_results;
use crate::error::GraderResult;
use crate::executor::{self, ERROR_IN_QUERY, NO_OUTPUT};
use crate::policy::check_mand_deny_list;
use crate::pool::Pooled;
use crate::postgres::{PgConnector, StudentConn};
use crate::registry::PoolRegistry;
use crate::reset;
use crate::tabular::{Row, TabularResult};

pub const RESET_MESSAGE: &str = "Reset Successfully!";

/// Result of [`Evaluator::check_answer`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckOutcome {
    pub correct: bool,
    /// Keyword policy violations; empty when there are none.
    pub message: String,
    pub user_result: TabularResult,
    pub solu_result: TabularResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStatus {
    AlreadyInstalled,
    Installed,
}

impl InstallStatus {
    pub fn message(self) -> &'static str {
        match self {
            InstallStatus::AlreadyInstalled => "Already Installed!",
            InstallStatus::Installed => "Installed Successfully!",
        }
    }
}

/// One line of [`Evaluator::verify_topic`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExerciseOutcome {
    pub enumber: u32,
    pub correct: bool,
    pub message: String,
}

/// Runs student queries and grades answers against the reference solutions.
pub struct Evaluator<C, S> {
    registry: Arc<PoolRegistry<PgConnector>>,
    catalog: Arc<C>,
    store: Arc<S>,
}

impl<C: Catalog, S: UserStateStore> Evaluator<C, S> {
    pub fn new(registry: Arc<PoolRegistry<PgConnector>>, catalog: Arc<C>, store: Arc<S>) -> Self {
        Self {
            registry,
            catalog,
            store,
        }
    }

    pub fn registry(&self) -> &Arc<PoolRegistry<PgConnector>> {
        &self.registry
    }

    pub fn catalog(&self) -> &Arc<C> {
        &self.catalog
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    async fn connection(&self, student: &str) -> GraderResult<Pooled<StudentConn>> {
        self.registry.acquire(student).await
    }

    /// Run `query` without grading it or resetting the schema, and save it as
    /// the student's buffer.
    #[tracing::instrument(skip(self, query))]
    pub async fn execute_query(
        &self,
        student: &str,
        short: &str,
        enumber: u32,
        query: &str,
    ) -> GraderResult<TabularResult> {
        let topic = self.catalog.topic(short).await?;
        let exercise = self.catalog.exercise(short, enumber).await?;

        let result = {
            let mut conn = self.connection(student).await?;
            let executed = executor::execute(conn.client_mut(), query, &topic.short).await?;
            release(conn, executed.broken);
            executed.result
        };

        self.store
            .save_attempt(student, &exercise, query, None)
            .await?;
        Ok(result)
    }

    /// Reset the schema, run `query` and grade it. The buffer and verdict are
    /// saved for the student.
    #[tracing::instrument(skip(self, query))]
    pub async fn check_answer(
        &self,
        student: &str,
        short: &str,
        enumber: u32,
        query: &str,
    ) -> GraderResult<CheckOutcome> {
        let topic = self.catalog.topic(short).await?;
        let exercise = self.catalog.exercise(short, enumber).await?;
        let evaluation = exercise.evaluation()?;

        let mut conn = self.connection(student).await?;
        reset::reset(conn.client_mut(), self.catalog.as_ref(), &topic, enumber).await?;

        let user = executor::execute(conn.client_mut(), query, &topic.short).await?;
        let mut user_result = user.result;
        if user.broken {
            // The student's transaction died with the session; the reset state
            // is intact on a fresh connection.
            conn.discard();
            conn = self.connection(student).await?;
        }

        let (verdict, solu_result) = match evaluation {
            Evaluation::Compare { check_order } => {
                let solution = self.catalog.canonical_solution(short, enumber).await?;
                let solu = executor::execute(conn.client_mut(), &solution.sql, &topic.short).await?;
                let mut solu_result = solu.result;
                let verdict = if let Some(fault) = reference_fault(&solu_result) {
                    tracing::warn!(exercise = %exercise.key(), "{fault}");
                    false
                } else {
                    check_results(&mut user_result, &mut solu_result, check_order)
                };
                release(conn, solu.broken);
                (verdict, solu_result)
            }
            Evaluation::Statement(statement) => {
                let verdict =
                    executor::execute_check(conn.client_mut(), statement, &topic.short).await;
                release(conn, false);
                (verdict && !user.broken, no_output_placeholder())
            }
        };

        let message = check_mand_deny_list(query, &exercise.mandatory, &exercise.deny);
        let correct = verdict && message.is_empty();
        tracing::debug!(correct, "Checked answer");

        self.store
            .save_attempt(student, &exercise, query, Some(correct))
            .await?;

        Ok(CheckOutcome {
            correct,
            message,
            user_result,
            solu_result,
        })
    }

    /// Reset the schema and return what the canonical solution produces.
    /// Non-SELECT exercises yield a `no_output` placeholder instead.
    #[tracing::instrument(skip(self))]
    pub async fn solution_result(
        &self,
        student: &str,
        short: &str,
        enumber: u32,
    ) -> GraderResult<TabularResult> {
        let topic = self.catalog.topic(short).await?;
        let exercise = self.catalog.exercise(short, enumber).await?;

        let mut conn = self.connection(student).await?;
        reset::reset(conn.client_mut(), self.catalog.as_ref(), &topic, enumber).await?;

        if !exercise.is_select {
            return Ok(no_output_placeholder());
        }
        let solution = self.catalog.canonical_solution(short, enumber).await?;
        let executed = executor::execute(conn.client_mut(), &solution.sql, &topic.short).await?;
        release(conn, executed.broken);
        Ok(executed.result)
    }

    #[tracing::instrument(skip(self))]
    pub async fn check_or_install_db(&self, student: &str, short: &str) -> GraderResult<InstallStatus> {
        let topic = self.catalog.topic(short).await?;
        let mut conn = self.connection(student).await?;
        if reset::ensure_installed(conn.client_mut(), &topic).await? {
            Ok(InstallStatus::Installed)
        } else {
            Ok(InstallStatus::AlreadyInstalled)
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn reset_db(&self, student: &str, short: &str, enumber: u32) -> GraderResult<()> {
        let topic = self.catalog.topic(short).await?;
        // Unknown exercises are rejected before touching the schema.
        self.catalog.exercise(short, enumber).await?;
        let mut conn = self.connection(student).await?;
        reset::reset(conn.client_mut(), self.catalog.as_ref(), &topic, enumber).await
    }

    /// Grade every exercise of a topic with its own canonical solution.
    ///
    /// Content faults are reported per exercise; an unavailable database
    /// aborts the run.
    #[tracing::instrument(skip(self))]
    pub async fn verify_topic(&self, student: &str, short: &str) -> GraderResult<Vec<ExerciseOutcome>> {
        let exercises = self.catalog.exercises(short).await?;
        let mut outcomes = Vec::with_capacity(exercises.len());

        for exercise in exercises {
            let checked = match self.catalog.canonical_solution(short, exercise.enumber).await {
                Ok(solution) => {
                    self.check_answer(student, short, exercise.enumber, &solution.sql)
                        .await
                }
                Err(err) => Err(err),
            };
            let outcome = match checked {
                Ok(outcome) => {
                    let fault = if exercise.is_select {
                        reference_fault(&outcome.solu_result)
                    } else {
                        None
                    };
                    ExerciseOutcome {
                        enumber: exercise.enumber,
                        correct: outcome.correct && fault.is_none(),
                        message: fault.unwrap_or(outcome.message),
                    }
                }
                Err(err) if err.is_transient() => return Err(err),
                Err(err) => {
                    tracing::warn!(exercise = %exercise.key(), "Verification failed: {err}");
                    ExerciseOutcome {
                        enumber: exercise.enumber,
                        correct: false,
                        message: err.to_string(),
                    }
                }
            };
            outcomes.push(outcome);
        }

        let failed = outcomes.iter().filter(|o| !o.correct).count();
        tracing::info!(exercises = outcomes.len(), failed, "Verified topic");
        Ok(outcomes)
    }
}

/// Return `conn` to its pool, or drop it for good once its session is unusable.
fn release(conn: Pooled<StudentConn>, broken: bool) {
    if broken || conn.is_closed() {
        conn.discard();
    }
}

/// Why the reference result of a SELECT exercise cannot be graded against.
fn reference_fault(solu_result: &TabularResult) -> Option<String> {
    if solu_result.is_sentinel(ERROR_IN_QUERY) {
        let text = solu_result.result[0]
            .get(ERROR_IN_QUERY)
            .and_then(Value::as_str)
            .unwrap_or_default();
        return Some(format!("reference solution failed: {text}"));
    }
    if solu_result.is_sentinel(NO_OUTPUT) {
        return Some("reference solution produced no row set".to_string());
    }
    None
}

/// `[{"no_output": ""}]`, the reference result of non-SELECT exercises.
fn no_output_placeholder() -> TabularResult {
    let mut row = Row::new();
    row.insert(NO_OUTPUT.to_string(), Value::String(String::new()));
    TabularResult::new(vec![row])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn install_status_messages() {
        assert_eq!(InstallStatus::AlreadyInstalled.message(), "Already Installed!");
        assert_eq!(InstallStatus::Installed.message(), "Installed Successfully!");
    }

    #[test]
    fn placeholder_has_empty_no_output_cell() {
        let placeholder = no_output_placeholder();
        assert_eq!(
            serde_json::to_value(&placeholder.result).unwrap(),
            json!([{"no_output": ""}])
        );
    }

    #[test]
    fn failed_reference_is_a_fault() {
        let failed = TabularResult::sentinel(ERROR_IN_QUERY, "ERROR: column \"nope\" does not exist");
        assert_eq!(
            reference_fault(&failed).as_deref(),
            Some("reference solution failed: ERROR: column \"nope\" does not exist")
        );
        let silent = TabularResult::sentinel(NO_OUTPUT, "the last operation didn't produce a result");
        assert!(reference_fault(&silent).is_some());
    }

    #[test]
    fn reference_rows_are_not_a_fault() {
        let rows = TabularResult::sentinel("photo", "nb02");
        assert_eq!(reference_fault(&rows), None);
    }

    #[test]
    fn check_outcome_wire_shape() {
        let outcome = CheckOutcome {
            correct: false,
            message: String::new(),
            user_result: TabularResult::sentinel(ERROR_IN_QUERY, "ERROR: boom"),
            solu_result: no_output_placeholder(),
        };
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["correct"], json!(false));
        assert_eq!(value["user_result"]["result"][0]["error_in_query"], "ERROR: boom");
        assert_eq!(value["solu_result"]["miss_rows"], json!([]));
    }
}
