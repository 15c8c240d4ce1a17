//! Topic, exercise and solution records, and the traits through which the
//! grader reaches the application that owns them.

use std::future::Future;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{GraderError, GraderResult};

/// A themed group of exercises sharing one schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    /// Schema name inside every student database.
    pub short: String,
    pub title: String,
    /// DDL/seed script run inside a freshly created schema.
    pub datamodel_script: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exercise {
    pub topic: String,
    pub enumber: u32,
    pub title: String,
    /// SELECT-style exercises are graded by comparing result sets; the others
    /// by running `eval_statement` after the student's query.
    pub is_select: bool,
    pub eval_statement: Option<String>,
    pub check_order: bool,
    pub mandatory: Vec<String>,
    pub deny: Vec<String>,
}

/// How an exercise decides correctness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evaluation<'a> {
    Compare { check_order: bool },
    Statement(&'a str),
}

impl Exercise {
    /// `topic/enumber`, used in logs and error messages.
    pub fn key(&self) -> String {
        format!("{}/{}", self.topic, self.enumber)
    }

    /// Refuses exercises that are not SELECT-style but carry no evaluation
    /// statement.
    pub fn evaluation(&self) -> GraderResult<Evaluation<'_>> {
        if self.is_select {
            return Ok(Evaluation::Compare {
                check_order: self.check_order,
            });
        }
        match self.eval_statement.as_deref().map(str::trim) {
            Some(statement) if !statement.is_empty() => Ok(Evaluation::Statement(statement)),
            _ => Err(GraderError::MissingEvalStatement(self.key())),
        }
    }
}

/// A reference answer. `snumber == 1` is the canonical one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Solution {
    pub topic: String,
    pub enumber: u32,
    pub snumber: u32,
    pub sql: String,
}

/// Read access to topic metadata. Unknown keys yield [`GraderError::NotFound`].
///
/// Methods return `impl Future + Send` so evaluator futures can be spawned.
pub trait Catalog: Send + Sync {
    fn topic(&self, short: &str) -> impl Future<Output = GraderResult<Topic>> + Send;

    fn exercise(
        &self,
        short: &str,
        enumber: u32,
    ) -> impl Future<Output = GraderResult<Exercise>> + Send;

    /// All exercises of a topic, ordered by `enumber`.
    fn exercises(&self, short: &str) -> impl Future<Output = GraderResult<Vec<Exercise>>> + Send;

    fn canonical_solution(
        &self,
        short: &str,
        enumber: u32,
    ) -> impl Future<Output = GraderResult<Solution>> + Send;
}

/// Per-student progress.
pub trait UserStateStore: Send + Sync {
    /// Upsert the student's buffer for `exercise`. `is_correct` is only
    /// overwritten when given.
    fn save_attempt(
        &self,
        student: &str,
        exercise: &Exercise,
        buffer: &str,
        is_correct: Option<bool>,
    ) -> impl Future<Output = GraderResult<()>> + Send;
}
