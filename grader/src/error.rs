//! Error types for the grading core.

use std::path::PathBuf;

use thiserror::Error;

pub type GraderResult<T> = Result<T, GraderError>;

/// Failures that abort a grading operation.
///
/// Errors in a student's own SQL are not represented here: the executor turns
/// them into data (see [`crate::executor`]).
#[derive(Error, Debug)]
pub enum GraderError {
    /// No connection could be obtained for the student within the timeout,
    /// the database refused the connection, or the pool was closed.
    #[error("database for {identity} unavailable: {reason}")]
    PoolUnavailable { identity: String, reason: String },

    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// A canonical solution replayed during a reset failed.
    #[error("reference solution of {exercise} failed: {source}")]
    ReferenceSolution {
        exercise: String,
        #[source]
        source: tokio_postgres::Error,
    },

    #[error("failed to read datamodel script {}: {source}", path.display())]
    Script {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} not found")]
    NotFound(String),

    #[error("exercise {0} is not a SELECT exercise but has no eval statement")]
    MissingEvalStatement(String),

    #[error("store error: {0}")]
    Store(String),
}

impl GraderError {
    /// Whether retrying the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            GraderError::PoolUnavailable { .. } => true,
            GraderError::Postgres(err) => err.is_closed(),
            _ => false,
        }
    }
}

/// Why an evaluation statement could not produce a verdict.
#[derive(Error, Debug)]
pub enum EvalFault {
    #[error("evaluation statement failed: {0}")]
    Sql(#[from] tokio_postgres::Error),

    #[error("evaluation statement returned no row")]
    NoRow,

    #[error("evaluation statement returned {0:?} instead of a boolean")]
    NotBoolean(Option<String>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_unavailable_is_transient() {
        let err = GraderError::PoolUnavailable {
            identity: "mitro".into(),
            reason: "timed out".into(),
        };
        assert!(err.is_transient());
        assert_eq!(
            err.to_string(),
            "database for mitro unavailable: timed out"
        );
    }

    #[test]
    fn content_errors_are_not_transient() {
        assert!(!GraderError::NotFound("topic pc".into()).is_transient());
        assert!(!GraderError::MissingEvalStatement("pc/4".into()).is_transient());
    }
}
