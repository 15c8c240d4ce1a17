//! Catalog and per-student progress, stored in SQLite.

pub mod sqlite;
mod traits;

pub use traits::ExerciseStateRepository;

use grader::GraderError;

/// Errors from the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("migration failed: {0}")]
    Migration(String),
    #[error("invalid record {key}: {reason}")]
    Invalid { key: String, reason: String },
}

impl From<PersistenceError> for GraderError {
    fn from(err: PersistenceError) -> Self {
        GraderError::Store(err.to_string())
    }
}

/// A student's saved work on one exercise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserExerciseState {
    pub student: String,
    pub topic: String,
    pub enumber: u32,
    pub buffer_save: String,
    pub is_correct: Option<bool>,
    pub favourite: bool,
}
