//! Repository traits owned by the server.
//!
//! Saving attempts goes through [`grader::UserStateStore`]; the operations
//! here are only used by the request layer. Methods return
//! `impl Future + Send` so the futures can be driven from spawned
//! connection tasks.

use std::future::Future;

use super::{PersistenceError, UserExerciseState};

/// Read access to saved buffers and the favourite flag.
pub trait ExerciseStateRepository: Send + Sync {
    fn load_state(
        &self,
        student: &str,
        topic: &str,
        enumber: u32,
    ) -> impl Future<Output = Result<Option<UserExerciseState>, PersistenceError>> + Send;

    /// Creates the row if the student never touched the exercise.
    fn set_favourite(
        &self,
        student: &str,
        topic: &str,
        enumber: u32,
        favourite: bool,
    ) -> impl Future<Output = Result<(), PersistenceError>> + Send;
}
