//! Conversion functions from domain types to wire types

use grader::{CheckOutcome, ExerciseOutcome, GraderError, TabularResult};
use sqltrainer_protocol::{CheckAnswer, ErrorCode, ExerciseState, ResultTable, VerifyOutcome};

use crate::persistence::UserExerciseState;

/// Convert a grader TabularResult into the wire ResultTable.
pub fn convert_tabular_to_wire(table: TabularResult) -> ResultTable {
    ResultTable {
        result: table.result,
        miss_cols: table.miss_cols,
        miss_rows: table.miss_rows,
    }
}

pub fn convert_check_outcome_to_wire(outcome: CheckOutcome) -> CheckAnswer {
    CheckAnswer {
        correct: outcome.correct,
        message: outcome.message,
        user_result: convert_tabular_to_wire(outcome.user_result),
        solu_result: convert_tabular_to_wire(outcome.solu_result),
    }
}

pub fn convert_exercise_outcome_to_wire(outcome: ExerciseOutcome) -> VerifyOutcome {
    VerifyOutcome {
        enumber: outcome.enumber,
        correct: outcome.correct,
        message: outcome.message,
    }
}

/// Convert stored state; `None` means the student never touched the exercise.
pub fn convert_state_to_wire(
    topic_short: &str,
    enumber: u32,
    state: Option<UserExerciseState>,
) -> ExerciseState {
    match state {
        Some(state) => ExerciseState {
            topic_short: state.topic,
            enumber: state.enumber,
            buffer_save: state.buffer_save,
            is_correct: state.is_correct,
            favourite: state.favourite,
        },
        None => ExerciseState {
            topic_short: topic_short.to_string(),
            enumber,
            buffer_save: String::new(),
            is_correct: None,
            favourite: false,
        },
    }
}

/// Map a grader error onto its stable wire code. Anything worth retrying is
/// `unavailable`.
pub fn convert_error_code(err: &GraderError) -> ErrorCode {
    if err.is_transient() {
        return ErrorCode::Unavailable;
    }
    match err {
        GraderError::NotFound(_) => ErrorCode::NotFound,
        GraderError::MissingEvalStatement(_) => ErrorCode::FailedPrecondition,
        _ => ErrorCode::Internal,
    }
}

/// Message shown to students when their database cannot be reached.
pub fn unavailable_message(host: &str) -> String {
    format!("Cannot get connection to {host}. Try reaching your lecturer.")
}
