//! SQLite-backed per-student exercise state.

use grader::{Exercise, GraderResult, UserStateStore};
use sqlx::SqlitePool;

use super::helpers::{decode_bool, decode_number, encode_bool};
use crate::persistence::traits::ExerciseStateRepository;
use crate::persistence::{PersistenceError, UserExerciseState};

/// SQLite implementation of [`UserStateStore`] and [`ExerciseStateRepository`].
pub struct SqliteUserExerciseRepository {
    pool: SqlitePool,
}

impl SqliteUserExerciseRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Upsert the buffer; `is_correct` only replaces the stored value when
    /// given.
    pub async fn upsert_attempt(
        &self,
        student: &str,
        topic: &str,
        enumber: u32,
        buffer: &str,
        is_correct: Option<bool>,
    ) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"
            INSERT INTO user_exercises (student, topic, enumber, buffer_save, is_correct)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (student, topic, enumber) DO UPDATE SET
                buffer_save = excluded.buffer_save,
                is_correct = COALESCE(excluded.is_correct, user_exercises.is_correct)
            "#,
        )
        .bind(student)
        .bind(topic)
        .bind(i64::from(enumber))
        .bind(buffer)
        .bind(is_correct.map(encode_bool))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

impl UserStateStore for SqliteUserExerciseRepository {
    async fn save_attempt(
        &self,
        student: &str,
        exercise: &Exercise,
        buffer: &str,
        is_correct: Option<bool>,
    ) -> GraderResult<()> {
        self.upsert_attempt(student, &exercise.topic, exercise.enumber, buffer, is_correct)
            .await?;
        Ok(())
    }
}

impl ExerciseStateRepository for SqliteUserExerciseRepository {
    async fn load_state(
        &self,
        student: &str,
        topic: &str,
        enumber: u32,
    ) -> Result<Option<UserExerciseState>, PersistenceError> {
        let row: Option<(String, String, i64, String, Option<i64>, i64)> = sqlx::query_as(
            r#"
            SELECT student, topic, enumber, buffer_save, is_correct, favourite
            FROM user_exercises
            WHERE student = ? AND topic = ? AND enumber = ?
            "#,
        )
        .bind(student)
        .bind(topic)
        .bind(i64::from(enumber))
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(student, topic, enumber, buffer_save, is_correct, favourite)| {
            Ok(UserExerciseState {
                enumber: decode_number(&topic, enumber)?,
                student,
                topic,
                buffer_save,
                is_correct: is_correct.map(decode_bool),
                favourite: decode_bool(favourite),
            })
        })
        .transpose()
    }

    async fn set_favourite(
        &self,
        student: &str,
        topic: &str,
        enumber: u32,
        favourite: bool,
    ) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"
            INSERT INTO user_exercises (student, topic, enumber, favourite)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (student, topic, enumber) DO UPDATE SET
                favourite = excluded.favourite
            "#,
        )
        .bind(student)
        .bind(topic)
        .bind(i64::from(enumber))
        .bind(encode_bool(favourite))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
