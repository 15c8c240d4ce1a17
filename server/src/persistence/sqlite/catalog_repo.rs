//! SQLite-backed topic/exercise/solution catalog.

use std::path::PathBuf;

use grader::{Catalog, Exercise, GraderError, GraderResult, Solution, Topic};
use sqlx::SqlitePool;

use super::helpers::{decode_bool, decode_keywords, decode_number, resolve_script};
use crate::persistence::PersistenceError;

type ExerciseRow = (String, i64, String, i64, Option<String>, i64, String, String);

const EXERCISE_COLUMNS: &str = "topic, enumber, title, is_select, eval_statement, check_order, \
     mandatory_list, deny_list";

/// SQLite implementation of [`grader::Catalog`].
pub struct SqliteCatalog {
    pool: SqlitePool,
    media_root: PathBuf,
}

impl SqliteCatalog {
    pub fn new(pool: SqlitePool, media_root: PathBuf) -> Self {
        Self { pool, media_root }
    }

    pub async fn load_topic(&self, short: &str) -> Result<Option<Topic>, PersistenceError> {
        let row: Option<(String, String, String)> =
            sqlx::query_as("SELECT short, title, datamodel_script FROM topics WHERE short = ?")
                .bind(short)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(short, title, script)| Topic {
            short,
            title,
            datamodel_script: resolve_script(&self.media_root, &script),
        }))
    }

    pub async fn load_exercise(
        &self,
        short: &str,
        enumber: u32,
    ) -> Result<Option<Exercise>, PersistenceError> {
        let row: Option<ExerciseRow> = sqlx::query_as(&format!(
            "SELECT {EXERCISE_COLUMNS} FROM exercises WHERE topic = ? AND enumber = ?"
        ))
        .bind(short)
        .bind(i64::from(enumber))
        .fetch_optional(&self.pool)
        .await?;

        row.map(decode_exercise).transpose()
    }

    pub async fn list_exercises(&self, short: &str) -> Result<Vec<Exercise>, PersistenceError> {
        let rows: Vec<ExerciseRow> = sqlx::query_as(&format!(
            "SELECT {EXERCISE_COLUMNS} FROM exercises WHERE topic = ? ORDER BY enumber"
        ))
        .bind(short)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(decode_exercise).collect()
    }

    /// The canonical solution, `snumber = 1`.
    pub async fn load_canonical_solution(
        &self,
        short: &str,
        enumber: u32,
    ) -> Result<Option<Solution>, PersistenceError> {
        let row: Option<(String, i64, i64, String)> = sqlx::query_as(
            r#"
            SELECT topic, enumber, snumber, sql
            FROM solutions
            WHERE topic = ? AND enumber = ? AND snumber = 1
            "#,
        )
        .bind(short)
        .bind(i64::from(enumber))
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(topic, enumber, snumber, sql)| {
            let key = format!("{topic}/{enumber}");
            Ok(Solution {
                enumber: decode_number(&key, enumber)?,
                snumber: decode_number(&key, snumber)?,
                topic,
                sql,
            })
        })
        .transpose()
    }
}

fn decode_exercise(row: ExerciseRow) -> Result<Exercise, PersistenceError> {
    let (topic, enumber, title, is_select, eval_statement, check_order, mandatory, deny) = row;
    let key = format!("{topic}/{enumber}");
    Ok(Exercise {
        enumber: decode_number(&key, enumber)?,
        title,
        is_select: decode_bool(is_select),
        eval_statement,
        check_order: decode_bool(check_order),
        mandatory: decode_keywords(&key, &mandatory)?,
        deny: decode_keywords(&key, &deny)?,
        topic,
    })
}

fn found<T>(value: Option<T>, what: impl FnOnce() -> String) -> GraderResult<T> {
    value.ok_or_else(|| GraderError::NotFound(what()))
}

impl Catalog for SqliteCatalog {
    async fn topic(&self, short: &str) -> GraderResult<Topic> {
        found(self.load_topic(short).await?, || format!("topic {short}"))
    }

    async fn exercise(&self, short: &str, enumber: u32) -> GraderResult<Exercise> {
        found(self.load_exercise(short, enumber).await?, || {
            format!("exercise {short}/{enumber}")
        })
    }

    async fn exercises(&self, short: &str) -> GraderResult<Vec<Exercise>> {
        // Distinguish an unknown topic from one without exercises.
        found(self.load_topic(short).await?, || format!("topic {short}"))?;
        Ok(self.list_exercises(short).await?)
    }

    async fn canonical_solution(&self, short: &str, enumber: u32) -> GraderResult<Solution> {
        found(self.load_canonical_solution(short, enumber).await?, || {
            format!("solution of {short}/{enumber}")
        })
    }
}
