//! Loading topics, exercises and solutions from a JSON fixture file.
//!
//! ```json
//! {
//!   "topics":    [{"short": "pc", "title": "Photo collection", "datamodel_script": "pc/pc.sql"}],
//!   "exercises": [{"topic": "pc", "enumber": 1, "title": "All photos", "is_select": true}],
//!   "solutions": [{"topic": "pc", "enumber": 1, "snumber": 1, "sql": "SELECT * FROM photo"}]
//! }
//! ```
//!
//! Existing records with the same key are updated in place, so saved
//! progress survives a re-import.

use std::path::Path;

use serde::Deserialize;
use sqlx::{SqlitePool, Transaction};
use tracing::info;

use super::helpers::{encode_bool, encode_keywords};
use crate::persistence::PersistenceError;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Fixtures {
    pub topics: Vec<TopicFixture>,
    pub exercises: Vec<ExerciseFixture>,
    pub solutions: Vec<SolutionFixture>,
}

#[derive(Debug, Deserialize)]
pub struct TopicFixture {
    pub short: String,
    pub title: String,
    #[serde(default)]
    pub visible: bool,
    pub datamodel_script: String,
}

#[derive(Debug, Deserialize)]
pub struct ExerciseFixture {
    pub topic: String,
    pub enumber: u32,
    pub title: String,
    #[serde(default)]
    pub question: String,
    #[serde(default = "default_points")]
    pub points: f64,
    #[serde(default = "default_difficulty")]
    pub difficulty: u8,
    #[serde(default)]
    pub check_order: bool,
    #[serde(default)]
    pub mandatory_list: Vec<String>,
    #[serde(default)]
    pub deny_list: Vec<String>,
    #[serde(default = "default_is_select")]
    pub is_select: bool,
    #[serde(default)]
    pub eval_statement: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SolutionFixture {
    pub topic: String,
    pub enumber: u32,
    #[serde(default = "default_snumber")]
    pub snumber: u32,
    pub sql: String,
    #[serde(default)]
    pub description: String,
}

fn default_points() -> f64 {
    5.0
}

fn default_difficulty() -> u8 {
    1
}

fn default_is_select() -> bool {
    true
}

fn default_snumber() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub topics: u64,
    pub exercises: u64,
    pub solutions: u64,
}

/// Read `path` and import it with [`import`].
pub async fn import_fixtures(pool: &SqlitePool, path: &Path) -> Result<ImportReport, PersistenceError> {
    info!(path = %path.display(), "Importing fixtures");
    let text = tokio::fs::read_to_string(path).await?;
    let fixtures: Fixtures = serde_json::from_str(&text)?;
    import(pool, &fixtures).await
}

/// Upsert every record in one transaction.
pub async fn import(pool: &SqlitePool, fixtures: &Fixtures) -> Result<ImportReport, PersistenceError> {
    validate(fixtures)?;

    let mut tx = pool.begin().await?;
    insert_topics(&mut tx, &fixtures.topics).await?;
    insert_exercises(&mut tx, &fixtures.exercises).await?;
    insert_solutions(&mut tx, &fixtures.solutions).await?;
    tx.commit().await?;

    let report = ImportReport {
        topics: fixtures.topics.len() as u64,
        exercises: fixtures.exercises.len() as u64,
        solutions: fixtures.solutions.len() as u64,
    };

    info!(
        topics = report.topics,
        exercises = report.exercises,
        solutions = report.solutions,
        "Fixture import completed"
    );

    Ok(report)
}

/// Reject records the schema constraints would reject, with a readable key.
fn validate(fixtures: &Fixtures) -> Result<(), PersistenceError> {
    for exercise in &fixtures.exercises {
        let has_eval = exercise
            .eval_statement
            .as_deref()
            .is_some_and(|s| !s.trim().is_empty());
        if !exercise.is_select && !has_eval {
            return Err(PersistenceError::Invalid {
                key: format!("{}/{}", exercise.topic, exercise.enumber),
                reason: "non-SELECT exercise without eval_statement".to_string(),
            });
        }
    }
    Ok(())
}

async fn insert_topics(
    tx: &mut Transaction<'_, sqlx::Sqlite>,
    topics: &[TopicFixture],
) -> Result<(), PersistenceError> {
    for topic in topics {
        sqlx::query(
            r#"
            INSERT INTO topics (short, title, visible, datamodel_script)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (short) DO UPDATE SET
                title = excluded.title,
                visible = excluded.visible,
                datamodel_script = excluded.datamodel_script
            "#,
        )
        .bind(&topic.short)
        .bind(&topic.title)
        .bind(encode_bool(topic.visible))
        .bind(&topic.datamodel_script)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

async fn insert_exercises(
    tx: &mut Transaction<'_, sqlx::Sqlite>,
    exercises: &[ExerciseFixture],
) -> Result<(), PersistenceError> {
    for exercise in exercises {
        sqlx::query(
            r#"
            INSERT INTO exercises
                (topic, enumber, title, question, points, difficulty, check_order,
                 mandatory_list, deny_list, is_select, eval_statement)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (topic, enumber) DO UPDATE SET
                title = excluded.title,
                question = excluded.question,
                points = excluded.points,
                difficulty = excluded.difficulty,
                check_order = excluded.check_order,
                mandatory_list = excluded.mandatory_list,
                deny_list = excluded.deny_list,
                is_select = excluded.is_select,
                eval_statement = excluded.eval_statement
            "#,
        )
        .bind(&exercise.topic)
        .bind(i64::from(exercise.enumber))
        .bind(&exercise.title)
        .bind(&exercise.question)
        .bind(exercise.points)
        .bind(i64::from(exercise.difficulty))
        .bind(encode_bool(exercise.check_order))
        .bind(encode_keywords(&exercise.mandatory_list)?)
        .bind(encode_keywords(&exercise.deny_list)?)
        .bind(encode_bool(exercise.is_select))
        .bind(&exercise.eval_statement)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

async fn insert_solutions(
    tx: &mut Transaction<'_, sqlx::Sqlite>,
    solutions: &[SolutionFixture],
) -> Result<(), PersistenceError> {
    for solution in solutions {
        sqlx::query(
            r#"
            INSERT INTO solutions (topic, enumber, snumber, sql, description)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (topic, enumber, snumber) DO UPDATE SET
                sql = excluded.sql,
                description = excluded.description
            "#,
        )
        .bind(&solution.topic)
        .bind(i64::from(solution.enumber))
        .bind(i64::from(solution.snumber))
        .bind(&solution.sql)
        .bind(&solution.description)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::sqlite::Database;
    use tempfile::TempDir;

    const FIXTURES: &str = r#"{
        "topics": [
            {"short": "pc", "title": "Photo collection", "visible": true, "datamodel_script": "pc/pc.sql"}
        ],
        "exercises": [
            {"topic": "pc", "enumber": 1, "title": "All photos", "check_order": true},
            {"topic": "pc", "enumber": 2, "title": "Add a photo", "is_select": false,
             "eval_statement": "SELECT count(*) = 5 FROM photo"},
            {"topic": "pc", "enumber": 3, "title": "Right join", "mandatory_list": ["right join"]}
        ],
        "solutions": [
            {"topic": "pc", "enumber": 1, "sql": "SELECT * FROM photo ORDER BY photo"},
            {"topic": "pc", "enumber": 1, "snumber": 2, "sql": "SELECT * FROM photo ORDER BY 1"},
            {"topic": "pc", "enumber": 2, "sql": "INSERT INTO photo (photo) VALUES ('nb05')"},
            {"topic": "pc", "enumber": 3, "sql": "SELECT 1"}
        ]
    }"#;

    async fn table_count(pool: &SqlitePool, table: &str) -> i64 {
        let row: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(pool)
            .await
            .unwrap();
        row.0
    }

    #[tokio::test]
    async fn test_import_from_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("fixtures.json");
        std::fs::write(&path, FIXTURES).unwrap();

        let db = Database::new_in_memory().await.unwrap();
        let report = import_fixtures(db.pool(), &path).await.unwrap();

        assert_eq!(
            report,
            ImportReport {
                topics: 1,
                exercises: 3,
                solutions: 4
            }
        );
        assert_eq!(table_count(db.pool(), "exercises").await, 3);
        assert_eq!(table_count(db.pool(), "solutions").await, 4);
    }

    #[tokio::test]
    async fn test_import_is_repeatable() {
        let db = Database::new_in_memory().await.unwrap();
        let fixtures: Fixtures = serde_json::from_str(FIXTURES).unwrap();
        import(db.pool(), &fixtures).await.unwrap();
        import(db.pool(), &fixtures).await.unwrap();
        assert_eq!(table_count(db.pool(), "topics").await, 1);
        assert_eq!(table_count(db.pool(), "solutions").await, 4);
    }

    #[tokio::test]
    async fn test_reimporting_topic_keeps_progress() {
        let db = Database::new_in_memory().await.unwrap();
        let fixtures: Fixtures = serde_json::from_str(FIXTURES).unwrap();
        import(db.pool(), &fixtures).await.unwrap();
        sqlx::query("INSERT INTO user_exercises (student, topic, enumber) VALUES ('mitro', 'pc', 3)")
            .execute(db.pool())
            .await
            .unwrap();

        import(db.pool(), &fixtures).await.unwrap();
        assert_eq!(table_count(db.pool(), "user_exercises").await, 1);
    }

    #[tokio::test]
    async fn test_rejects_mutating_exercise_without_eval() {
        let db = Database::new_in_memory().await.unwrap();
        let fixtures: Fixtures = serde_json::from_str(
            r#"{"exercises": [{"topic": "pc", "enumber": 9, "title": "Drop", "is_select": false}]}"#,
        )
        .unwrap();
        let err = import(db.pool(), &fixtures).await.unwrap_err();
        assert!(err.to_string().contains("pc/9"));
        assert_eq!(table_count(db.pool(), "exercises").await, 0);
    }

    #[tokio::test]
    async fn test_empty_file_imports_nothing() {
        let db = Database::new_in_memory().await.unwrap();
        let report = import(db.pool(), &Fixtures::default()).await.unwrap();
        assert_eq!(report.topics + report.exercises + report.solutions, 0);
    }
}
