//! Grading against a live PostgreSQL server.
//!
//! Set `SQLTRAINER_TEST_PG_URL` (e.g. `host=localhost user=postgres
//! dbname=sqltrainer_test`) to run these; without it every test returns
//! early. Each test works in its own topic schema, so they can run in
//! parallel against one database.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use grader::{
    Catalog, ConnectionPolicy, Evaluator, Exercise, GraderError, GraderResult, InstallStatus,
    PgConnector, PgPoolConfig, PoolRegistry, RegistryConfig, Solution, Topic, UserStateStore,
    ERROR_IN_QUERY, NO_OUTPUT,
};
use serde_json::{json, Value};

const STUDENT: &str = "student";

struct MemoryCatalog {
    topic: Topic,
    exercises: Vec<Exercise>,
    solutions: Vec<Solution>,
}

impl MemoryCatalog {
    /// The photo collection topic, stored under schema `short`.
    fn photo_collection(short: &str) -> Self {
        let script = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/pc.sql");
        let mut catalog = Self {
            topic: Topic {
                short: short.to_string(),
                title: "Photo collection".to_string(),
                datamodel_script: script,
            },
            exercises: Vec::new(),
            solutions: Vec::new(),
        };
        catalog.add(
            1,
            true,
            None,
            true,
            &[],
            &[],
            "SELECT photo, title FROM photo WHERE format = 'jpg' ORDER BY photo",
        );
        catalog.add(
            2,
            false,
            Some("SELECT count(*) = 5 FROM photo"),
            false,
            &[],
            &[],
            "INSERT INTO photo VALUES ('nb05', 'Bridge', '2007-05-05', 'May', 'jpg', 640, 480, 3)",
        );
        catalog.add(
            3,
            true,
            None,
            false,
            &["count"],
            &[],
            "SELECT count(*) AS photos FROM photo",
        );
        catalog.add(
            4,
            true,
            None,
            false,
            &["right join"],
            &["left join"],
            "SELECT g.name, p.photo FROM photo p RIGHT JOIN photographer g ON p.author = g.id \
             ORDER BY g.name, p.photo",
        );
        catalog.add(
            5,
            false,
            Some("SELECT count(*) = 3 FROM photo WHERE title = upper(title)"),
            false,
            &[],
            &[],
            "UPDATE photo SET title = upper(title) WHERE format = 'jpg'",
        );
        catalog
    }

    #[allow(clippy::too_many_arguments)]
    fn add(
        &mut self,
        enumber: u32,
        is_select: bool,
        eval_statement: Option<&str>,
        check_order: bool,
        mandatory: &[&str],
        deny: &[&str],
        solution: &str,
    ) {
        let short = self.topic.short.clone();
        self.exercises.push(Exercise {
            topic: short.clone(),
            enumber,
            title: format!("Exercise {enumber}"),
            is_select,
            eval_statement: eval_statement.map(str::to_string),
            check_order,
            mandatory: mandatory.iter().map(|s| s.to_string()).collect(),
            deny: deny.iter().map(|s| s.to_string()).collect(),
        });
        self.solutions.push(Solution {
            topic: short,
            enumber,
            snumber: 1,
            sql: solution.to_string(),
        });
    }

    fn solution_sql(&self, enumber: u32) -> String {
        self.solutions
            .iter()
            .find(|s| s.enumber == enumber)
            .map(|s| s.sql.clone())
            .unwrap()
    }
}

impl Catalog for MemoryCatalog {
    async fn topic(&self, short: &str) -> GraderResult<Topic> {
        if short == self.topic.short {
            Ok(self.topic.clone())
        } else {
            Err(GraderError::NotFound(format!("topic {short}")))
        }
    }

    async fn exercise(&self, short: &str, enumber: u32) -> GraderResult<Exercise> {
        self.exercises
            .iter()
            .find(|e| e.topic == short && e.enumber == enumber)
            .cloned()
            .ok_or_else(|| GraderError::NotFound(format!("exercise {short}/{enumber}")))
    }

    async fn exercises(&self, short: &str) -> GraderResult<Vec<Exercise>> {
        Ok(self
            .exercises
            .iter()
            .filter(|e| e.topic == short)
            .cloned()
            .collect())
    }

    async fn canonical_solution(&self, short: &str, enumber: u32) -> GraderResult<Solution> {
        self.solutions
            .iter()
            .find(|s| s.topic == short && s.enumber == enumber && s.snumber == 1)
            .cloned()
            .ok_or_else(|| GraderError::NotFound(format!("solution {short}/{enumber}")))
    }
}

#[derive(Default)]
struct MemoryStore {
    attempts: Mutex<Vec<(String, u32, String, Option<bool>)>>,
}

impl UserStateStore for MemoryStore {
    async fn save_attempt(
        &self,
        student: &str,
        exercise: &Exercise,
        buffer: &str,
        is_correct: Option<bool>,
    ) -> GraderResult<()> {
        self.attempts.lock().unwrap().push((
            student.to_string(),
            exercise.enumber,
            buffer.to_string(),
            is_correct,
        ));
        Ok(())
    }
}

type TestEvaluator = Evaluator<MemoryCatalog, MemoryStore>;

/// An evaluator over a fresh `short` schema, or `None` when no test server
/// is configured.
async fn setup(short: &str) -> Option<TestEvaluator> {
    setup_with(MemoryCatalog::photo_collection(short)).await
}

async fn setup_with(catalog: MemoryCatalog) -> Option<TestEvaluator> {
    let url = std::env::var("SQLTRAINER_TEST_PG_URL").ok()?;
    let config: tokio_postgres::Config = url.parse().expect("valid SQLTRAINER_TEST_PG_URL");
    let connector = PgConnector::new(ConnectionPolicy::Shared(config), PgPoolConfig::default());
    let registry = PoolRegistry::new(connector, RegistryConfig::default());

    {
        let conn = registry.acquire(STUDENT).await.expect("test database reachable");
        conn.client()
            .batch_execute(&format!(
                "DROP SCHEMA IF EXISTS {} CASCADE",
                grader::schema::quote_ident(&catalog.topic.short)
            ))
            .await
            .expect("drop leftover schema");
    }

    Some(Evaluator::new(
        registry,
        Arc::new(catalog),
        Arc::new(MemoryStore::default()),
    ))
}

fn rows(result: &grader::TabularResult) -> Value {
    serde_json::to_value(&result.result).unwrap()
}

#[tokio::test]
async fn canonical_solutions_grade_correct() {
    let Some(evaluator) = setup("pc_canonical").await else {
        return;
    };
    let outcomes = evaluator.verify_topic(STUDENT, "pc_canonical").await.unwrap();
    assert_eq!(outcomes.len(), 5);
    for outcome in outcomes {
        assert!(outcome.correct, "exercise {} failed: {}", outcome.enumber, outcome.message);
        assert!(outcome.message.is_empty());
    }
}

#[tokio::test]
async fn install_reports_status() {
    let Some(evaluator) = setup("pc_install").await else {
        return;
    };
    let first = evaluator.check_or_install_db(STUDENT, "pc_install").await.unwrap();
    assert_eq!(first, InstallStatus::Installed);
    let second = evaluator.check_or_install_db(STUDENT, "pc_install").await.unwrap();
    assert_eq!(second, InstallStatus::AlreadyInstalled);
    assert_eq!(second.message(), "Already Installed!");
}

#[tokio::test]
async fn duplicate_columns_are_numbered() {
    let Some(evaluator) = setup("pc_dup").await else {
        return;
    };
    evaluator.check_or_install_db(STUDENT, "pc_dup").await.unwrap();
    let result = evaluator
        .execute_query(STUDENT, "pc_dup", 1, "SELECT photo, photo FROM photo WHERE photo = 'nb02'")
        .await
        .unwrap();
    assert_eq!(rows(&result), json!([{"photo0": "nb02", "photo1": "nb02"}]));
}

#[tokio::test]
async fn values_arrive_as_text() {
    let Some(evaluator) = setup("pc_text").await else {
        return;
    };
    evaluator.check_or_install_db(STUDENT, "pc_text").await.unwrap();
    let result = evaluator
        .execute_query(STUDENT, "pc_text", 1, "SELECT * FROM photo WHERE photo = 'nb02'")
        .await
        .unwrap();
    assert_eq!(
        rows(&result),
        json!([{
            "photo": "nb02",
            "title": "Example 1",
            "taken": "2005-03-20",
            "month": "Mar",
            "format": "tif",
            "width": "360",
            "height": "240",
            "author": "2"
        }])
    );
}

#[tokio::test]
async fn empty_result_yields_blank_row() {
    let Some(evaluator) = setup("pc_empty").await else {
        return;
    };
    evaluator.check_or_install_db(STUDENT, "pc_empty").await.unwrap();
    let result = evaluator
        .execute_query(STUDENT, "pc_empty", 1, "SELECT photo, title FROM photo WHERE false")
        .await
        .unwrap();
    assert_eq!(rows(&result), json!([{"photo": "", "title": ""}]));
}

#[tokio::test]
async fn sql_error_is_data_and_connection_stays_usable() {
    let Some(evaluator) = setup("pc_error").await else {
        return;
    };
    evaluator.check_or_install_db(STUDENT, "pc_error").await.unwrap();

    let failed = evaluator
        .execute_query(STUDENT, "pc_error", 1, "SELECT nope FROM photo")
        .await
        .unwrap();
    assert!(failed.is_sentinel(ERROR_IN_QUERY));
    let text = failed.result[0][ERROR_IN_QUERY].as_str().unwrap();
    assert!(text.starts_with("ERROR"), "{text}");
    assert!(text.contains("nope"), "{text}");

    let after = evaluator
        .execute_query(STUDENT, "pc_error", 1, "SELECT count(*) AS n FROM photo")
        .await
        .unwrap();
    assert_eq!(rows(&after), json!([{"n": "4"}]));
}

#[tokio::test]
async fn copy_query_is_data_and_next_request_succeeds() {
    let Some(evaluator) = setup("pc_copy").await else {
        return;
    };
    evaluator.check_or_install_db(STUDENT, "pc_copy").await.unwrap();

    for copy in ["COPY photo FROM STDIN", "COPY photo TO STDOUT"] {
        let failed = evaluator
            .execute_query(STUDENT, "pc_copy", 1, copy)
            .await
            .unwrap();
        assert!(failed.is_sentinel(ERROR_IN_QUERY), "{copy}: {failed:?}");

        let after = evaluator
            .execute_query(STUDENT, "pc_copy", 1, "SELECT count(*) AS n FROM photo")
            .await
            .unwrap();
        assert_eq!(rows(&after), json!([{"n": "4"}]));
    }
}

#[tokio::test]
async fn copy_answer_is_graded_incorrect() {
    let Some(evaluator) = setup("pc_copy_check").await else {
        return;
    };
    let outcome = evaluator
        .check_answer(STUDENT, "pc_copy_check", 1, "COPY photo TO STDOUT")
        .await
        .unwrap();
    assert!(!outcome.correct);
    assert!(outcome.user_result.is_sentinel(ERROR_IN_QUERY));
    assert_eq!(
        rows(&outcome.solu_result),
        json!([{"photo": "nb01", "title": "Sunset"}, {"photo": "nb03", "title": "Harbour"}])
    );

    let outcome = evaluator
        .check_answer(STUDENT, "pc_copy_check", 2, "COPY photo FROM STDIN")
        .await
        .unwrap();
    assert!(!outcome.correct);
}

#[tokio::test]
async fn statement_without_rows_reports_no_output() {
    let Some(evaluator) = setup("pc_dml").await else {
        return;
    };
    evaluator.check_or_install_db(STUDENT, "pc_dml").await.unwrap();
    let result = evaluator
        .execute_query(STUDENT, "pc_dml", 2, "UPDATE photo SET title = title WHERE photo = 'nb01'")
        .await
        .unwrap();
    assert!(result.is_sentinel(NO_OUTPUT));
}

#[tokio::test]
async fn last_statement_decides_output() {
    let Some(evaluator) = setup("pc_multi").await else {
        return;
    };
    evaluator.check_or_install_db(STUDENT, "pc_multi").await.unwrap();
    let result = evaluator
        .execute_query(
            STUDENT,
            "pc_multi",
            2,
            "DELETE FROM photo WHERE photo = 'nb04'; SELECT count(*) AS n FROM photo",
        )
        .await
        .unwrap();
    assert_eq!(rows(&result), json!([{"n": "3"}]));
}

#[tokio::test]
async fn reset_is_idempotent() {
    let Some(evaluator) = setup("pc_reset").await else {
        return;
    };
    evaluator.reset_db(STUDENT, "pc_reset", 3).await.unwrap();
    let first = evaluator.solution_result(STUDENT, "pc_reset", 3).await.unwrap();
    evaluator.reset_db(STUDENT, "pc_reset", 3).await.unwrap();
    evaluator.reset_db(STUDENT, "pc_reset", 3).await.unwrap();
    let second = evaluator.solution_result(STUDENT, "pc_reset", 3).await.unwrap();
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[tokio::test]
async fn reset_replays_earlier_mutations() {
    let Some(evaluator) = setup("pc_replay").await else {
        return;
    };
    let before = evaluator.solution_result(STUDENT, "pc_replay", 1).await.unwrap();
    assert_eq!(
        rows(&before),
        json!([{"photo": "nb01", "title": "Sunset"}, {"photo": "nb03", "title": "Harbour"}])
    );

    let after = evaluator.solution_result(STUDENT, "pc_replay", 3).await.unwrap();
    assert_eq!(rows(&after), json!([{"photos": "5"}]));
}

#[tokio::test]
async fn reset_discards_student_changes() {
    let Some(evaluator) = setup("pc_discard").await else {
        return;
    };
    evaluator.check_or_install_db(STUDENT, "pc_discard").await.unwrap();
    evaluator
        .execute_query(STUDENT, "pc_discard", 1, "DELETE FROM photo")
        .await
        .unwrap();
    evaluator.reset_db(STUDENT, "pc_discard", 1).await.unwrap();
    let result = evaluator
        .execute_query(STUDENT, "pc_discard", 1, "SELECT count(*) AS n FROM photo")
        .await
        .unwrap();
    assert_eq!(rows(&result), json!([{"n": "4"}]));
}

#[tokio::test]
async fn non_select_solution_result_is_placeholder() {
    let Some(evaluator) = setup("pc_placeholder").await else {
        return;
    };
    let result = evaluator.solution_result(STUDENT, "pc_placeholder", 2).await.unwrap();
    assert_eq!(rows(&result), json!([{"no_output": ""}]));
}

#[tokio::test]
async fn order_sensitive_exercise_rejects_reordered_rows() {
    let Some(evaluator) = setup("pc_order").await else {
        return;
    };
    let outcome = evaluator
        .check_answer(
            STUDENT,
            "pc_order",
            1,
            "SELECT photo, title FROM photo WHERE format = 'jpg' ORDER BY photo DESC",
        )
        .await
        .unwrap();
    assert!(!outcome.correct);
    assert!(outcome.message.is_empty());
    assert!(outcome.user_result.miss_rows.is_empty());
    assert!(outcome.solu_result.miss_rows.is_empty());
}

#[tokio::test]
async fn wrong_rows_are_reported() {
    let Some(evaluator) = setup("pc_rows").await else {
        return;
    };
    let outcome = evaluator
        .check_answer(
            STUDENT,
            "pc_rows",
            1,
            "SELECT photo, title FROM photo WHERE format = 'tif' OR photo = 'nb01' ORDER BY photo",
        )
        .await
        .unwrap();
    assert!(!outcome.correct);
    assert_eq!(outcome.user_result.miss_rows, vec![1]);
    assert_eq!(outcome.solu_result.miss_rows, vec![1]);
}

#[tokio::test]
async fn keyword_policy_overrides_correct_result() {
    let Some(evaluator) = setup("pc_keywords").await else {
        return;
    };
    let outcome = evaluator
        .check_answer(
            STUDENT,
            "pc_keywords",
            4,
            "SELECT g.name, p.photo FROM photographer g LEFT JOIN photo p ON p.author = g.id",
        )
        .await
        .unwrap();
    assert!(!outcome.correct);
    assert!(outcome.user_result.miss_rows.is_empty());
    assert_eq!(
        outcome.message,
        "Following keywords are missing in your query: ['right join'] \
         Following keywords in your query are not allowed in this exercise: ['left join']"
    );
}

#[tokio::test]
async fn failing_evaluation_statement_is_incorrect() {
    let Some(evaluator) = setup("pc_eval").await else {
        return;
    };
    let outcome = evaluator
        .check_answer(STUDENT, "pc_eval", 2, "SELECT 1")
        .await
        .unwrap();
    assert!(!outcome.correct);
    assert_eq!(rows(&outcome.solu_result), json!([{"no_output": ""}]));
}

#[tokio::test]
async fn attempts_are_saved() {
    let Some(evaluator) = setup("pc_saved").await else {
        return;
    };
    let solution = evaluator.catalog().solution_sql(3);
    evaluator
        .execute_query(STUDENT, "pc_saved", 3, "SELECT 1")
        .await
        .unwrap();
    evaluator
        .check_answer(STUDENT, "pc_saved", 3, &solution)
        .await
        .unwrap();

    let attempts = evaluator.store().attempts.lock().unwrap().clone();
    assert_eq!(
        attempts,
        vec![
            (STUDENT.to_string(), 3, "SELECT 1".to_string(), None),
            (STUDENT.to_string(), 3, solution, Some(true)),
        ]
    );
}

#[tokio::test]
async fn missing_eval_statement_is_refused() {
    let mut catalog = MemoryCatalog::photo_collection("pc_invariant");
    catalog.exercises[1].eval_statement = None;
    let Some(evaluator) = setup_with(catalog).await else {
        return;
    };
    let err = evaluator
        .check_answer(STUDENT, "pc_invariant", 2, "SELECT 1")
        .await
        .unwrap_err();
    assert!(matches!(err, GraderError::MissingEvalStatement(_)));
}

#[tokio::test]
async fn unknown_exercise_is_not_found() {
    let Some(evaluator) = setup("pc_unknown").await else {
        return;
    };
    let err = evaluator
        .execute_query(STUDENT, "pc_unknown", 99, "SELECT 1")
        .await
        .unwrap_err();
    assert!(matches!(err, GraderError::NotFound(_)));
}

#[tokio::test]
async fn failing_reference_solution_never_grades_correct() {
    let mut catalog = MemoryCatalog::photo_collection("pc_broken_ref");
    catalog.add(6, true, None, false, &[], &[], "SELECT no_such_column FROM photo");
    let Some(evaluator) = setup_with(catalog).await else {
        return;
    };

    let outcome = evaluator
        .check_answer(STUDENT, "pc_broken_ref", 6, "SELECT no_such_column FROM photo")
        .await
        .unwrap();
    assert!(!outcome.correct);
    assert!(outcome.solu_result.is_sentinel(ERROR_IN_QUERY));

    let outcomes = evaluator.verify_topic(STUDENT, "pc_broken_ref").await.unwrap();
    let broken = outcomes.iter().find(|o| o.enumber == 6).unwrap();
    assert!(!broken.correct);
    assert!(broken.message.contains("no_such_column"), "{}", broken.message);
    assert!(outcomes.iter().filter(|o| o.enumber != 6).all(|o| o.correct));
}
