//! SQLite-backed repository implementations.
//!
//! ## Database setup
//!
//! [`Database`] wraps a `sqlx::SqlitePool` configured with:
//! - **WAL mode**: one writer and multiple concurrent readers.
//! - **Foreign keys enabled**: exercises, solutions and progress rows are
//!   removed together with their topic.
//! - **Embedded migrations**: `sqlx::migrate!` runs
//!   `migrations/001_initial_schema.sql` when [`Database::open`] is called.
//!
//! ## Repository types
//!
//! | Type | Trait |
//! |------|-------|
//! | [`SqliteCatalog`] | `grader::Catalog` |
//! | [`SqliteUserExerciseRepository`] | `grader::UserStateStore`, `ExerciseStateRepository` |
//!
//! Keyword lists are stored as JSON arrays in `TEXT` columns and booleans as
//! `0`/`1`, converted through [`helpers`].
//!
//! ## Fixture import
//!
//! [`import_fixtures`] loads topics, exercises and solutions from a JSON file
//! in one transaction.

mod catalog_repo;
mod database;
mod import;
mod user_exercise_repo;
pub(crate) mod helpers;

pub use catalog_repo::SqliteCatalog;
pub use database::Database;
pub use import::{import_fixtures, ImportReport};
pub use user_exercise_repo::SqliteUserExerciseRepository;
