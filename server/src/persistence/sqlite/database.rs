//! SQLite connection pool and migration runner.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;

use crate::persistence::PersistenceError;

/// File name of the catalog database inside the data directory.
pub const DATABASE_FILE: &str = "sqltrainer.db";

/// Holds a connection pool to the SQLite database.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (or create) the database at `path`, run migrations, and return
    /// a ready-to-use `Database`.
    pub async fn open(path: &Path) -> Result<Self, PersistenceError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;
        tracing::info!(path = %path.display(), "Opened catalog database");
        Ok(db)
    }

    /// Open `sqltrainer.db` inside `data_dir`.
    pub async fn open_in(data_dir: &Path) -> Result<Self, PersistenceError> {
        Self::open(&data_dir.join(DATABASE_FILE)).await
    }

    /// Create an in-memory database for testing. Migrations are applied.
    #[cfg(test)]
    pub async fn new_in_memory() -> Result<Self, PersistenceError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Run embedded migrations from `server/migrations/`.
    async fn run_migrations(&self) -> Result<(), PersistenceError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| PersistenceError::Migration(e.to_string()))?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
