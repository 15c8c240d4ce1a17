//! Creating and dropping one schema per topic inside a student database.

use tokio_postgres::{Client, Transaction};

use crate::catalog::Topic;
use crate::error::{GraderError, GraderResult};

/// Quote `name` as an SQL identifier.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `SET search_path` statement for a topic schema.
pub fn search_path(short: &str) -> String {
    format!("SET search_path TO {}", quote_ident(short))
}

/// Whether a schema named exactly `short` exists.
///
/// Must be called outside an open transaction so that schemas dropped or
/// created by other sessions are visible.
pub async fn is_installed(client: &Client, short: &str) -> GraderResult<bool> {
    let row = client
        .query_one(
            "SELECT EXISTS (SELECT 1 FROM pg_catalog.pg_namespace WHERE nspname = $1)",
            &[&short],
        )
        .await?;
    Ok(row.try_get(0)?)
}

/// Read a topic's datamodel script.
pub async fn load_script(topic: &Topic) -> GraderResult<String> {
    tokio::fs::read_to_string(&topic.datamodel_script)
        .await
        .map_err(|source| GraderError::Script {
            path: topic.datamodel_script.clone(),
            source,
        })
}

/// Create the schema, switch to it and run `script` as one batch.
///
/// Fails if the schema already exists; callers check [`is_installed`] first.
pub async fn install(tx: &Transaction<'_>, short: &str, script: &str) -> GraderResult<()> {
    tx.batch_execute(&format!("CREATE SCHEMA {}", quote_ident(short)))
        .await?;
    tx.batch_execute(&search_path(short)).await?;
    tx.batch_execute(script).await.map_err(|err| {
        tracing::error!(topic = short, "Datamodel script failed: {err}");
        GraderError::Postgres(err)
    })?;
    Ok(())
}

/// Drop the schema and everything in it.
pub async fn uninstall(tx: &Transaction<'_>, short: &str) -> GraderResult<()> {
    tx.batch_execute(&format!("DROP SCHEMA {} CASCADE", quote_ident(short)))
        .await?;
    Ok(())
}
