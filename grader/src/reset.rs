//! Rebuilding a topic schema to the state expected right before an exercise.

use tokio_postgres::Client;

use crate::catalog::{Catalog, Exercise, Topic};
use crate::error::{GraderError, GraderResult};
use crate::schema;

/// Install `topic` unless its schema already exists. Returns whether it was
/// installed by this call.
pub async fn ensure_installed(client: &mut Client, topic: &Topic) -> GraderResult<bool> {
    if schema::is_installed(client, &topic.short).await? {
        return Ok(false);
    }
    let script = schema::load_script(topic).await?;
    let tx = client.transaction().await?;
    schema::install(&tx, &topic.short, &script).await?;
    tx.commit().await?;
    tracing::info!(topic = %topic.short, "Installed topic schema");
    Ok(true)
}

/// Drop and reinstall `topic`, then replay the canonical solutions of every
/// earlier non-SELECT exercise in `enumber` order.
///
/// Each step commits on its own. A failure leaves a partial schema behind,
/// which the next reset drops again.
pub async fn reset<C: Catalog>(
    client: &mut Client,
    catalog: &C,
    topic: &Topic,
    enumber: u32,
) -> GraderResult<()> {
    let script = schema::load_script(topic).await?;

    if schema::is_installed(client, &topic.short).await? {
        let tx = client.transaction().await?;
        schema::uninstall(&tx, &topic.short).await?;
        tx.commit().await?;
    }

    let tx = client.transaction().await?;
    schema::install(&tx, &topic.short, &script).await?;
    tx.commit().await?;

    let exercises = catalog.exercises(&topic.short).await?;
    for exercise in replay_order(exercises, enumber) {
        let solution = catalog
            .canonical_solution(&topic.short, exercise.enumber)
            .await?;
        replay(client, &exercise, &solution.sql).await?;
    }

    tracing::debug!(topic = %topic.short, enumber, "Reset topic schema");
    Ok(())
}

/// Earlier mutating exercises, sorted by `enumber`.
fn replay_order(mut exercises: Vec<Exercise>, enumber: u32) -> Vec<Exercise> {
    exercises.retain(|exercise| exercise.enumber < enumber && !exercise.is_select);
    exercises.sort_by_key(|exercise| exercise.enumber);
    exercises
}

async fn replay(client: &mut Client, exercise: &Exercise, sql: &str) -> GraderResult<()> {
    let tx = client.transaction().await?;
    tx.batch_execute(&schema::search_path(&exercise.topic))
        .await?;
    if let Err(source) = tx.batch_execute(sql).await {
        tracing::error!(exercise = %exercise.key(), "Reference solution failed: {source}");
        return Err(GraderError::ReferenceSolution {
            exercise: exercise.key(),
            source,
        });
    }
    tx.commit().await?;
    Ok(())
}
