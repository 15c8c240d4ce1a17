mod config;
mod persistence;
mod service;
mod transport;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use grader::{ConnectionPolicy, Evaluator, PgConnector, PoolRegistry};
use persistence::sqlite::{import_fixtures, Database, SqliteCatalog, SqliteUserExerciseRepository};
use service::TrainerService;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Identity used for the start-up connectivity check of the shared database.
const PROBE_IDENTITY: &str = "startup-probe";

#[derive(Parser)]
#[command(name = "sqltrainer-server", about = "SQL exercise grading server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve requests on the Unix socket (default).
    Serve,
    /// Load topics, exercises and solutions from a JSON file.
    Import {
        /// Fixture file to import.
        file: PathBuf,
    },
}

fn init_tracing() -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match config::get_log_dir() {
        Some(log_dir) => {
            std::fs::create_dir_all(&log_dir).ok();
            let file_appender = tracing_appender::rolling::daily(&log_dir, "sqltrainer-server");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_span_events(FmtSpan::CLOSE),
                )
                .with(filter)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_span_events(FmtSpan::CLOSE)
                .with_writer(std::io::stderr)
                .init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = init_tracing();

    let data_dir = config::get_data_dir();
    tracing::info!("Using data directory: {}", data_dir.display());
    let db = Database::open_in(&data_dir).await?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Import { file } => {
            let report = import_fixtures(db.pool(), &file).await?;
            println!(
                "Imported {} topics, {} exercises, {} solutions",
                report.topics, report.exercises, report.solutions
            );
            Ok(())
        }
        Commands::Serve => serve(db).await,
    }
}

async fn serve(db: Database) -> anyhow::Result<()> {
    let media_root = config::get_media_root();
    tracing::info!("Using media root: {}", media_root.display());

    let policy = config::get_connection_policy()?;
    let deploy = matches!(policy, ConnectionPolicy::PerStudent(_));
    tracing::info!(deploy, host = %policy.host_label(), "Student database policy");

    let registry = PoolRegistry::new(
        PgConnector::new(policy, config::get_pool_config()),
        config::get_registry_config(),
    );
    let reaper = registry.spawn_reaper();

    if !deploy {
        if let Err(err) = registry.get_pool(PROBE_IDENTITY).await {
            tracing::warn!(
                host = %registry.connector().policy().host_label(),
                "Shared test database unreachable: {err}"
            );
        }
    }

    let catalog = Arc::new(SqliteCatalog::new(db.pool().clone(), media_root));
    let store = Arc::new(SqliteUserExerciseRepository::new(db.pool().clone()));
    let service = Arc::new(TrainerService::new(Evaluator::new(
        Arc::clone(&registry),
        catalog,
        store,
    )));

    let socket_path = config::get_socket_path();
    let listener = transport::bind(&socket_path)?;
    tracing::info!("Server listening on {}", socket_path.display());

    transport::serve(listener, service, shutdown_signal()).await;

    reaper.shutdown().await;
    registry.close_all().await;
    if let Err(err) = std::fs::remove_file(&socket_path) {
        tracing::warn!("Failed to remove socket {}: {err}", socket_path.display());
    }
    tracing::info!("Server stopped");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::warn!("Cannot listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
