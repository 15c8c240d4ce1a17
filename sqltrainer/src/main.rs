//! sqltrainer command-line client.
//!
//! Sends one operation to a running `sqltrainer-server` over its Unix socket
//! (see [`config`] for the socket path and wait tunables), prints the
//! response as pretty JSON and exits non-zero when the server answered with
//! an error.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Args, Parser, ValueEnum};
use sqltrainer_client::{
    ExerciseRequest, FavouriteRequest, QueryRequest, Request, TopicRequest, TrainerClient,
};
use tracing_subscriber::EnvFilter;

mod config;
mod wait;

#[derive(Parser)]
#[command(name = "sqltrainer", about = "Run and grade SQL exercises")]
struct Cli {
    /// Operation to perform.
    #[arg(value_enum)]
    op: Op,

    #[command(flatten)]
    target: Target,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Op {
    /// Run a query without grading it.
    ExecuteQuery,
    /// Reset the schema, run the query and grade it.
    CheckAnswer,
    /// Show what the reference solution returns.
    SolutionResult,
    /// Install the topic schema unless it exists.
    CheckOrInstallDb,
    /// Rebuild the state right before the exercise.
    ResetDb,
    /// Show the saved buffer and flags.
    LoadExerciseState,
    /// Mark the exercise as favourite.
    Favourite,
    /// Remove the favourite mark.
    Unfavourite,
    /// Grade every exercise of a topic with its reference solution.
    VerifyTopic,
    Ping,
}

#[derive(Args, Debug, Default)]
struct Target {
    /// Student identity.
    #[arg(short, long)]
    student: Option<String>,

    /// Topic short name.
    #[arg(short, long)]
    topic: Option<String>,

    /// Exercise number within the topic.
    #[arg(short, long)]
    enumber: Option<u32>,

    /// SQL text.
    #[arg(short, long, conflicts_with = "file")]
    query: Option<String>,

    /// Read the SQL text from a file.
    #[arg(short, long)]
    file: Option<PathBuf>,
}

impl Target {
    fn student(&self) -> anyhow::Result<String> {
        self.student.clone().context("--student is required")
    }

    fn topic(&self) -> anyhow::Result<String> {
        self.topic.clone().context("--topic is required")
    }

    fn enumber(&self) -> anyhow::Result<u32> {
        self.enumber.context("--enumber is required")
    }

    fn sql(&self) -> anyhow::Result<String> {
        match (&self.query, &self.file) {
            (Some(query), _) => Ok(query.clone()),
            (None, Some(path)) => std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display())),
            (None, None) => bail!("--query or --file is required"),
        }
    }

    fn query_request(&self) -> anyhow::Result<QueryRequest> {
        Ok(QueryRequest {
            student: self.student()?,
            topic_short: self.topic()?,
            enumber: self.enumber()?,
            query: self.sql()?,
        })
    }

    fn exercise_request(&self) -> anyhow::Result<ExerciseRequest> {
        Ok(ExerciseRequest {
            student: self.student()?,
            topic_short: self.topic()?,
            enumber: self.enumber()?,
        })
    }

    fn topic_request(&self) -> anyhow::Result<TopicRequest> {
        Ok(TopicRequest {
            student: self.student()?,
            topic_short: self.topic()?,
        })
    }

    fn favourite_request(&self, favourite: bool) -> anyhow::Result<FavouriteRequest> {
        Ok(FavouriteRequest {
            student: self.student()?,
            topic_short: self.topic()?,
            enumber: self.enumber()?,
            favourite,
        })
    }
}

/// Build the wire request for `op` from the command-line arguments.
fn build_request(op: Op, target: &Target) -> anyhow::Result<Request> {
    Ok(match op {
        Op::ExecuteQuery => Request::ExecuteQuery(target.query_request()?),
        Op::CheckAnswer => Request::CheckAnswer(target.query_request()?),
        Op::SolutionResult => Request::SolutionResult(target.exercise_request()?),
        Op::CheckOrInstallDb => Request::CheckOrInstallDb(target.topic_request()?),
        Op::ResetDb => Request::ResetDb(target.exercise_request()?),
        Op::LoadExerciseState => Request::LoadExerciseState(target.exercise_request()?),
        Op::Favourite => Request::SetFavourite(target.favourite_request(true)?),
        Op::Unfavourite => Request::SetFavourite(target.favourite_request(false)?),
        Op::VerifyTopic => Request::VerifyTopic(target.topic_request()?),
        Op::Ping => Request::Ping,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let request = build_request(cli.op, &cli.target)?;

    let socket_path = config::get_socket_path();
    wait::wait_for_socket(
        &socket_path,
        Duration::from_secs(config::get_socket_timeout_secs()),
        Duration::from_millis(config::get_socket_poll_interval_ms()),
    )
    .await?;

    let mut client = TrainerClient::connect(&socket_path).await?;
    let response = client.request(&request).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);

    Ok(if response.is_error() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
