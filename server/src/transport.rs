//! Unix-socket request loop.
//!
//! Each connection carries newline-delimited JSON requests and receives one
//! response line per request, in order.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use grader::{Catalog, UserStateStore};
use sqltrainer_protocol::{decode, write_message, ErrorCode, FrameError, Request, Response};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio_stream::wrappers::{LinesStream, UnixListenerStream};
use tokio_stream::StreamExt;

use crate::persistence::ExerciseStateRepository;
use crate::service::TrainerService;

/// Bind `path`, replacing a socket file left behind by a previous run.
pub fn bind(path: &Path) -> std::io::Result<UnixListener> {
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    UnixListener::bind(path)
}

/// Accept connections until `shutdown` resolves.
///
/// Connections already accepted keep running until their peer hangs up.
pub async fn serve<C, S>(
    listener: UnixListener,
    service: Arc<TrainerService<C, S>>,
    shutdown: impl Future<Output = ()>,
) where
    C: Catalog + 'static,
    S: UserStateStore + ExerciseStateRepository + 'static,
{
    let mut incoming = UnixListenerStream::new(listener);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            next = incoming.next() => match next {
                Some(Ok(stream)) => {
                    let service = Arc::clone(&service);
                    let conn_id = uuid::Uuid::new_v4();
                    tokio::spawn(async move {
                        tracing::debug!(%conn_id, "Connection opened");
                        match handle_connection(stream, service).await {
                            Ok(requests) => tracing::debug!(%conn_id, requests, "Connection closed"),
                            Err(err) => tracing::warn!(%conn_id, "Connection failed: {err}"),
                        }
                    });
                }
                Some(Err(err)) => tracing::warn!("Accept failed: {err}"),
                None => break,
            },
        }
    }
    tracing::info!("Request loop stopped");
}

/// Answer requests on one connection. Returns the number of requests served.
async fn handle_connection<C, S>(
    stream: UnixStream,
    service: Arc<TrainerService<C, S>>,
) -> Result<usize, FrameError>
where
    C: Catalog,
    S: UserStateStore + ExerciseStateRepository,
{
    let (reader, mut writer) = stream.into_split();
    let mut lines = LinesStream::new(BufReader::new(reader).lines());
    let mut served = 0;

    while let Some(line) = lines.next().await {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let response = match decode::<Request>(&line) {
            Ok(request) => service.handle(request).await,
            Err(err) => {
                tracing::debug!("Undecodable request: {err}");
                Response::error(ErrorCode::InvalidArgument, err.to_string())
            }
        };
        write_message(&mut writer, &response).await?;
        served += 1;
    }
    Ok(served)
}
