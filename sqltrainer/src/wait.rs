//! Waiting for the server socket to accept connections.

use std::path::Path;
use std::time::Duration;

use tokio::net::UnixStream;
use tokio::time::Instant;

#[derive(Debug, thiserror::Error)]
pub enum WaitError {
    #[error("timeout waiting for socket {0} after {1:?}")]
    Timeout(String, Duration),

    #[error("failed to connect to socket {0}: {1}")]
    Connect(String, #[source] std::io::Error),
}

/// Poll `socket_path` until a connection succeeds or `timeout` expires.
///
/// Returns [`WaitError::Connect`] when the socket file exists but refused
/// every attempt, [`WaitError::Timeout`] when it never appeared.
pub async fn wait_for_socket(
    socket_path: impl AsRef<Path>,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<(), WaitError> {
    let socket_path = socket_path.as_ref();
    let label = socket_path.display().to_string();
    let deadline = Instant::now() + timeout;
    let mut last_err: Option<std::io::Error> = None;

    loop {
        if socket_path.exists() {
            match UnixStream::connect(socket_path).await {
                Ok(_) => return Ok(()),
                Err(err) => {
                    tracing::debug!("Socket {label} not ready: {err}");
                    last_err = Some(err);
                }
            }
        } else {
            last_err = None;
        }

        if Instant::now() >= deadline {
            return Err(match last_err {
                Some(err) => WaitError::Connect(label, err),
                None => WaitError::Timeout(label, timeout),
            });
        }
        tokio::time::sleep(poll_interval).await;
    }
}
