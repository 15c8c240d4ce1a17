//! Error types for the trainer client

use sqltrainer_protocol::{ErrorCode, FrameError};
use thiserror::Error;

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] FrameError),

    #[error("Server closed the connection")]
    Disconnected,

    #[error("Server rejected request ({code:?}): {message}")]
    Server { code: ErrorCode, message: String },

    #[error("Server returned unexpected response to {0}")]
    UnexpectedResponse(&'static str),
}

impl ClientError {
    /// Whether retrying later may succeed.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            ClientError::Server {
                code: ErrorCode::Unavailable,
                ..
            }
        )
    }
}
