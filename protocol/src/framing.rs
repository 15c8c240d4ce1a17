//! Newline-delimited JSON framing.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),
}

/// Encode `message` as one line, without the trailing newline.
pub fn encode<T: Serialize>(message: &T) -> Result<String, FrameError> {
    Ok(serde_json::to_string(message)?)
}

pub fn decode<T: DeserializeOwned>(line: &str) -> Result<T, FrameError> {
    Ok(serde_json::from_str(line.trim())?)
}

pub async fn write_message<W, T>(writer: &mut W, message: &T) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut line = serde_json::to_vec(message)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await?;
    Ok(())
}

/// Read the next message, skipping blank lines. `None` at end of stream.
pub async fn read_message<R, T>(reader: &mut R) -> Result<Option<T>, FrameError>
where
    R: AsyncBufRead + Unpin,
    T: DeserializeOwned,
{
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        if !line.trim().is_empty() {
            return decode(&line).map(Some);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ExerciseRequest, Request, Response};
    use tokio::io::BufReader;

    #[tokio::test]
    async fn messages_travel_one_per_line() {
        let (mut client_write, server) = tokio::io::duplex(1024);
        let mut server_read = BufReader::new(server);

        let reset = Request::ResetDb(ExerciseRequest {
            student: "mitro".into(),
            topic_short: "pc".into(),
            enumber: 2,
        });
        write_message(&mut client_write, &reset).await.unwrap();
        write_message(&mut client_write, &Request::Ping).await.unwrap();
        drop(client_write);

        let first: Option<Request> = read_message(&mut server_read).await.unwrap();
        let second: Option<Request> = read_message(&mut server_read).await.unwrap();
        assert_eq!(first, Some(reset));
        assert_eq!(second, Some(Request::Ping));
    }

    #[tokio::test]
    async fn end_of_stream_is_none() {
        let mut reader = BufReader::new(&b"\n  \n"[..]);
        let message: Option<Response> = read_message(&mut reader).await.unwrap();
        assert!(message.is_none());
    }

    #[test]
    fn encoded_messages_have_no_newlines() {
        let line = encode(&Response::Message {
            message: "line one\nline two".into(),
        })
        .unwrap();
        assert!(!line.contains('\n'));
        let back: Response = decode(&line).unwrap();
        assert!(matches!(back, Response::Message { ref message } if message.contains('\n')));
    }

    #[test]
    fn garbage_is_a_json_error() {
        assert!(matches!(decode::<Request>("{not json"), Err(FrameError::Json(_))));
    }
}
