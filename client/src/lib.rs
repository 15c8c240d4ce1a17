//! SQL trainer client library
//!
//! Async client for the newline-delimited JSON protocol spoken by
//! `sqltrainer-server` on its Unix socket.
//!
//! # Example
//!
//! ```no_run
//! use sqltrainer_client::TrainerClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = TrainerClient::connect("/tmp/sqltrainer.sock").await?;
//!     let outcome = client.check_answer("mitro", "pc", 1, "SELECT * FROM photo").await?;
//!     println!("correct: {}", outcome.correct);
//!     Ok(())
//! }
//! ```

mod client;
mod error;

pub use client::TrainerClient;
pub use error::{ClientError, ClientResult};

// Re-export wire types for convenience
pub use sqltrainer_protocol::*;
