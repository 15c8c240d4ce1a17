//! Configuration for the sqltrainer command-line client.
//!
//! Every value has a compile-time default and can be overridden at runtime
//! via a dedicated environment variable.

use std::path::PathBuf;

/// Default socket path for server communication.
const DEFAULT_SOCKET_PATH: &str = "/tmp/sqltrainer.sock";

/// Default timeout for waiting on socket availability (in seconds).
const DEFAULT_SOCKET_TIMEOUT_SECS: u64 = 5;

/// Default poll interval for socket availability checks (in milliseconds).
const DEFAULT_SOCKET_POLL_INTERVAL_MS: u64 = 100;

/// Get the socket path for server communication.
///
/// Priority:
/// 1. `SQLTRAINER_SOCKET_PATH` env variable if set
/// 2. `/tmp/sqltrainer.sock` as fallback
pub fn get_socket_path() -> PathBuf {
    if let Ok(path) = std::env::var("SQLTRAINER_SOCKET_PATH") {
        return PathBuf::from(path);
    }

    PathBuf::from(DEFAULT_SOCKET_PATH)
}

/// Get the socket wait timeout in seconds.
///
/// Priority:
/// 1. `SQLTRAINER_SOCKET_TIMEOUT_SECS` env variable if set (falls back to the
///    default if the value cannot be parsed as a `u64`)
/// 2. `5` seconds as fallback
pub fn get_socket_timeout_secs() -> u64 {
    if let Ok(timeout) = std::env::var("SQLTRAINER_SOCKET_TIMEOUT_SECS") {
        return timeout.parse().unwrap_or(DEFAULT_SOCKET_TIMEOUT_SECS);
    }

    DEFAULT_SOCKET_TIMEOUT_SECS
}

/// Get the socket poll interval in milliseconds. Not overridable.
pub fn get_socket_poll_interval_ms() -> u64 {
    DEFAULT_SOCKET_POLL_INTERVAL_MS
}
