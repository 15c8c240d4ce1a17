//! Configuration for the SQL trainer server.
//!
//! Every value has a compiled-in default and can be overridden through a
//! dedicated environment variable. Unparseable numbers fall back to the
//! default.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use grader::{ConnectionPolicy, PgPoolConfig, RegistryConfig};
use tokio_postgres::Config;

const DEFAULT_CONFIG_DIR: &str = ".config/sqltrainer/data";
const DEV_DATA_DIR: &str = "./data";
const DEFAULT_SOCKET_PATH: &str = "/tmp/sqltrainer.sock";
const DEFAULT_PG_STUD_URL: &str = "host=localhost user=postgres";
const DEFAULT_PG_TEST_URL: &str = "host=localhost user=postgres dbname=sqltrainer_test";
const DEFAULT_POOL_MAX: usize = 3;
const DEFAULT_POOL_TIMEOUT_SECS: u64 = 5;
const DEFAULT_REAP_INTERVAL_SECS: u64 = 10;
const DEFAULT_POOL_STALE_SECS: u64 = 1200;

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(value) => value.trim().parse().unwrap_or(default),
        Err(_) => default,
    }
}

/// Get the data directory holding `sqltrainer.db`.
///
/// Priority:
/// 1. SQLTRAINER_DATA_DIR env variable if set
/// 2. $HOME/.config/sqltrainer/data if HOME is set
/// 3. ./data as fallback
pub fn get_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("SQLTRAINER_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(DEFAULT_CONFIG_DIR);
    }

    PathBuf::from(DEV_DATA_DIR)
}

/// Get the root that relative datamodel script paths are resolved against.
///
/// Priority:
/// 1. SQLTRAINER_MEDIA_ROOT env variable if set
/// 2. `<data dir>/media`
pub fn get_media_root() -> PathBuf {
    if let Ok(dir) = std::env::var("SQLTRAINER_MEDIA_ROOT") {
        return PathBuf::from(dir);
    }

    get_data_dir().join("media")
}

/// Get the socket path of the request loop.
///
/// Priority:
/// 1. SQLTRAINER_SOCKET_PATH env variable if set
/// 2. `/tmp/sqltrainer.sock` as fallback
pub fn get_socket_path() -> PathBuf {
    if let Ok(path) = std::env::var("SQLTRAINER_SOCKET_PATH") {
        return PathBuf::from(path);
    }

    PathBuf::from(DEFAULT_SOCKET_PATH)
}

/// Get the log directory. `None` logs to stderr.
pub fn get_log_dir() -> Option<PathBuf> {
    std::env::var("SQLTRAINER_LOG_DIR").ok().map(PathBuf::from)
}

/// Whether the server runs in production mode, with one database and login
/// per student.
pub fn is_deploy() -> bool {
    parse_flag(std::env::var("SQLTRAINER_DEPLOY").ok().as_deref())
}

fn parse_flag(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("1" | "true" | "yes" | "on")
    )
}

/// Build the connection policy for student databases.
///
/// In production mode the base config comes from SQLTRAINER_PG_STUD_URL and
/// its user and database are replaced per student; otherwise every student
/// shares SQLTRAINER_PG_TEST_URL.
pub fn get_connection_policy() -> Result<ConnectionPolicy, tokio_postgres::Error> {
    if is_deploy() {
        let url = std::env::var("SQLTRAINER_PG_STUD_URL")
            .unwrap_or_else(|_| DEFAULT_PG_STUD_URL.to_string());
        Ok(ConnectionPolicy::PerStudent(Config::from_str(&url)?))
    } else {
        let url = std::env::var("SQLTRAINER_PG_TEST_URL")
            .unwrap_or_else(|_| DEFAULT_PG_TEST_URL.to_string());
        Ok(ConnectionPolicy::Shared(Config::from_str(&url)?))
    }
}

pub fn get_pool_config() -> PgPoolConfig {
    PgPoolConfig {
        connect_timeout: Duration::from_secs(env_or(
            "SQLTRAINER_POOL_TIMEOUT_SECS",
            DEFAULT_POOL_TIMEOUT_SECS,
        )),
        statement_timeout: std::env::var("SQLTRAINER_STATEMENT_TIMEOUT_MS")
            .ok()
            .and_then(|ms| ms.trim().parse().ok())
            .map(Duration::from_millis),
    }
}

pub fn get_registry_config() -> RegistryConfig {
    RegistryConfig {
        max_conns: env_or("SQLTRAINER_POOL_MAX", DEFAULT_POOL_MAX).max(1),
        acquire_timeout: Duration::from_secs(env_or(
            "SQLTRAINER_POOL_TIMEOUT_SECS",
            DEFAULT_POOL_TIMEOUT_SECS,
        )),
        reap_interval: Duration::from_secs(env_or(
            "SQLTRAINER_REAP_INTERVAL_SECS",
            DEFAULT_REAP_INTERVAL_SECS,
        )),
        stale_after: Duration::from_secs(env_or(
            "SQLTRAINER_POOL_STALE_SECS",
            DEFAULT_POOL_STALE_SECS,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_data_dir_fallback() {
        let dir = get_data_dir();
        assert!(!dir.as_os_str().is_empty());
    }

    #[test]
    fn test_get_socket_path() {
        let path = get_socket_path();
        match std::env::var("SQLTRAINER_SOCKET_PATH") {
            Ok(val) => assert_eq!(path, PathBuf::from(val)),
            Err(_) => assert_eq!(path, PathBuf::from(DEFAULT_SOCKET_PATH)),
        }
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag(Some("1")));
        assert!(parse_flag(Some(" TRUE ")));
        assert!(!parse_flag(Some("0")));
        assert!(!parse_flag(Some("")));
        assert!(!parse_flag(None));
    }

    #[test]
    fn test_env_or_falls_back_on_garbage() {
        assert_eq!(env_or("SQLTRAINER_TEST_UNSET_VARIABLE", 7u64), 7);
    }

    #[test]
    fn test_default_urls_parse() {
        assert!(Config::from_str(DEFAULT_PG_STUD_URL).is_ok());
        let test = Config::from_str(DEFAULT_PG_TEST_URL).unwrap();
        assert_eq!(test.get_dbname(), Some("sqltrainer_test"));
    }

    #[test]
    fn test_registry_owns_pool_bound() {
        let registry = get_registry_config();
        let pool = get_pool_config();
        assert!(registry.max_conns >= 1);
        assert_eq!(registry.acquire_timeout, pool.connect_timeout);
    }
}
