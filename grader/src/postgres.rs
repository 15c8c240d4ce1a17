//! Connections to the students' PostgreSQL databases.

use std::time::Duration;

use tokio_postgres::config::Host;
use tokio_postgres::{Client, Config, NoTls};

use crate::registry::Connector;

/// Tunables for each connection in a student's pool. The pool bound itself
/// is [`crate::RegistryConfig::max_conns`].
#[derive(Clone, Debug)]
pub struct PgPoolConfig {
    /// Bound on establishing a connection and on waiting for a free one.
    pub connect_timeout: Duration,
    /// Applied as the session `statement_timeout` when set.
    pub statement_timeout: Option<Duration>,
}

impl Default for PgPoolConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            statement_timeout: None,
        }
    }
}

/// Where a student's connections go.
#[derive(Clone, Debug)]
pub enum ConnectionPolicy {
    /// Production: one database and login per student, both named after the
    /// student identity. The base config supplies host, port and password.
    PerStudent(Config),
    /// Development and tests: every student shares one database.
    Shared(Config),
}

impl ConnectionPolicy {
    pub fn config_for(&self, identity: &str) -> Config {
        match self {
            ConnectionPolicy::PerStudent(base) => {
                let mut config = base.clone();
                config.user(identity).dbname(identity);
                config
            }
            ConnectionPolicy::Shared(config) => config.clone(),
        }
    }

    /// Host list for error messages shown to students.
    pub fn host_label(&self) -> String {
        let config = match self {
            ConnectionPolicy::PerStudent(config) | ConnectionPolicy::Shared(config) => config,
        };
        let hosts: Vec<String> = config
            .get_hosts()
            .iter()
            .map(|host| match host {
                Host::Tcp(name) => name.clone(),
                #[cfg(unix)]
                Host::Unix(path) => path.display().to_string(),
            })
            .collect();
        if hosts.is_empty() {
            "localhost".to_string()
        } else {
            hosts.join(",")
        }
    }
}

/// One live session in a student's database.
///
/// Not bound to a topic: callers set the search path before every statement.
pub struct StudentConn {
    client: Client,
}

impl StudentConn {
    async fn connect(mut config: Config, options: &PgPoolConfig) -> Result<Self, tokio_postgres::Error> {
        config.connect_timeout(options.connect_timeout);
        if let Some(timeout) = options.statement_timeout {
            config.options(&format!("-c statement_timeout={}", timeout.as_millis()));
        }
        let (client, connection) = config.connect(NoTls).await?;
        tokio::spawn(async move {
            if let Err(err) = connection.await {
                tracing::warn!("Postgres connection error: {err}");
            }
        });
        Ok(Self { client })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut Client {
        &mut self.client
    }

    pub fn is_closed(&self) -> bool {
        self.client.is_closed()
    }
}

/// Opens [`StudentConn`]s according to a [`ConnectionPolicy`].
pub struct PgConnector {
    policy: ConnectionPolicy,
    options: PgPoolConfig,
}

impl PgConnector {
    pub fn new(policy: ConnectionPolicy, options: PgPoolConfig) -> Self {
        Self { policy, options }
    }

    pub fn policy(&self) -> &ConnectionPolicy {
        &self.policy
    }
}

impl Connector for PgConnector {
    type Conn = StudentConn;

    async fn connect(&self, identity: &str) -> Result<StudentConn, String> {
        let config = self.policy.config_for(identity);
        StudentConn::connect(config, &self.options)
            .await
            .map_err(|err| format!("cannot connect to {}: {err}", self.policy.host_label()))
    }

    fn is_healthy(conn: &StudentConn) -> bool {
        !conn.is_closed()
    }
}
