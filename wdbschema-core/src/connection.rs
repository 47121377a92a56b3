//! SQL Server connection management.
//!
//! Wraps a single tiberius TDS session. The connection is exclusively owned
//! by the pipeline run: it is opened once, used sequentially for catalog
//! queries, and closed when dropped on any exit path. Connection attempts
//! are never retried.

use std::time::Duration;

use tiberius::{AuthMethod, Client, Config, SqlBrowser};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use crate::error::{Result, SchemaScriptError};

/// How the server is addressed: a fixed TCP port or a named instance
/// resolved through the SQL Browser service. Exactly one applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerAddr {
    Port(u16),
    Instance(String),
}

/// Credential mode for the session.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// OS-level identity (Windows integrated authentication).
    Trusted,
    /// SQL Server authentication with username and password.
    Basic { username: String, password: String },
}

// Manual Debug keeps the password out of logs and error output.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Trusted => write!(f, "Trusted"),
            Credentials::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"****")
                .finish(),
        }
    }
}

/// Configuration for a server connection.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub host: String,
    pub addr: ServerAddr,
    pub database: String,
    pub credentials: Credentials,
    pub connect_timeout: Duration,
}

impl ConnectionConfig {
    pub fn new(host: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            addr: ServerAddr::Port(1433),
            database: database.into(),
            credentials: Credentials::Trusted,
            connect_timeout: Duration::from_secs(30),
        }
    }

    #[must_use]
    pub fn with_addr(mut self, addr: ServerAddr) -> Self {
        self.addr = addr;
        self
    }

    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Validates the configuration before any network activity.
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(SchemaScriptError::configuration("server host is required"));
        }
        if self.database.is_empty() {
            return Err(SchemaScriptError::configuration(
                "database name is required",
            ));
        }
        match &self.addr {
            ServerAddr::Port(0) => Err(SchemaScriptError::configuration(
                "port must be greater than 0",
            )),
            ServerAddr::Instance(name) if name.is_empty() => Err(
                SchemaScriptError::configuration("instance name must not be empty"),
            ),
            _ => Ok(()),
        }
    }
}

/// An open, authenticated session against one SQL Server database.
pub struct SqlServerConnection {
    client: Client<Compat<TcpStream>>,
}

impl SqlServerConnection {
    /// Opens a session. Fails with a `Connection` error on unreachable host,
    /// rejected credentials, unknown database, or connect timeout.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        config.validate()?;

        let mut tds_config = Config::new();
        tds_config.host(&config.host);
        tds_config.database(&config.database);
        tds_config.trust_cert();

        match &config.addr {
            ServerAddr::Port(port) => tds_config.port(*port),
            ServerAddr::Instance(name) => tds_config.instance_name(name),
        }

        match &config.credentials {
            Credentials::Basic { username, password } => {
                tds_config.authentication(AuthMethod::sql_server(username, password));
            }
            Credentials::Trusted => {
                #[cfg(windows)]
                tds_config.authentication(AuthMethod::Integrated);
                #[cfg(not(windows))]
                return Err(SchemaScriptError::configuration(
                    "trusted authentication is only available on Windows builds; \
                     supply --user and --password instead",
                ));
            }
        }

        tracing::debug!(
            host = %config.host,
            database = %config.database,
            "opening TDS session"
        );

        let tcp = match &config.addr {
            ServerAddr::Port(_) => tokio::time::timeout(
                config.connect_timeout,
                TcpStream::connect(tds_config.get_addr()),
            )
            .await
            .map_err(|_| {
                SchemaScriptError::connection_context(format!(
                    "connect to {} timed out after {:?}",
                    config.host, config.connect_timeout
                ))
            })?
            .map_err(|e| {
                SchemaScriptError::connection_failed(
                    format!("cannot reach server '{}'", config.host),
                    e,
                )
            })?,
            ServerAddr::Instance(name) => {
                // SQL Browser round-trip resolves the instance port first.
                tokio::time::timeout(
                    config.connect_timeout,
                    TcpStream::connect_named(&tds_config),
                )
                .await
                .map_err(|_| {
                    SchemaScriptError::connection_context(format!(
                        "resolve instance '{}' on {} timed out after {:?}",
                        name, config.host, config.connect_timeout
                    ))
                })?
                .map_err(|e| {
                    SchemaScriptError::connection_failed(
                        format!("cannot reach instance '{}' on '{}'", name, config.host),
                        e,
                    )
                })?
            }
        };

        tcp.set_nodelay(true).map_err(|e| {
            SchemaScriptError::connection_failed("failed to configure TCP session", e)
        })?;

        let client = Client::connect(tds_config, tcp.compat_write())
            .await
            .map_err(|e| {
                SchemaScriptError::connection_failed(
                    format!(
                        "handshake with '{}' failed (check credentials and database name)",
                        config.host
                    ),
                    e,
                )
            })?;

        tracing::info!(host = %config.host, database = %config.database, "session established");
        Ok(Self { client })
    }

    /// Runs a parameterless metadata query and collects the first result set.
    pub async fn simple_query(&mut self, sql: &str) -> Result<Vec<tiberius::Row>> {
        self.client
            .simple_query(sql)
            .await
            .map_err(|e| SchemaScriptError::connection_failed("metadata query failed", e))?
            .into_first_result()
            .await
            .map_err(|e| SchemaScriptError::connection_failed("metadata query failed", e))
    }

    /// Runs a parameterized metadata query and collects the first result set.
    pub async fn query(
        &mut self,
        sql: &str,
        params: &[&dyn tiberius::ToSql],
    ) -> Result<Vec<tiberius::Row>> {
        self.client
            .query(sql, params)
            .await
            .map_err(|e| SchemaScriptError::connection_failed("metadata query failed", e))?
            .into_first_result()
            .await
            .map_err(|e| SchemaScriptError::connection_failed("metadata query failed", e))
    }
}
