//! Report database connections.
//!
//! A [`ReportConnection`] is a single MySQL session owned by one report run.
//! It is released by [`ReportConnection::close`] on the normal path and by
//! `Drop` on every other path.

use std::time::{Duration, Instant};

use common::errors::{ConnectionError, QueryError, ReportError};
use common::models::connection::ConnectionConfig;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlDatabaseError};
use sqlx::{ConnectOptions, Connection, Executor};
use tracing::{debug, info, warn};

/// MySQL error numbers that mean the session is gone.
const ER_SERVER_SHUTDOWN: u16 = 1053;
const ER_QUERY_INTERRUPTED: u16 = 1317;
const ER_CONNECTION_KILLED: u16 = 1927;
const CR_SERVER_GONE_ERROR: u16 = 2006;
const CR_SERVER_LOST: u16 = 2013;

/// MySQL error numbers for rejected credentials or schema access.
const ER_DBACCESS_DENIED_ERROR: u16 = 1044;
const ER_ACCESS_DENIED_ERROR: u16 = 1045;
const ER_ACCESS_DENIED_NO_PASSWORD_ERROR: u16 = 1698;
const ER_BAD_DB_ERROR: u16 = 1049;

/// MySQL syntax error.
const ER_PARSE_ERROR: u16 = 1064;

/// A live connection to the report database.
pub struct ReportConnection {
    inner: MySqlConnection,
    config: ConnectionConfig,
    connection_id: u64,
}

impl std::fmt::Debug for ReportConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportConnection")
            .field("target", &self.config.target())
            .field("connection_id", &self.connection_id)
            .finish()
    }
}

/// Opens a connection described by `config`.
///
/// The config is validated first; `connect_timeout_secs`, when set, bounds
/// the whole handshake.
pub async fn connect(config: &ConnectionConfig) -> Result<ReportConnection, ConnectionError> {
    config.ensure_valid()?;
    let target = config.target();

    let options = MySqlConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.username)
        .password(&config.password)
        .database(&config.database);

    let attempt = options.connect();
    let connected = match config.connect_timeout_secs {
        Some(secs) => tokio::time::timeout(Duration::from_secs(secs), attempt)
            .await
            .map_err(|_| ConnectionError::Timeout {
                target: target.clone(),
                secs,
            })?,
        None => attempt.await,
    };
    let mut inner = connected.map_err(|e| classify_connect_error(&target, e))?;

    let (connection_id,): (u64,) = sqlx::query_as("SELECT CONNECTION_ID()")
        .fetch_one(&mut inner)
        .await
        .map_err(|e| classify_connect_error(&target, e))?;

    info!(target = %target, connection_id, "connected to report database");
    Ok(ReportConnection {
        inner,
        config: config.clone(),
        connection_id,
    })
}

impl ReportConnection {
    /// Server-side session id.
    pub fn connection_id(&self) -> u64 {
        self.connection_id
    }

    /// Handle that can terminate this session from elsewhere.
    pub fn kill_handle(&self) -> KillHandle {
        KillHandle {
            config: self.config.clone(),
            connection_id: self.connection_id,
        }
    }

    /// Round-trips `SELECT 1` and returns the latency.
    pub async fn ping(&mut self) -> Result<Duration, ReportError> {
        let start = Instant::now();
        sqlx::query("SELECT 1")
            .execute(&mut self.inner)
            .await
            .map_err(classify_query_error)?;
        Ok(start.elapsed())
    }

    /// Closes the session gracefully. Errors are logged, not returned: the
    /// socket is gone either way.
    pub async fn close(self) {
        let connection_id = self.connection_id;
        match self.inner.close().await {
            Ok(()) => debug!(connection_id, "connection closed"),
            Err(e) => warn!(connection_id, error = %e, "connection closed with error"),
        }
    }

    pub(crate) fn raw(&mut self) -> &mut MySqlConnection {
        &mut self.inner
    }
}

/// Terminates a report connection from a separate session.
///
/// Operations running on the killed connection fail with
/// [`ConnectionError::Lost`].
#[derive(Clone)]
pub struct KillHandle {
    config: ConnectionConfig,
    connection_id: u64,
}

impl KillHandle {
    pub fn connection_id(&self) -> u64 {
        self.connection_id
    }

    /// Issues `KILL CONNECTION` for the target session.
    pub async fn kill(&self) -> Result<(), ReportError> {
        let mut side = connect(&self.config).await?;
        let sql = format!("KILL CONNECTION {}", self.connection_id);
        let result = side.raw().execute(sql.as_str()).await;
        side.close().await;
        result.map_err(classify_query_error)?;
        info!(connection_id = self.connection_id, "report connection killed");
        Ok(())
    }
}

fn mysql_error_number(e: &sqlx::Error) -> Option<u16> {
    match e {
        sqlx::Error::Database(db) => db
            .try_downcast_ref::<MySqlDatabaseError>()
            .map(|e| e.number()),
        _ => None,
    }
}

/// Maps a failure during connection setup.
pub(crate) fn classify_connect_error(target: &str, e: sqlx::Error) -> ConnectionError {
    match mysql_error_number(&e) {
        Some(ER_ACCESS_DENIED_ERROR)
        | Some(ER_DBACCESS_DENIED_ERROR)
        | Some(ER_ACCESS_DENIED_NO_PASSWORD_ERROR) => ConnectionError::Authentication {
            target: target.to_string(),
            message: e.to_string(),
        },
        Some(ER_BAD_DB_ERROR) => ConnectionError::InvalidConfig(e.to_string()),
        _ => ConnectionError::Unreachable {
            target: target.to_string(),
            message: e.to_string(),
        },
    }
}

/// Maps a failure on an established connection.
///
/// Transport failures and killed sessions become [`ConnectionError::Lost`];
/// everything the server reports about the statement is a [`QueryError`].
pub(crate) fn classify_query_error(e: sqlx::Error) -> ReportError {
    if let Some(number) = mysql_error_number(&e) {
        return match number {
            ER_SERVER_SHUTDOWN
            | ER_QUERY_INTERRUPTED
            | ER_CONNECTION_KILLED
            | CR_SERVER_GONE_ERROR
            | CR_SERVER_LOST => ConnectionError::Lost(e.to_string()).into(),
            ER_PARSE_ERROR => QueryError::Syntax(e.to_string()).into(),
            _ => QueryError::Server {
                code: number.to_string(),
                message: e.to_string(),
            }
            .into(),
        };
    }

    match e {
        sqlx::Error::Io(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::PoolClosed => ConnectionError::Lost(e.to_string()).into(),
        sqlx::Error::ColumnDecode { index, source } => QueryError::Decode {
            column: index,
            data_type: String::from("unknown"),
            message: source.to_string(),
        }
        .into(),
        other => QueryError::Server {
            code: String::from("CLIENT"),
            message: other.to_string(),
        }
        .into(),
    }
}
