//! Connection configuration models.

use std::fmt;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::config::parse_or;
use crate::errors::ConnectionError;

/// Default MySQL port.
pub const DEFAULT_MYSQL_PORT: u16 = 3306;

/// Default connect timeout, matching the validity probe of the POS client.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Parameters for reaching the report database.
///
/// Built once at process start and treated as immutable afterwards. The
/// password is never serialized and is redacted from `Debug` output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ConnectionConfig {
    /// Database host.
    #[validate(length(min = 1, message = "host is required"))]
    pub host: String,
    /// Database port.
    #[validate(range(min = 1, message = "port must be non-zero"))]
    pub port: u16,
    /// Database username.
    #[validate(length(min = 1, message = "username is required"))]
    pub username: String,
    /// Database password.
    #[serde(skip_serializing, default)]
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
    /// Database (schema) name.
    #[validate(length(min = 1, message = "database is required"))]
    pub database: String,
    /// Connect timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_timeout_secs: Option<u64>,
    /// Per-query timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_timeout_secs: Option<u64>,
}

impl ConnectionConfig {
    /// Creates a config without timeouts.
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            password: password.into(),
            database: database.into(),
            connect_timeout_secs: None,
            query_timeout_secs: None,
        }
    }

    /// Reads `DB_*` variables from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(&|key: &str| std::env::var(key).ok())
    }

    /// Reads `DB_*` variables from an arbitrary lookup.
    pub fn from_lookup<F>(lookup: &F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            host: lookup("DB_HOST").unwrap_or_else(|| "localhost".to_string()),
            port: parse_or(lookup, "DB_PORT", DEFAULT_MYSQL_PORT),
            username: lookup("DB_USER").unwrap_or_else(|| "root".to_string()),
            password: lookup("DB_PASSWORD").unwrap_or_default(),
            database: lookup("DB_NAME").unwrap_or_else(|| "pos_db".to_string()),
            connect_timeout_secs: Some(parse_or(
                lookup,
                "DB_CONNECT_TIMEOUT_SECS",
                DEFAULT_CONNECT_TIMEOUT_SECS,
            )),
            query_timeout_secs: lookup("DB_QUERY_TIMEOUT_SECS").and_then(|v| v.trim().parse().ok()),
        }
    }

    /// Sets the connect timeout.
    pub fn with_connect_timeout(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = Some(secs);
        self
    }

    /// Sets the per-query timeout.
    pub fn with_query_timeout(mut self, secs: u64) -> Self {
        self.query_timeout_secs = Some(secs);
        self
    }

    /// Checks that every field is usable.
    pub fn ensure_valid(&self) -> Result<(), ConnectionError> {
        self.validate()
            .map_err(|e| ConnectionError::InvalidConfig(e.to_string()))
    }

    /// Credential-free description of the target, safe for logs.
    pub fn target(&self) -> String {
        format!(
            "{}@{}:{}/{}",
            self.username, self.host, self.port, self.database
        )
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("query_timeout_secs", &self.query_timeout_secs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ConnectionConfig {
        ConnectionConfig::new("localhost", 3306, "report", "s3cr3t", "pos_db")
    }

    #[test]
    fn test_complete_config_is_valid() {
        assert!(sample().ensure_valid().is_ok());
    }

    #[test]
    fn test_empty_fields_are_rejected() {
        let mut config = sample();
        config.password.clear();
        let err = config.ensure_valid().unwrap_err();
        assert!(matches!(err, ConnectionError::InvalidConfig(_)));
        assert!(err.to_string().contains("password"));

        let mut config = sample();
        config.port = 0;
        assert!(config.ensure_valid().is_err());

        let mut config = sample();
        config.host.clear();
        assert!(config.ensure_valid().is_err());
    }

    #[test]
    fn test_password_never_leaks() {
        let config = sample();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("s3cr3t"));
        assert!(debug.contains("<redacted>"));

        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("s3cr3t"));

        assert_eq!(config.target(), "report@localhost:3306/pos_db");
    }
}
