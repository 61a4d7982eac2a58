//! Application configuration.
//!
//! Every value is read from the process environment. A `.env` file in the
//! working directory, when present, seeds variables that are not already set.

use std::path::PathBuf;
use std::str::FromStr;

use crate::models::connection::ConnectionConfig;

/// Default chart canvas width in pixels.
pub const DEFAULT_CHART_WIDTH: u32 = 1280;
/// Default chart canvas height in pixels.
pub const DEFAULT_CHART_HEIGHT: u32 = 720;

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" | "plain" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format: {}", other)),
        }
    }
}

/// Configuration shared by every binary in the workspace.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Name used in logs and API response metadata.
    pub service_name: String,
    /// Bind address for HTTP services.
    pub host: String,
    /// Bind port for HTTP services.
    pub port: u16,
    /// Directory where rendered artifacts are stored.
    pub output_dir: PathBuf,
    /// Chart canvas width in pixels.
    pub chart_width: u32,
    /// Chart canvas height in pixels.
    pub chart_height: u32,
    /// Log line format.
    pub log_format: LogFormat,
    /// Report data source.
    pub database: ConnectionConfig,
}

impl AppConfig {
    /// Loads configuration for the named service from the environment.
    pub fn load_with_service(service_name: &str) -> Self {
        load_dotenv();
        Self::from_lookup(service_name, |key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary variable lookup.
    ///
    /// Unparseable values fall back to their defaults.
    pub fn from_lookup<F>(service_name: &str, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            service_name: service_name.to_string(),
            host: lookup("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&lookup, "SERVER_PORT", 8080),
            output_dir: lookup("REPORT_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./reports")),
            chart_width: parse_or(&lookup, "CHART_WIDTH", DEFAULT_CHART_WIDTH),
            chart_height: parse_or(&lookup, "CHART_HEIGHT", DEFAULT_CHART_HEIGHT),
            log_format: parse_or(&lookup, "LOG_FORMAT", LogFormat::Text),
            database: ConnectionConfig::from_lookup(&lookup),
        }
    }
}

/// Reads and parses a variable, falling back to `default` when it is
/// missing or malformed.
pub(crate) fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Loads `.env` from the working directory (best effort, no error if missing).
///
/// Variables already present in the environment win over the file.
pub fn load_dotenv() {
    if let Err(e) = dotenv::dotenv() {
        if !e.not_found() {
            eprintln!("ignoring malformed .env file: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_environment_is_empty() {
        let config = AppConfig::from_lookup("report-service", lookup_from(&[]));
        assert_eq!(config.service_name, "report-service");
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.chart_width, DEFAULT_CHART_WIDTH);
        assert_eq!(config.chart_height, DEFAULT_CHART_HEIGHT);
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(config.output_dir, PathBuf::from("./reports"));
        assert_eq!(config.database.host, "localhost");
        assert_eq!(config.database.port, 3306);
        assert_eq!(config.database.database, "pos_db");
    }

    #[test]
    fn test_values_are_read_from_lookup() {
        let config = AppConfig::from_lookup(
            "reporter",
            lookup_from(&[
                ("SERVER_PORT", "9000"),
                ("CHART_WIDTH", "800"),
                ("LOG_FORMAT", "JSON"),
                ("REPORT_OUTPUT_DIR", "/tmp/charts"),
                ("DB_HOST", "db.internal"),
                ("DB_PASSWORD", "secret"),
            ]),
        );
        assert_eq!(config.port, 9000);
        assert_eq!(config.chart_width, 800);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.output_dir, PathBuf::from("/tmp/charts"));
        assert_eq!(config.database.host, "db.internal");
        assert_eq!(config.database.password, "secret");
    }

    #[test]
    fn test_malformed_numbers_fall_back() {
        let config = AppConfig::from_lookup(
            "reporter",
            lookup_from(&[("SERVER_PORT", "eighty"), ("CHART_HEIGHT", "-1")]),
        );
        assert_eq!(config.port, 8080);
        assert_eq!(config.chart_height, DEFAULT_CHART_HEIGHT);
    }
}
