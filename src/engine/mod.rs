//! Connection Parameters and Transport Traits
//!
//! This module defines the value types shared by every connection handle and
//! the seam between a handle and the transport that actually runs queries.
//!
//! # Drivers and Sessions
//! A [`Driver`] turns [`ConfigParams`] into an open [`Session`]. A session runs
//! queries synchronously until it is dropped. The handles in
//! [`crate::connection`] own at most one session at a time.
//!
//! The bundled driver is [`sqlite::SqliteDriver`].

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{ConfdbError, Result};

pub mod sqlite;

/// Default connection timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Parameters needed to open a connection
///
/// `password` is sensitive: it is never logged, never part of the connection
/// string, and never included in error messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigParams {
    /// Hostname (for SQLite: database file path or `:memory:`)
    pub host: String,

    /// Port number
    pub port: u16,

    /// Username
    #[serde(default)]
    pub username: String,

    /// Password
    /// WARNING: Sensitive data, do not log or include in error messages
    #[serde(default, skip_serializing)]
    pub password: String,

    /// Timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

const fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for ConfigParams {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 0,
            username: String::new(),
            password: String::new(),
            timeout: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ConfigParams {
    /// Create params for `host:port` with no credentials and the default timeout
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port, ..Default::default() }
    }

    /// Set username and password
    #[must_use]
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Set the timeout in seconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout: u64) -> Self {
        self.timeout = timeout;
        self
    }

    /// Timeout as a `Duration`
    #[must_use]
    pub const fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Check the full set of field constraints
    ///
    /// - `host` must not be blank
    /// - `port` must be in 1..=65535
    /// - `timeout` must be positive
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(ConfdbError::invalid_argument("host must not be empty"));
        }
        if self.port == 0 {
            return Err(ConfdbError::invalid_argument("port must be in range 1-65535"));
        }
        if self.timeout == 0 {
            return Err(ConfdbError::invalid_argument("timeout must be greater than zero"));
        }
        Ok(())
    }
}

/// Connection status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// No session is open
    #[default]
    Disconnected,
    /// A session is being opened
    Connecting,
    /// A session is open and queries may run
    Connected,
}

impl ConnectionStatus {
    /// Get the status name as a string
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Query execution result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Column names in result set
    pub columns: Vec<String>,

    /// Result rows in the order returned, one value per column
    pub rows: Vec<Vec<serde_json::Value>>,

    /// Number of rows affected (statements without a result set)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_affected: Option<u64>,
}

impl QueryResult {
    /// Value at `column` in `row`, if both exist
    #[must_use]
    pub fn value(&self, row: usize, column: &str) -> Option<&serde_json::Value> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }
}

/// Opens sessions from connection parameters
pub trait Driver: Send + Sync {
    /// Scheme used in connection strings (e.g. `sqlite`)
    fn name(&self) -> &'static str;

    /// Open a session
    ///
    /// Errors should be [`ConfdbError::ConnectionFailed`].
    fn open(&self, params: &ConfigParams) -> Result<Box<dyn Session>>;
}

/// An open transport session
///
/// Dropping the session closes it.
pub trait Session: Send {
    /// Execute a single statement and collect its result
    fn execute(&mut self, query: &str) -> Result<QueryResult>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_params_defaults() {
        let params = ConfigParams::default();
        assert_eq!(params.timeout, 30);
        assert!(params.host.is_empty());
        assert_eq!(params.timeout_duration(), Duration::from_secs(30));
    }

    #[test]
    fn test_config_params_builders() {
        let params = ConfigParams::new("db.internal", 5432)
            .with_credentials("app", "hunter2")
            .with_timeout(5);
        assert_eq!(params.host, "db.internal");
        assert_eq!(params.port, 5432);
        assert_eq!(params.username, "app");
        assert_eq!(params.password, "hunter2");
        assert_eq!(params.timeout, 5);
    }

    #[test]
    fn test_config_params_validate() {
        assert!(ConfigParams::new("localhost", 1).validate().is_ok());
        assert!(ConfigParams::new("localhost", 65535).validate().is_ok());

        let err = ConfigParams::new("  ", 80).validate().unwrap_err();
        assert!(err.message().contains("host"));

        let err = ConfigParams::new("localhost", 0).validate().unwrap_err();
        assert!(err.message().contains("port"));

        let err = ConfigParams::new("localhost", 80).with_timeout(0).validate().unwrap_err();
        assert!(err.message().contains("timeout"));
    }

    #[test]
    fn test_password_not_serialized() {
        let params = ConfigParams::new("localhost", 5432).with_credentials("app", "hunter2");
        let json = serde_json::to_string(&params).unwrap();
        assert!(!json.contains("hunter2"));
        assert!(json.contains(r#""username":"app""#));
    }

    #[test]
    fn test_config_params_deserialize_default_timeout() {
        let params: ConfigParams =
            serde_json::from_str(r#"{"host": "localhost", "port": 5432}"#).unwrap();
        assert_eq!(params.timeout, DEFAULT_TIMEOUT_SECS);
        assert!(params.username.is_empty());
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(serde_json::to_string(&ConnectionStatus::Disconnected).unwrap(), r#""disconnected""#);
        assert_eq!(serde_json::to_string(&ConnectionStatus::Connecting).unwrap(), r#""connecting""#);
        assert_eq!(serde_json::to_string(&ConnectionStatus::Connected).unwrap(), r#""connected""#);
        assert_eq!(ConnectionStatus::default(), ConnectionStatus::Disconnected);
    }

    #[test]
    fn test_query_result_value_lookup() {
        let result = QueryResult {
            columns: vec!["id".to_string(), "name".to_string()],
            rows: vec![vec![serde_json::json!(1), serde_json::json!("Alice")]],
            rows_affected: None,
        };
        assert_eq!(result.value(0, "name"), Some(&serde_json::json!("Alice")));
        assert_eq!(result.value(0, "missing"), None);
        assert_eq!(result.value(1, "id"), None);
    }
}
