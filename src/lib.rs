//! confdb - Settings Store and Managed Connection Handles
//!
//! confdb provides a bounded key/value settings store with file persistence
//! and database connection handles built around an explicit status state
//! machine.
//!
//! # Module Organization
//! - [`error`] - Error types and handling
//! - [`settings`] - Bounded settings store and its file format
//! - [`engine`] - Connection parameters, status, and transport traits
//! - [`connection`] - Single-owner and thread-safe connection handles
//! - [`features`] - Process-wide feature flags
//! - [`math`] - Numeric helpers
//! - [`output`] - JSON output envelope types used by the CLI
//!
//! # Example
//! ```
//! use confdb::{ConfigParams, DatabaseConnection, SettingsManager};
//!
//! let mut settings = SettingsManager::new("myapp");
//! settings.set_setting("theme", "dark").unwrap();
//! assert_eq!(settings.get_setting("theme"), "dark");
//!
//! let mut conn = DatabaseConnection::new();
//! conn.connect(&ConfigParams::new(":memory:", 1)).unwrap();
//! let result = conn.execute_query("SELECT 1 AS one").unwrap();
//! assert_eq!(result.rows.len(), 1);
//! conn.disconnect();
//! assert!(!conn.is_connected());
//! ```

pub mod connection;
pub mod engine;
pub mod error;
pub mod features;
pub mod math;
pub mod output;
pub mod settings;

// Re-export commonly used types for convenience
pub use connection::{
    create_db_connection, ConnectionHandle, DatabaseConnection, SharedConnection,
    ThreadSafeDbConnection,
};
pub use engine::{ConfigParams, ConnectionStatus, Driver, QueryResult, Session};
pub use error::{ConfdbError, Result};
pub use features::is_feature_enabled;
pub use output::{ErrorEnvelope, ErrorInfo, Metadata, SuccessEnvelope};
pub use settings::{ConfigStore, SettingsManager, MAX_SETTINGS};

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
