//! Error Handling Infrastructure
//!
//! This module defines all error types used throughout confdb.
//! All errors are structured and map to specific error codes for JSON output.
//!
//! # Error Categories
//! - `ConfigLoad` / `ConfigSave`: Settings file could not be read, parsed or written
//! - `CapacityExceeded`: Settings store is full
//! - `ConnectionFailed`: Connection could not be established
//! - `NotConnected` / `AlreadyConnected` / `AlreadyConnecting`: Operation invalid for the current status
//! - `QueryFailed`: Query execution errors
//! - `InvalidArgument`: Malformed input or violated precondition
//!
//! None of these are fatal: every operation reports them to the caller and
//! leaves the receiving object usable.

use thiserror::Error;

/// Main error type for confdb operations
#[derive(Error, Debug)]
pub enum ConfdbError {
    /// Settings file missing, unreadable or malformed
    #[error("Failed to load configuration: {0}")]
    ConfigLoad(String),

    /// Settings file could not be written
    #[error("Failed to save configuration: {0}")]
    ConfigSave(String),

    /// Inserting a new key would exceed the store capacity
    #[error("Capacity exceeded: at most {capacity} settings may be stored")]
    CapacityExceeded { capacity: usize },

    /// Connection could not be established
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Operation requires an established connection
    #[error("Not connected: the connection must be established first")]
    NotConnected,

    /// Connect was called on an established connection
    #[error("Already connected: disconnect before connecting again")]
    AlreadyConnected,

    /// Connect was called while another connect is in progress
    #[error("Already connecting: a connection attempt is in progress")]
    AlreadyConnecting,

    /// Query execution failed
    #[error("Query execution failed: {0}")]
    QueryFailed(String),

    /// Invalid input or violated precondition
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl ConfdbError {
    /// Convert error to error code string for JSON output
    ///
    /// Error codes are stable and suitable for programmatic handling.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::ConfigLoad(_) => "CONFIG_LOAD_ERROR",
            Self::ConfigSave(_) => "CONFIG_SAVE_ERROR",
            Self::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            Self::ConnectionFailed(_) => "CONNECTION_FAILED",
            Self::NotConnected => "NOT_CONNECTED",
            Self::AlreadyConnected => "ALREADY_CONNECTED",
            Self::AlreadyConnecting => "ALREADY_CONNECTING",
            Self::QueryFailed(_) => "QUERY_FAILED",
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
        }
    }

    /// Get human-readable error message (no credentials)
    #[must_use]
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Create a configuration load error
    pub fn config_load(message: impl Into<String>) -> Self {
        Self::ConfigLoad(message.into())
    }

    /// Create a configuration save error
    pub fn config_save(message: impl Into<String>) -> Self {
        Self::ConfigSave(message.into())
    }

    /// Create a capacity error for a store holding at most `capacity` entries
    pub const fn capacity_exceeded(capacity: usize) -> Self {
        Self::CapacityExceeded { capacity }
    }

    /// Create a connection failed error
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::ConnectionFailed(message.into())
    }

    /// Create a query failed error
    pub fn query_failed(message: impl Into<String>) -> Self {
        Self::QueryFailed(message.into())
    }

    /// Create an invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

/// Result type alias for confdb operations
pub type Result<T> = std::result::Result<T, ConfdbError>;
