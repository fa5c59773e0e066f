//! Managed Connection Handles
//!
//! A connection handle tracks a status state machine and owns at most one
//! open [`Session`]:
//!
//! ```text
//! Disconnected --connect--> Connecting --ok--> Connected
//!      ^                        |                  |
//!      +--------- error --------+                  |
//!      +------------------ disconnect -------------+
//! ```
//!
//! Two handles are provided:
//! - [`DatabaseConnection`]: single owner, mutation through `&mut self`
//! - [`ThreadSafeDbConnection`]: shareable across threads, every transition
//!   runs under one mutex so status and connection string change together
//!
//! [`create_db_connection`] hands out a [`SharedConnection`], a reference
//! counted thread-safe handle that lives as long as its longest holder.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::engine::sqlite::SqliteDriver;
use crate::engine::{ConfigParams, ConnectionStatus, Driver, QueryResult, Session};
use crate::error::{ConfdbError, Result};

/// Connect/disconnect/query capability shared by connection handles
pub trait ConnectionHandle {
    /// Validate `params` and open a session
    fn connect(&mut self, params: &ConfigParams) -> Result<()>;

    /// Close the session if one is open. Never fails.
    fn disconnect(&mut self);

    /// Decide whether `params` may be used to connect
    ///
    /// The base policy only requires a non-blank host.
    fn validate_params(&self, params: &ConfigParams) -> Result<()> {
        if params.host.trim().is_empty() {
            return Err(ConfdbError::invalid_argument("host must not be empty"));
        }
        Ok(())
    }

    /// Run a query on the open session
    fn execute_query(&mut self, query: &str) -> Result<QueryResult>;

    /// Current status
    fn status(&self) -> ConnectionStatus;

    /// `true` while a session is open
    fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }
}

/// Single-owner connection handle
pub struct DatabaseConnection {
    status: ConnectionStatus,
    connection_string: Option<String>,
    session: Option<Box<dyn Session>>,
    params: Option<ConfigParams>,
    driver: Arc<dyn Driver>,
}

impl Default for DatabaseConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DatabaseConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConnection")
            .field("status", &self.status)
            .field("connection_string", &self.connection_string)
            .field("driver", &self.driver.name())
            .finish_non_exhaustive()
    }
}

impl DatabaseConnection {
    /// Create a disconnected handle using the `SQLite` driver
    #[must_use]
    pub fn new() -> Self {
        Self::with_driver(Arc::new(SqliteDriver))
    }

    /// Create a disconnected handle that remembers `params` for later use
    #[must_use]
    pub fn with_params(params: ConfigParams) -> Self {
        let mut conn = Self::new();
        conn.params = Some(params);
        conn
    }

    /// Create a disconnected handle that opens sessions through `driver`
    #[must_use]
    pub fn with_driver(driver: Arc<dyn Driver>) -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            connection_string: None,
            session: None,
            params: None,
            driver,
        }
    }

    /// Current status
    #[must_use]
    pub const fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// `true` while a session is open
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    /// Descriptor of the open connection, `None` while disconnected
    #[must_use]
    pub fn connection_string(&self) -> Option<&str> {
        self.connection_string.as_deref()
    }

    /// Params given at construction or by the last successful connect
    #[must_use]
    pub const fn params(&self) -> Option<&ConfigParams> {
        self.params.as_ref()
    }

    /// Validate with the base policy and open a session
    pub fn connect(&mut self, params: &ConfigParams) -> Result<()> {
        self.ensure_can_connect()?;
        <Self as ConnectionHandle>::validate_params(self, params).map_err(|e| rejected(&e))?;
        self.establish(params)
    }

    /// Connect using the params given at construction
    pub fn connect_with_params(&mut self) -> Result<()> {
        let params = self
            .params
            .clone()
            .ok_or_else(|| ConfdbError::invalid_argument("No connection parameters configured"))?;
        self.connect(&params)
    }

    /// Close the session if one is open
    pub fn disconnect(&mut self) {
        if let Some(session) = self.session.take() {
            drop(session);
            info!(
                connection = self.connection_string.as_deref().unwrap_or_default(),
                "disconnected"
            );
        }
        self.connection_string = None;
        self.status = ConnectionStatus::Disconnected;
    }

    /// Run a query on the open session
    ///
    /// Fails with [`ConfdbError::NotConnected`] unless connected, without
    /// touching the driver.
    pub fn execute_query(&mut self, query: &str) -> Result<QueryResult> {
        let session = match (self.status, self.session.as_mut()) {
            (ConnectionStatus::Connected, Some(session)) => session,
            _ => return Err(ConfdbError::NotConnected),
        };
        debug!(query_len = query.len(), "executing query");
        session.execute(query)
    }

    fn ensure_can_connect(&self) -> Result<()> {
        match self.status {
            ConnectionStatus::Disconnected => Ok(()),
            ConnectionStatus::Connecting => Err(ConfdbError::AlreadyConnecting),
            ConnectionStatus::Connected => Err(ConfdbError::AlreadyConnected),
        }
    }

    /// Open a session for already validated params
    fn establish(&mut self, params: &ConfigParams) -> Result<()> {
        self.ensure_can_connect()?;
        self.status = ConnectionStatus::Connecting;

        match self.driver.open(params) {
            Ok(session) => {
                let descriptor = connection_string(self.driver.name(), params);
                info!(connection = %descriptor, "connected");
                self.session = Some(session);
                self.connection_string = Some(descriptor);
                self.params = Some(params.clone());
                self.status = ConnectionStatus::Connected;
                Ok(())
            }
            Err(e) => {
                warn!(host = %params.host, error = %e, "connection attempt failed");
                self.status = ConnectionStatus::Disconnected;
                Err(match e {
                    ConfdbError::ConnectionFailed(_) => e,
                    other => ConfdbError::connection_failed(other.message()),
                })
            }
        }
    }
}

impl Drop for DatabaseConnection {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl ConnectionHandle for DatabaseConnection {
    fn connect(&mut self, params: &ConfigParams) -> Result<()> {
        Self::connect(self, params)
    }

    fn disconnect(&mut self) {
        Self::disconnect(self);
    }

    fn execute_query(&mut self, query: &str) -> Result<QueryResult> {
        Self::execute_query(self, query)
    }

    fn status(&self) -> ConnectionStatus {
        self.status
    }
}

/// Connection handle safe to share between threads
///
/// Every operation holds the inner mutex for its whole duration, so the
/// status, connection string and session always change as one unit.
/// Validation is stricter than [`DatabaseConnection`]: the port must be in
/// range and the timeout positive.
#[derive(Debug, Default)]
pub struct ThreadSafeDbConnection {
    inner: Mutex<DatabaseConnection>,
}

impl ThreadSafeDbConnection {
    /// Create a disconnected handle using the `SQLite` driver
    #[must_use]
    pub fn new() -> Self {
        Self::from_connection(DatabaseConnection::new())
    }

    /// Create a disconnected handle that remembers `params` for later use
    #[must_use]
    pub fn with_params(params: ConfigParams) -> Self {
        Self::from_connection(DatabaseConnection::with_params(params))
    }

    /// Create a disconnected handle that opens sessions through `driver`
    #[must_use]
    pub fn with_driver(driver: Arc<dyn Driver>) -> Self {
        Self::from_connection(DatabaseConnection::with_driver(driver))
    }

    fn from_connection(conn: DatabaseConnection) -> Self {
        Self { inner: Mutex::new(conn) }
    }

    /// Validate with the strict policy and open a session
    pub fn connect(&self, params: &ConfigParams) -> Result<()> {
        let mut conn = self.inner.lock();
        conn.ensure_can_connect()?;
        validate_strict(params).map_err(|e| rejected(&e))?;
        conn.establish(params)
    }

    /// Connect using the params given at construction
    pub fn connect_with_params(&self) -> Result<()> {
        let mut conn = self.inner.lock();
        let params = conn
            .params
            .clone()
            .ok_or_else(|| ConfdbError::invalid_argument("No connection parameters configured"))?;
        conn.ensure_can_connect()?;
        validate_strict(&params).map_err(|e| rejected(&e))?;
        conn.establish(&params)
    }

    /// Close the session if one is open
    pub fn disconnect(&self) {
        self.inner.lock().disconnect();
    }

    /// Strict validation: non-blank host, port in range, positive timeout
    pub fn validate_params(&self, params: &ConfigParams) -> Result<()> {
        let _guard = self.inner.lock();
        validate_strict(params)
    }

    /// Run a query on the open session
    pub fn execute_query(&self, query: &str) -> Result<QueryResult> {
        self.inner.lock().execute_query(query)
    }

    /// Current status
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.inner.lock().status()
    }

    /// `true` while a session is open
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.lock().is_connected()
    }

    /// Descriptor of the open connection, `None` while disconnected
    #[must_use]
    pub fn connection_string(&self) -> Option<String> {
        self.inner.lock().connection_string().map(str::to_string)
    }

    /// Status and connection string read under a single lock acquisition
    #[must_use]
    pub fn snapshot(&self) -> (ConnectionStatus, Option<String>) {
        let conn = self.inner.lock();
        (conn.status(), conn.connection_string().map(str::to_string))
    }

    /// Params given at construction or by the last successful connect
    #[must_use]
    pub fn params(&self) -> Option<ConfigParams> {
        self.inner.lock().params().cloned()
    }
}

impl ConnectionHandle for ThreadSafeDbConnection {
    fn connect(&mut self, params: &ConfigParams) -> Result<()> {
        Self::connect(self, params)
    }

    fn disconnect(&mut self) {
        Self::disconnect(self);
    }

    fn validate_params(&self, params: &ConfigParams) -> Result<()> {
        Self::validate_params(self, params)
    }

    fn execute_query(&mut self, query: &str) -> Result<QueryResult> {
        Self::execute_query(self, query)
    }

    fn status(&self) -> ConnectionStatus {
        Self::status(self)
    }
}

/// Shared-ownership connection handle
pub type SharedConnection = Arc<ThreadSafeDbConnection>;

/// Create a shared, disconnected handle initialised with `params`
///
/// Call [`ThreadSafeDbConnection::connect_with_params`] to open it.
#[must_use]
pub fn create_db_connection(params: ConfigParams) -> SharedConnection {
    Arc::new(ThreadSafeDbConnection::with_params(params))
}

fn validate_strict(params: &ConfigParams) -> Result<()> {
    params.validate()
}

/// Validation failures surface as connection failures carrying the reason
fn rejected(err: &ConfdbError) -> ConfdbError {
    warn!(reason = %err, "connection parameters rejected");
    ConfdbError::connection_failed(format!("invalid connection parameters: {err}"))
}

/// `<driver>://<username>@<host>:<port>`, never including the password
fn connection_string(driver: &str, params: &ConfigParams) -> String {
    if params.username.is_empty() {
        format!("{driver}://{}:{}", params.host, params.port)
    } else {
        format!("{driver}://{}@{}:{}", params.username, params.host, params.port)
    }
}
