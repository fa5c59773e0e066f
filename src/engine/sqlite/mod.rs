//! `SQLite` Driver
//!
//! This module implements the [`Driver`] and [`Session`] traits on top of
//! `rusqlite`.
//!
//! # Parameter Mapping
//! - `host` is the database file path, or `:memory:` for an in-memory database
//! - `timeout` becomes the busy timeout
//! - `port`, `username` and `password` are ignored (`SQLite` has no server or users)
//!
//! # Implementation Notes
//! - Synchronous driver, queries block the calling thread
//! - BLOB data is Base64-encoded for JSON safety
//! - The database file is created if it does not exist

use rusqlite::{Connection, OpenFlags, Row};
use tracing::debug;

use crate::engine::{ConfigParams, Driver, QueryResult, Session};
use crate::error::{ConfdbError, Result};

/// Path that opens an in-memory database
pub const MEMORY_PATH: &str = ":memory:";

/// `SQLite` driver
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDriver;

impl Driver for SqliteDriver {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn open(&self, params: &ConfigParams) -> Result<Box<dyn Session>> {
        let path = params.host.trim();
        if path.is_empty() {
            return Err(ConfdbError::connection_failed("SQLite requires a database path as host"));
        }

        let conn = open_connection(path)?;

        conn.busy_timeout(params.timeout_duration()).map_err(|e| {
            ConfdbError::connection_failed(format!("Failed to set busy timeout: {e}"))
        })?;

        debug!(path, timeout_secs = params.timeout, "opened sqlite session");

        Ok(Box::new(SqliteSession { conn }))
    }
}

/// Open `SQLite` session
pub struct SqliteSession {
    conn: Connection,
}

impl Session for SqliteSession {
    fn execute(&mut self, query: &str) -> Result<QueryResult> {
        if query.trim().is_empty() {
            return Err(ConfdbError::query_failed("Query cannot be empty"));
        }
        execute_query(&self.conn, query)
    }
}

/// Open a read-write `SQLite` connection, creating the file if needed
fn open_connection(path: &str) -> Result<Connection> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE;

    Connection::open_with_flags(path, flags)
        .map_err(|e| ConfdbError::connection_failed(format!("Failed to open SQLite database: {e}")))
}

/// Execute query and return `QueryResult`
fn execute_query(conn: &Connection, query: &str) -> Result<QueryResult> {
    // prepare() compiles only the first statement, the rest would be dropped
    if has_multiple_statements(query) {
        return Err(ConfdbError::query_failed("multiple statements are not supported"));
    }

    let mut stmt = conn
        .prepare(query)
        .map_err(|e| ConfdbError::query_failed(format!("Failed to prepare query: {e}")))?;

    let column_names: Vec<String> = stmt.column_names().iter().map(|s| (*s).to_string()).collect();

    // Statements without a result set (INSERT, UPDATE, DDL) report affected rows instead
    if column_names.is_empty() {
        // sqlite3_changes() keeps the count of the last DML statement, so DDL
        // would report a stale value; measure the total_changes() delta instead
        let before = total_changes(conn)?;
        stmt.execute([])
            .map_err(|e| ConfdbError::query_failed(format!("Failed to execute query: {e}")))?;
        let after = total_changes(conn)?;

        return Ok(QueryResult {
            columns: column_names,
            rows: Vec::new(),
            rows_affected: Some(after.saturating_sub(before)),
        });
    }

    let rows = stmt
        .query([])
        .map_err(|e| ConfdbError::query_failed(format!("Failed to execute query: {e}")))?;

    let rows_data = rows
        .mapped(|row| row_to_json(column_names.len(), row))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| ConfdbError::query_failed(format!("Failed to fetch row: {e}")))?;

    Ok(QueryResult { columns: column_names, rows: rows_data, rows_affected: None })
}

/// Rows changed by DML since the connection was opened
fn total_changes(conn: &Connection) -> Result<u64> {
    conn.query_row("SELECT total_changes()", [], |row| row.get::<_, i64>(0))
        .map(|n| n.unsigned_abs())
        .map_err(|e| ConfdbError::query_failed(format!("Failed to read change count: {e}")))
}

/// Whether `sql` holds more than one statement
///
/// Scans for a `;` outside string literals, quoted identifiers and comments
/// that is followed by anything other than whitespace, comments or further
/// `;`. Trigger bodies (`BEGIN ... ; END`) count as multiple statements.
fn has_multiple_statements(sql: &str) -> bool {
    let mut chars = sql.chars().peekable();
    let mut terminated = false;

    while let Some(ch) = chars.next() {
        match ch {
            '-' if chars.peek() == Some(&'-') => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = ' ';
                for c in chars.by_ref() {
                    if prev == '*' && c == '/' {
                        break;
                    }
                    prev = c;
                }
            }
            ';' => terminated = true,
            c if c.is_whitespace() => {}
            _ if terminated => return true,
            '\'' | '"' | '`' => {
                for c in chars.by_ref() {
                    if c == ch {
                        break;
                    }
                }
            }
            '[' => {
                for c in chars.by_ref() {
                    if c == ']' {
                        break;
                    }
                }
            }
            _ => {}
        }
    }

    false
}

/// Convert a `SQLite` row to a JSON-safe `Vec`
fn row_to_json(
    column_count: usize,
    row: &Row,
) -> std::result::Result<Vec<serde_json::Value>, rusqlite::Error> {
    (0..column_count).map(|idx| sqlite_value_to_json(row, idx)).collect()
}

/// Convert `SQLite` value to JSON value
fn sqlite_value_to_json(
    row: &Row,
    idx: usize,
) -> std::result::Result<serde_json::Value, rusqlite::Error> {
    use rusqlite::types::ValueRef;

    let value_ref = row.get_ref(idx)?;

    Ok(match value_ref {
        ValueRef::Null => serde_json::Value::Null,
        ValueRef::Integer(i) => serde_json::Value::Number(i.into()),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map_or(serde_json::Value::Null, serde_json::Value::Number), // NaN/Infinity as null
        ValueRef::Text(s) => {
            let text = std::str::from_utf8(s).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    idx,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?;
            serde_json::Value::String(text.to_string())
        }
        ValueRef::Blob(b) => {
            use base64::Engine;
            serde_json::Value::String(base64::engine::general_purpose::STANDARD.encode(b))
        }
    })
}
