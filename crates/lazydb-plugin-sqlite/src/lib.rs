//! SQLite backend for the lazydb plugin host.
//!
//! [`SqlitePlugin`] opens a database file (or an in-memory database) on
//! `connect` and runs one statement per `run`. Cell values are normalised
//! before they leave the process: blobs travel as base64 text and non-finite
//! reals become null.

#[cfg(test)]
mod tests;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use lazydb_plugins::{CellValue, DatabasePlugin, ExecutionErrorKind, PluginError, QueryResult};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, Row};
use tracing::{debug, info};

/// Backend identifier reported through `Name`.
pub const BACKEND_NAME: &str = "sqlite";

/// Target that opens a private in-memory database.
pub const MEMORY_TARGET: &str = ":memory:";

const TARGET_PREFIX: &str = "sqlite:";

const SQLITE_TARGET: &str = "lazydb_plugin_sqlite";

/// Backend holding at most one SQLite connection.
#[derive(Debug, Default)]
pub struct SqlitePlugin {
    connection: Option<Connection>,
}

impl SqlitePlugin {
    /// Creates a plugin with no open database.
    #[must_use]
    pub const fn new() -> Self {
        Self { connection: None }
    }

    /// Returns `true` while a database is open.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.connection.is_some()
    }
}

impl DatabasePlugin for SqlitePlugin {
    fn name(&self) -> String {
        BACKEND_NAME.to_owned()
    }

    fn connect(&mut self, target: &str) -> Result<(), PluginError> {
        let connection = open(target)?;
        if self.connection.replace(connection).is_some() {
            debug!(target: SQLITE_TARGET, "replaced previous connection");
        }
        info!(target: SQLITE_TARGET, database = target, "connected");
        Ok(())
    }

    fn run(&mut self, query: &str) -> Result<QueryResult, PluginError> {
        let Some(connection) = self.connection.as_ref() else {
            return Err(PluginError::execution(
                ExecutionErrorKind::NotConnected,
                "no database is open; call connect first",
            ));
        };
        execute(connection, query)
    }

    fn close(&mut self) -> Result<(), PluginError> {
        let Some(connection) = self.connection.take() else {
            return Ok(());
        };
        connection.close().map_err(|(_, error)| PluginError::Close {
            message: error.to_string(),
        })?;
        info!(target: SQLITE_TARGET, "closed");
        Ok(())
    }
}

/// Opens `target`, accepting an optional `sqlite:` scheme prefix.
fn open(target: &str) -> Result<Connection, PluginError> {
    let path = target.strip_prefix(TARGET_PREFIX).unwrap_or(target).trim();
    if path.is_empty() {
        return Err(PluginError::Connect {
            message: String::from("database path is empty"),
        });
    }
    let opened = if path == MEMORY_TARGET {
        Connection::open_in_memory()
    } else {
        Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
    };
    opened.map_err(|error| PluginError::Connect {
        message: format!("failed to open '{path}': {error}"),
    })
}

fn execute(connection: &Connection, query: &str) -> Result<QueryResult, PluginError> {
    let mut statement = connection
        .prepare(query)
        .map_err(|error| PluginError::execution(ExecutionErrorKind::Syntax, error.to_string()))?;
    let columns: Vec<String> = statement
        .column_names()
        .into_iter()
        .map(str::to_owned)
        .collect();

    if columns.is_empty() {
        let changed = statement.execute([]).map_err(runtime)?;
        debug!(target: SQLITE_TARGET, changed, "statement executed");
        return Ok(QueryResult::default());
    }

    let width = columns.len();
    let mut result = QueryResult::new(columns);
    let mut rows = statement.query([]).map_err(runtime)?;
    while let Some(row) = rows.next().map_err(runtime)? {
        let values = (0..width)
            .map(|index| cell(row, index))
            .collect::<Result<Vec<_>, _>>()
            .map_err(runtime)?;
        result
            .push_row(values)
            .map_err(|error| PluginError::execution(ExecutionErrorKind::Runtime, error.to_string()))?;
    }
    debug!(target: SQLITE_TARGET, rows = result.row_count(), "query returned");
    Ok(result)
}

fn cell(row: &Row<'_>, index: usize) -> Result<CellValue, rusqlite::Error> {
    Ok(match row.get_ref(index)? {
        ValueRef::Null => CellValue::Null,
        ValueRef::Integer(value) => CellValue::Integer(value),
        ValueRef::Real(value) => CellValue::from(value),
        ValueRef::Text(bytes) => CellValue::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => CellValue::Text(STANDARD.encode(bytes)),
    })
}

fn runtime(error: rusqlite::Error) -> PluginError {
    PluginError::execution(ExecutionErrorKind::Runtime, error.to_string())
}
