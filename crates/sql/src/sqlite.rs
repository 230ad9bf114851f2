//! Default `SQLite` driver.
//!
//! Each pooled connection owns its own `rusqlite` session. Use a file path,
//! or a shared-cache URI such as `file:app?mode=memory&cache=shared`, so that
//! every connection in the pool sees the same database.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]

use std::time::Duration;

use anyhow::{Context, Result};
use fromenv::FromEnv;
use rusqlite::types::{Value, ValueRef};
use rusqlite::{Connection as SqliteConnection, OpenFlags};
use tracing::instrument;

use crate::pool::{DEFAULT_MAX_SIZE, DEFAULT_TIMEOUT_MS, Pool, PoolConfig};
use crate::traits::{Connection, Manager};
use crate::types::{DataType, Field, Row, Statement};

/// Options used to connect to the SQL database.
///
/// This struct is used to load connection options from environment variables.
#[derive(Debug, Clone, FromEnv)]
pub struct ConnectOptions {
    /// Database path or URI.
    #[env(from = "SQL_DATABASE", default = "file::memory:?cache=shared")]
    pub database: String,

    /// Maximum number of pooled connections.
    #[env(from = "SQL_POOL_MAX_SIZE", default = "10")]
    pub max_size: usize,

    /// Acquire timeout in milliseconds.
    #[env(from = "SQL_POOL_TIMEOUT_MS", default = "30000")]
    pub timeout_ms: u64,
}

impl crate::FromEnv for ConnectOptions {
    fn from_env() -> Result<Self> {
        Self::from_env().finalize().context("issue loading connection options")
    }
}

impl ConnectOptions {
    /// Options for `database` with default pool settings.
    #[must_use]
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            max_size: DEFAULT_MAX_SIZE,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    /// The pool settings carried by these options.
    #[must_use]
    pub const fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            max_size: self.max_size,
            acquire_timeout: Duration::from_millis(self.timeout_ms),
        }
    }
}

impl Pool {
    /// Creates a pool of `SQLite` connections.
    ///
    /// One connection is opened eagerly to validate the database path.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be built or the database cannot be
    /// opened.
    #[instrument]
    pub fn sqlite(options: ConnectOptions) -> crate::Result<Self> {
        tracing::debug!("initializing SQLite pool for: {}", options.database);

        let config = options.pool_config();
        let pool = Self::new(SqliteManager::new(options.database), config)?;
        pool.acquire()?.release();

        tracing::info!("connected to database successfully");
        Ok(pool)
    }
}

/// Opens `SQLite` connections for a [`Pool`].
#[derive(Debug, Clone)]
pub struct SqliteManager {
    database: String,
}

impl SqliteManager {
    /// Manager for the database at `database` (a path or URI).
    #[must_use]
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
        }
    }
}

impl Manager for SqliteManager {
    fn connect(&self) -> crate::Result<Box<dyn Connection>> {
        tracing::debug!("opening SQLite connection to: {}", self.database);

        let conn = SqliteConnection::open_with_flags(&self.database, OpenFlags::default())
            .context("failed to open SQLite database")?;

        Ok(Box::new(SqliteConnectionImpl { conn }))
    }
}

#[derive(Debug)]
struct SqliteConnectionImpl {
    conn: SqliteConnection,
}

impl SqliteConnectionImpl {
    fn bound(&self, statement: &Statement) -> Result<rusqlite::CachedStatement<'_>> {
        let mut stmt =
            self.conn.prepare_cached(statement.sql()).context("failed to prepare statement")?;

        for (index, param) in statement.params().iter().enumerate() {
            if let Some(value) = param {
                stmt.raw_bind_parameter(index + 1, datatype_to_rusqlite_value(value))
                    .with_context(|| format!("failed to bind argument {}", index + 1))?;
            }
        }

        Ok(stmt)
    }
}

impl Connection for SqliteConnectionImpl {
    fn prepare(&mut self, sql: &str) -> crate::Result<Statement> {
        let stmt = self.conn.prepare_cached(sql).context("failed to prepare statement")?;
        Ok(Statement::new(sql, stmt.parameter_count()))
    }

    fn execute(&mut self, statement: &Statement) -> crate::Result<u64> {
        tracing::debug!("executing statement: {}", statement.sql());

        let mut stmt = self.bound(statement)?;
        let rows_affected = stmt.raw_execute().context("failed to execute statement")?;

        Ok(rows_affected as u64)
    }

    fn query(&mut self, statement: &Statement) -> crate::Result<Vec<Row>> {
        tracing::debug!("executing query: {}", statement.sql());

        let mut stmt = self.bound(statement)?;

        // Get column names
        let column_names: Vec<String> =
            stmt.column_names().iter().map(ToString::to_string).collect();

        let mut rows = stmt.raw_query();
        let mut result_rows = Vec::new();
        while let Some(row) = rows.next().context("failed to fetch row")? {
            let mut fields = Vec::with_capacity(column_names.len());

            for (i, name) in column_names.iter().enumerate() {
                let value = row.get_ref(i).context("failed to get column value")?;
                fields.push(Field {
                    name: name.clone(),
                    value: rusqlite_value_to_datatype(value)?,
                });
            }

            result_rows.push(Row { fields });
        }

        Ok(result_rows)
    }
}

fn datatype_to_rusqlite_value(dt: &DataType) -> Value {
    match dt {
        DataType::Null => Value::Null,
        DataType::Boolean(b) => Value::Integer(i64::from(*b)),
        DataType::Int32(i) => Value::Integer(i64::from(*i)),
        DataType::Int64(i) => Value::Integer(*i),
        DataType::Float(f) => Value::Real(f64::from(*f)),
        DataType::Double(f) => Value::Real(*f),
        DataType::Binary(b) => Value::Blob(b.clone()),
        DataType::Str(s) | DataType::Date(s) | DataType::Time(s) | DataType::Timestamp(s) => {
            Value::Text(s.clone())
        }
    }
}

fn rusqlite_value_to_datatype(value: ValueRef) -> Result<DataType> {
    match value {
        ValueRef::Null => Ok(DataType::Null),
        ValueRef::Integer(i) => Ok(DataType::Int64(i)),
        ValueRef::Real(f) => Ok(DataType::Double(f)),
        ValueRef::Text(t) => {
            let s = std::str::from_utf8(t).context("invalid UTF-8 in text value")?;
            Ok(DataType::Str(s.to_string()))
        }
        ValueRef::Blob(b) => Ok(DataType::Binary(b.to_vec())),
    }
}
