//! # Raw statement execution
//!
//! [`RawVoid`] runs a statement and releases its connection before
//! returning. [`RawFetch`] runs a query and hands back a [`Cursor`] that keeps
//! the connection and statement until the cursor is closed or dropped.

use std::collections::VecDeque;

use tabula_sql::{PooledConnection, Row, Statement};

use crate::database::Database;
use crate::error::Result;
use crate::operation::Operation;
use crate::statement::StatementOperation;
use crate::value::Value;

/// Execute a statement that returns no rows, reporting the number of rows
/// affected.
///
/// ```ignore
/// let removed = db.execute_sync(RawVoid::new("DELETE FROM users WHERE name=?", params!["Sam"]))?;
/// ```
#[derive(Debug)]
pub struct RawVoid {
    statement: StatementOperation,
}

impl RawVoid {
    /// Run `sql` with positional `args`.
    #[must_use]
    pub fn new(sql: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            statement: StatementOperation::new(sql, args),
        }
    }
}

impl From<StatementOperation> for RawVoid {
    fn from(statement: StatementOperation) -> Self {
        Self { statement }
    }
}

impl Operation for RawVoid {
    type Output = u64;

    fn execute(self, db: &Database) -> Result<u64> {
        let mut conn = db.acquire()?;
        let statement = self.statement.prepare(&mut *conn, db.registry())?;
        let affected = conn.execute(&statement)?;

        tracing::debug!(sql = %statement.sql(), affected, "statement executed");
        Ok(affected)
    }
}

/// Execute a query, returning a [`Cursor`] over its rows.
///
/// The cursor holds a pooled connection until it is closed or dropped; keep
/// it short-lived, or hold it as a [`RetainedCursor`] and release it
/// explicitly.
#[derive(Debug)]
pub struct RawFetch {
    statement: StatementOperation,
}

impl RawFetch {
    /// Run `sql` with positional `args`.
    #[must_use]
    pub fn new(sql: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            statement: StatementOperation::new(sql, args),
        }
    }
}

impl From<StatementOperation> for RawFetch {
    fn from(statement: StatementOperation) -> Self {
        Self { statement }
    }
}

impl Operation for RawFetch {
    type Output = Cursor;

    fn execute(self, db: &Database) -> Result<Cursor> {
        let mut conn = db.acquire()?;
        let statement = self.statement.prepare(&mut *conn, db.registry())?;
        let rows = conn.query(&statement)?;

        tracing::debug!(sql = %statement.sql(), rows = rows.len(), "query executed");
        Ok(Cursor {
            conn,
            statement,
            rows: rows.into(),
        })
    }
}

/// Rows of an executed query, together with the connection and statement
/// that produced them.
///
/// The connection returns to the pool when the cursor is dropped or
/// [closed](Cursor::close), on every exit path.
#[derive(Debug)]
pub struct Cursor {
    conn: PooledConnection,
    statement: Statement,
    rows: VecDeque<Row>,
}

impl Cursor {
    /// The executed statement.
    #[must_use]
    pub const fn statement(&self) -> &Statement {
        &self.statement
    }

    /// Number of rows not yet read.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }

    /// Release the connection and statement.
    pub fn close(self) {
        tracing::debug!(sql = %self.statement.sql(), "cursor closed");
        self.conn.release();
    }

    /// Keep the cursor open beyond the current scope. The returned guard
    /// must be [released](RetainedCursor::release).
    pub fn retain(self) -> RetainedCursor {
        RetainedCursor { cursor: Some(self) }
    }
}

impl Iterator for Cursor {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        self.rows.pop_front()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.rows.len(), Some(self.rows.len()))
    }
}

/// A [`Cursor`] the caller has chosen to keep open.
///
/// Dropping it without calling [`RetainedCursor::release`] still returns the
/// connection to the pool, but is reported as a leak.
#[must_use = "a retained cursor holds a pooled connection until released"]
#[derive(Debug)]
pub struct RetainedCursor {
    cursor: Option<Cursor>,
}

impl RetainedCursor {
    /// The executed statement, until released.
    #[must_use]
    pub fn statement(&self) -> Option<&Statement> {
        self.cursor.as_ref().map(Cursor::statement)
    }

    /// Release the connection and statement.
    pub fn release(mut self) {
        if let Some(cursor) = self.cursor.take() {
            cursor.close();
        }
    }
}

impl Iterator for RetainedCursor {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        self.cursor.as_mut().and_then(Iterator::next)
    }
}

impl Drop for RetainedCursor {
    fn drop(&mut self) {
        if let Some(cursor) = self.cursor.take() {
            tracing::warn!(sql = %cursor.statement.sql(), "retained cursor dropped without release");
            cursor.close();
        }
    }
}
