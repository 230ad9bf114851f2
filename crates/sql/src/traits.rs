//! # Driver traits
//!
//! SQL drivers implement [`Connection`] for a live session and [`Manager`]
//! to open new sessions on behalf of a [`Pool`](crate::Pool).

use std::fmt::Debug;

use crate::error::Result;
use crate::types::{Row, Statement};

/// A live database session.
///
/// Calls block the current thread until the driver responds.
pub trait Connection: Debug + Send + 'static {
    /// Prepare `sql`, returning a [`Statement`] with one empty slot per
    /// placeholder.
    ///
    /// # Errors
    ///
    /// Returns an error if the SQL text is rejected by the driver.
    fn prepare(&mut self, sql: &str) -> Result<Statement>;

    /// Execute a statement that does not return rows (e.g., an `INSERT`,
    /// `UPDATE`, or `DELETE`), returning the number of rows affected.
    ///
    /// # Errors
    ///
    /// Returns an error on constraint violations, syntax errors or lost
    /// connectivity.
    fn execute(&mut self, statement: &Statement) -> Result<u64>;

    /// Execute a query and return the resulting rows.
    ///
    /// # Errors
    ///
    /// Returns an error on syntax errors or lost connectivity.
    fn query(&mut self, statement: &Statement) -> Result<Vec<Row>>;
}

/// Opens new connections for a pool.
pub trait Manager: Debug + Send + Sync + 'static {
    /// Open a new connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached.
    fn connect(&self) -> Result<Box<dyn Connection>>;
}

/// Trait for creating connection options from environment variables.
pub trait FromEnv: Sized {
    /// Create connection options from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or invalid.
    fn from_env() -> anyhow::Result<Self>;
}
