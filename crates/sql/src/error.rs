//! Errors

use std::time::Duration;

use thiserror::Error;

/// Result type used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures raised while acquiring connections or executing statements.
#[derive(Error, Debug)]
pub enum Error {
    /// No connection became available before the acquire timeout elapsed.
    #[error("connection pool exhausted after waiting {timeout:?}")]
    PoolExhausted {
        /// How long the caller waited.
        timeout: Duration,
    },

    /// The pool has been shut down.
    #[error("connection pool is closed")]
    PoolClosed,

    /// A positional argument was bound outside the statement's placeholders.
    #[error("argument position {position} is out of range for a statement with {count} placeholder(s)")]
    BindOutOfRange {
        /// The 1-based position requested.
        position: usize,
        /// Number of placeholders in the statement.
        count: usize,
    },

    /// The driver failed to connect, prepare or execute.
    #[error(transparent)]
    Driver(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Driver(err.into())
    }
}
