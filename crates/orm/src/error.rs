//! Errors

use thiserror::Error;

/// Result type used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures raised by operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The entity declaration cannot support the requested operation, e.g.
    /// an unknown field or an update with nothing to target. Raised before
    /// any I/O.
    #[error("declaration error: {0}")]
    Declaration(String),

    /// A value could not be converted to or from its column representation.
    #[error("mapping error: {0}")]
    Mapping(String),

    /// The pool or driver failed.
    #[error(transparent)]
    Execution(#[from] tabula_sql::Error),

    /// The worker running an asynchronous operation failed to complete it.
    #[error("worker error: {0}")]
    Worker(String),
}

impl Error {
    /// Whether this is a [`Error::Declaration`].
    #[must_use]
    pub const fn is_declaration(&self) -> bool {
        matches!(self, Self::Declaration(_))
    }

    /// Whether this is a [`Error::Mapping`].
    #[must_use]
    pub const fn is_mapping(&self) -> bool {
        matches!(self, Self::Mapping(_))
    }

    /// Whether the failure happened while running the statement, including
    /// worker failures on the asynchronous path.
    #[must_use]
    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_) | Self::Worker(_))
    }
}

/// Build an [`Error::Declaration`] from a format string.
macro_rules! declaration {
    ($($arg:tt)*) => {
        $crate::error::Error::Declaration(format!($($arg)*))
    };
}

/// Build an [`Error::Mapping`] from a format string.
macro_rules! mapping {
    ($($arg:tt)*) => {
        $crate::error::Error::Mapping(format!($($arg)*))
    };
}

pub(crate) use {declaration, mapping};
