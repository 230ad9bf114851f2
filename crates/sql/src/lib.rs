#![doc = include_str!("../README.md")]

//! # SQL plumbing
//!
//! This crate provides the connection-level pieces an object mapper needs:
//! wire values, prepared statements, driver traits and a connection pool.

#![forbid(unsafe_code)]

mod error;
mod pool;
pub mod sqlite;
mod traits;
mod types;

pub use crate::error::{Error, Result};
pub use crate::pool::{Pool, PoolConfig, PooledConnection};
pub use crate::traits::{Connection, FromEnv, Manager};
pub use crate::types::{DataType, Field, Row, Statement};
