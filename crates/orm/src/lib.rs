#![doc = include_str!("../README.md")]

//! # Object mapping
//!
//! Declare entities with [`entity!`], then run operations through a
//! [`Database`]:
//!
//! ```ignore
//! use tabula_orm::{Database, Insert, SingleFetch, Update, entity};
//!
//! entity! {
//!     table = "users",
//!     insert = ["id", "name", "rank"],
//!     unique = "id",
//!     #[derive(Debug, Clone, Default)]
//!     pub struct User {
//!         pub id: Uuid,
//!         pub name: String,
//!         pub rank: Rank,
//!     }
//! }
//!
//! let db = Database::connect()?;
//! db.execute_sync(Insert::new(user.clone()))?;
//!
//! let mut user = db
//!     .execute_sync(SingleFetch::<User>::new().r#where("name", "Sam"))?
//!     .expect("inserted above");
//!
//! user.rank = Rank::Vip;
//! db.execute_async(Update::new(user, "rank")).await?;
//! ```
//!
//! ## Custom Types
//!
//! Values are converted by the scalar mapping [`Registry`]. Register a
//! [`Mapping`] for your own types before first use:
//!
//! ```ignore
//! Registry::shared().register_fn(
//!     |rank: &Rank| DataType::Str(rank.to_string()),
//!     |row: &Row, column: &str| String::fetch(row, column)?.parse(),
//! );
//! ```

#![forbid(unsafe_code)]

mod condition;
mod database;
mod entity;
mod error;
mod fetch;
mod insert;
mod mapping;
mod metadata;
mod operation;
mod raw;
mod scalar;
mod statement;
mod update;
mod value;

pub use condition::Conditions;
pub use database::{Database, FutureResult};
pub use entity::{ColumnField, Entity};
pub use error::{Error, Result};
pub use fetch::{FetchAll, SingleFetch};
pub use insert::Insert;
pub use mapping::{FnMapping, Mapping, Registry, ScalarMapping};
pub use metadata::{EntityMeta, MetadataCache};
pub use operation::Operation;
pub use raw::{Cursor, RawFetch, RawVoid, RetainedCursor};
pub use scalar::{FetchValue, Scalar, StrLiteral, ToDataType};
pub use statement::StatementOperation;
// Re-export the wire types used by custom mappings.
pub use tabula_sql::{DataType, Field, Pool, PoolConfig, Row, Statement};
pub use update::Update;
pub use value::Value;
