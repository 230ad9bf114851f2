//! # Scalar mapping registry
//!
//! The registry maps a value's runtime type to the logic that writes it into a
//! statement slot and reads it back from a result column. Built-in scalars are
//! installed by [`Registry::new`]; callers add mappings for their own types
//! (typically enums) with [`Registry::register`]:
//!
//! ```ignore
//! struct RankMapping;
//!
//! impl Mapping<Rank> for RankMapping {
//!     fn to_sql(&self, value: &Rank) -> DataType {
//!         DataType::Str(value.as_str().to_string())
//!     }
//!
//!     fn from_row(&self, row: &Row, column: &str) -> anyhow::Result<Rank> {
//!         String::fetch(row, column)?.parse()
//!     }
//! }
//!
//! Registry::shared().register(RankMapping);
//! ```
//!
//! The registry is safe to share between threads: registration takes a write
//! lock, lookups a read lock, and a registration for a type already present
//! replaces the earlier mapping.

use std::any::{TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, LazyLock};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use tabula_sql::{DataType, Row, Statement};
use uuid::Uuid;

use crate::error::{Result, mapping};
use crate::scalar::{Scalar, StrLiteral, row_field};
use crate::value::Value;

static SHARED: LazyLock<Arc<Registry>> = LazyLock::new(|| Arc::new(Registry::new()));

/// Bidirectional conversion between `T` and its column representation.
pub trait Mapping<T>: Send + Sync + 'static {
    /// Convert `value` into a statement argument.
    fn to_sql(&self, value: &T) -> DataType;

    /// Read `column` from `row` as a `T`.
    ///
    /// # Errors
    ///
    /// Returns an error if the column is missing or holds an incompatible
    /// value.
    fn from_row(&self, row: &Row, column: &str) -> anyhow::Result<T>;
}

/// A [`Mapping`] built from a pair of closures.
pub struct FnMapping<T, W, R> {
    write: W,
    read: R,
    _type: PhantomData<fn() -> T>,
}

impl<T, W, R> FnMapping<T, W, R>
where
    W: Fn(&T) -> DataType,
    R: Fn(&Row, &str) -> anyhow::Result<T>,
{
    /// Pair a write and a read function.
    pub const fn new(write: W, read: R) -> Self {
        Self {
            write,
            read,
            _type: PhantomData,
        }
    }
}

impl<T, W, R> Mapping<T> for FnMapping<T, W, R>
where
    T: 'static,
    W: Fn(&T) -> DataType + Send + Sync + 'static,
    R: Fn(&Row, &str) -> anyhow::Result<T> + Send + Sync + 'static,
{
    fn to_sql(&self, value: &T) -> DataType {
        (self.write)(value)
    }

    fn from_row(&self, row: &Row, column: &str) -> anyhow::Result<T> {
        (self.read)(row, column)
    }
}

type WriteFn = dyn Fn(&Value) -> Option<DataType> + Send + Sync;
type ReadFn = dyn Fn(&Row, &str) -> anyhow::Result<Value> + Send + Sync;

/// A type-erased mapping as stored in the [`Registry`].
#[derive(Clone)]
pub struct ScalarMapping {
    type_name: &'static str,
    write: Arc<WriteFn>,
    read: Arc<ReadFn>,
}

impl ScalarMapping {
    fn new<T, M>(mapping: Arc<M>) -> Self
    where
        T: Send + Sync + 'static,
        M: Mapping<T>,
    {
        let reader = Arc::clone(&mapping);
        Self {
            type_name: type_name::<T>(),
            write: Arc::new(move |value: &Value| {
                value.downcast_ref::<T>().map(|v| mapping.to_sql(v))
            }),
            read: Arc::new(move |row: &Row, column: &str| {
                reader.from_row(row, column).map(Value::new)
            }),
        }
    }

    fn nullable<T, M>(mapping: Arc<M>) -> Self
    where
        T: Send + Sync + 'static,
        M: Mapping<T>,
    {
        let reader = Arc::clone(&mapping);
        Self {
            type_name: type_name::<Option<T>>(),
            write: Arc::new(move |value: &Value| {
                value
                    .downcast_ref::<Option<T>>()
                    .map(|v| v.as_ref().map_or(DataType::Null, |v| mapping.to_sql(v)))
            }),
            read: Arc::new(move |row: &Row, column: &str| -> anyhow::Result<Value> {
                if row_field(row, column)?.is_null() {
                    return Ok(Value::new(None::<T>));
                }
                reader.from_row(row, column).map(|v| Value::new(Some(v)))
            }),
        }
    }

    /// Name of the mapped type.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Convert `value` into a statement argument.
    ///
    /// Returns `None` if `value` is not of the mapped type.
    #[must_use]
    pub fn write(&self, value: &Value) -> Option<DataType> {
        (self.write)(value)
    }

    /// Read `column` from `row` as the mapped type.
    ///
    /// # Errors
    ///
    /// Returns an error if the column is missing or holds an incompatible
    /// value.
    pub fn read(&self, row: &Row, column: &str) -> anyhow::Result<Value> {
        (self.read)(row, column)
    }
}

impl fmt::Debug for ScalarMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScalarMapping").field("type_name", &self.type_name).finish_non_exhaustive()
    }
}

/// Process-wide table of scalar mappings, keyed by runtime type.
pub struct Registry {
    mappings: RwLock<HashMap<TypeId, ScalarMapping>>,
}

impl Registry {
    /// A registry holding the built-in scalar mappings.
    #[must_use]
    pub fn new() -> Self {
        let registry = Self::empty();
        registry.register::<bool, _>(Scalar);
        registry.register::<i32, _>(Scalar);
        registry.register::<i64, _>(Scalar);
        registry.register::<f32, _>(Scalar);
        registry.register::<f64, _>(Scalar);
        registry.register::<String, _>(Scalar);
        registry.register::<&'static str, _>(StrLiteral);
        registry.register::<Vec<u8>, _>(Scalar);
        registry.register::<Decimal, _>(Scalar);
        registry.register::<Uuid, _>(Scalar);
        registry.register::<NaiveDate, _>(Scalar);
        registry.register::<NaiveDateTime, _>(Scalar);
        registry.register::<DateTime<Utc>, _>(Scalar);
        registry.register::<serde_json::Value, _>(Scalar);
        registry
    }

    /// A registry with no mappings at all.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            mappings: RwLock::new(HashMap::new()),
        }
    }

    /// The process-wide registry used by [`Database`](crate::Database)
    /// unless another is supplied.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::clone(&SHARED)
    }

    /// Install `mapping` for `T` and for `Option<T>`, replacing any mapping
    /// previously registered for either.
    pub fn register<T, M>(&self, mapping: M)
    where
        T: Send + Sync + 'static,
        M: Mapping<T>,
    {
        let mapping = Arc::new(mapping);
        let mut mappings = self.mappings.write();
        mappings.insert(TypeId::of::<T>(), ScalarMapping::new::<T, M>(Arc::clone(&mapping)));
        mappings.insert(TypeId::of::<Option<T>>(), ScalarMapping::nullable::<T, M>(mapping));
        drop(mappings);

        tracing::debug!(type_name = type_name::<T>(), "registered scalar mapping");
    }

    /// Install a mapping for `T` built from a write and a read function.
    pub fn register_fn<T, W, R>(&self, write: W, read: R)
    where
        T: Send + Sync + 'static,
        W: Fn(&T) -> DataType + Send + Sync + 'static,
        R: Fn(&Row, &str) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.register::<T, _>(FnMapping::new(write, read));
    }

    /// The mapping registered for `type_id`, if any.
    #[must_use]
    pub fn lookup(&self, type_id: TypeId) -> Option<ScalarMapping> {
        self.mappings.read().get(&type_id).cloned()
    }

    /// The mapping registered for `T`, if any.
    #[must_use]
    pub fn lookup_type<T: 'static>(&self) -> Option<ScalarMapping> {
        self.lookup(TypeId::of::<T>())
    }

    /// Whether a mapping is registered for `type_id`.
    #[must_use]
    pub fn contains(&self, type_id: TypeId) -> bool {
        self.mappings.read().contains_key(&type_id)
    }

    /// Bind `value` into the 1-based `position` of `statement`, choosing the
    /// mapping by the value's runtime type.
    ///
    /// An unmapped type is reported and the slot left unbound; the return
    /// value says whether the slot was bound.
    ///
    /// # Errors
    ///
    /// Returns an error if `position` is outside the statement's placeholders.
    pub fn bind(&self, statement: &mut Statement, position: usize, value: &Value) -> Result<bool> {
        let Some(data) = self.lookup(value.type_id()).and_then(|mapping| mapping.write(value))
        else {
            tracing::error!(
                position,
                type_name = value.type_name(),
                "no scalar mapping registered, argument left unbound"
            );
            return Ok(false);
        };

        statement.bind(position, data)?;
        Ok(true)
    }

    /// Read `column` from `row` using the mapping for `type_id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Mapping`](crate::Error::Mapping) if no mapping is
    /// registered for the type or the column cannot be converted.
    pub fn read(&self, type_id: TypeId, type_name: &str, row: &Row, column: &str) -> Result<Value> {
        let mapping = self
            .lookup(type_id)
            .ok_or_else(|| mapping!("no scalar mapping registered for {type_name}"))?;

        mapping
            .read(row, column)
            .map_err(|e| mapping!("cannot read column '{column}' as {type_name}: {e:#}"))
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mappings = self.mappings.read();
        let mut names: Vec<_> = mappings.values().map(ScalarMapping::type_name).collect();
        names.sort_unstable();
        f.debug_struct("Registry").field("mappings", &names).finish()
    }
}
