use std::any::{Any, type_name};
use std::marker::PhantomData;

use tabula_sql::Row;

use crate::condition::Conditions;
use crate::database::Database;
use crate::entity::Entity;
use crate::error::{Result, mapping};
use crate::mapping::Registry;
use crate::metadata::EntityMeta;
use crate::operation::Operation;
use crate::raw::RawFetch;
use crate::statement::StatementOperation;

/// Fetch at most one entity matching the given conditions.
///
/// Produces `None` when no row matches. Every column field is read through
/// the registry; a field whose type has no mapping fails the fetch unless
/// [`SingleFetch::lenient`] is set.
///
/// ```ignore
/// let user = db.execute_sync(SingleFetch::<User>::new().r#where("name", "Sam"))?;
/// ```
pub struct SingleFetch<E: Entity> {
    conditions: Conditions,
    lenient: bool,
    _marker: PhantomData<fn() -> E>,
}

impl<E: Entity> Default for SingleFetch<E> {
    fn default() -> Self {
        Self {
            conditions: Conditions::new(),
            lenient: false,
            _marker: PhantomData,
        }
    }
}

impl<E: Entity> SingleFetch<E> {
    /// Fetch the first row of the entity's table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Only match rows where `column` equals `value`.
    #[must_use]
    pub fn r#where<V>(mut self, column: impl Into<String>, value: V) -> Self
    where
        V: Any + Send + Sync,
    {
        self.conditions = self.conditions.r#where(column, value);
        self
    }

    /// Leave fields whose type has no registered mapping at their default
    /// value instead of failing the fetch.
    #[must_use]
    pub const fn lenient(mut self) -> Self {
        self.lenient = true;
        self
    }

    /// Build the SELECT statement.
    #[must_use]
    pub fn build(self, meta: &EntityMeta) -> StatementOperation {
        select(meta, self.conditions, Some(1))
    }
}

impl<E: Entity> Operation for SingleFetch<E> {
    type Output = Option<E>;

    fn execute(self, db: &Database) -> Result<Option<E>> {
        let meta = db.metadata().resolve::<E>()?;
        let lenient = self.lenient;

        let mut cursor = RawFetch::from(self.build(&meta)).execute(db)?;
        let row = cursor.next();
        cursor.close();

        row.map(|row| read_entity::<E>(&row, &meta, db.registry(), lenient)).transpose()
    }
}

/// Fetch every entity matching the given conditions, in table order.
pub struct FetchAll<E: Entity> {
    conditions: Conditions,
    limit: Option<u64>,
    lenient: bool,
    _marker: PhantomData<fn() -> E>,
}

impl<E: Entity> Default for FetchAll<E> {
    fn default() -> Self {
        Self {
            conditions: Conditions::new(),
            limit: None,
            lenient: false,
            _marker: PhantomData,
        }
    }
}

impl<E: Entity> FetchAll<E> {
    /// Fetch every row of the entity's table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Only match rows where `column` equals `value`.
    #[must_use]
    pub fn r#where<V>(mut self, column: impl Into<String>, value: V) -> Self
    where
        V: Any + Send + Sync,
    {
        self.conditions = self.conditions.r#where(column, value);
        self
    }

    /// Sets the maximum number of rows to return.
    #[must_use]
    pub const fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Leave fields whose type has no registered mapping at their default
    /// value instead of failing the fetch.
    #[must_use]
    pub const fn lenient(mut self) -> Self {
        self.lenient = true;
        self
    }

    /// Build the SELECT statement.
    #[must_use]
    pub fn build(self, meta: &EntityMeta) -> StatementOperation {
        select(meta, self.conditions, self.limit)
    }
}

impl<E: Entity> Operation for FetchAll<E> {
    type Output = Vec<E>;

    fn execute(self, db: &Database) -> Result<Vec<E>> {
        let meta = db.metadata().resolve::<E>()?;
        let lenient = self.lenient;

        let cursor = RawFetch::from(self.build(&meta)).execute(db)?;
        cursor.map(|row| read_entity::<E>(&row, &meta, db.registry(), lenient)).collect()
    }
}

fn select(meta: &EntityMeta, conditions: Conditions, limit: Option<u64>) -> StatementOperation {
    let mut sql = format!("SELECT * FROM {}", meta.table());

    let predicate = conditions.render();
    if !predicate.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&predicate);
    }

    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }

    let args = conditions.into_values();

    tracing::debug!(
        table = meta.table(),
        sql = %sql,
        param_count = args.len(),
        "Fetch generated SQL"
    );

    StatementOperation::new(sql, args)
}

/// Populate a default `E` from `row`, reading each column field by column
/// name.
fn read_entity<E: Entity>(
    row: &Row,
    meta: &EntityMeta,
    registry: &Registry,
    lenient: bool,
) -> Result<E> {
    let mut entity = E::default();

    for field in meta.column_fields() {
        if lenient && !registry.contains(field.type_id()) {
            tracing::warn!(
                entity = type_name::<E>(),
                field = field.name(),
                type_name = field.type_name(),
                "no scalar mapping registered, field left at its default"
            );
            continue;
        }

        let value = registry.read(field.type_id(), field.type_name(), row, field.column())?;
        entity.set(field.name(), value).map_err(|value| {
            mapping!(
                "field '{}' of {} cannot hold a {}",
                field.name(),
                type_name::<E>(),
                value.type_name()
            )
        })?;
    }

    Ok(entity)
}
