use std::any::{Any, type_name};

use crate::condition::Conditions;
use crate::database::Database;
use crate::entity::Entity;
use crate::error::{Result, declaration};
use crate::metadata::EntityMeta;
use crate::operation::Operation;
use crate::raw::RawVoid;
use crate::statement::StatementOperation;

/// Write one field of an entity back to its row.
///
/// The row is targeted by the caller's conditions and, when the entity
/// declares one, by its unique key. The statement takes the form
/// `UPDATE <table> SET <column>=? WHERE <conditions> AND <unique>=?`, with the
/// new value bound first and the unique key value last.
///
/// ```ignore
/// user.rank = Rank::Vip;
/// db.execute_sync(Update::new(user, "rank"))?;
/// ```
pub struct Update<E: Entity> {
    entity: E,
    field: String,
    conditions: Conditions,
}

impl<E: Entity> Update<E> {
    /// Update `field` of `entity`.
    #[must_use]
    pub fn new(entity: E, field: impl Into<String>) -> Self {
        Self {
            entity,
            field: field.into(),
            conditions: Conditions::new(),
        }
    }

    /// Only update rows where `column` equals `value`.
    #[must_use]
    pub fn r#where<V>(mut self, column: impl Into<String>, value: V) -> Self
    where
        V: Any + Send + Sync,
    {
        self.conditions = self.conditions.r#where(column, value);
        self
    }

    /// Build the UPDATE statement.
    ///
    /// # Errors
    ///
    /// Returns a declaration error if the field is unknown, or if the entity
    /// has no unique key and no conditions were given, since the update would
    /// touch every row.
    pub fn build(self, meta: &EntityMeta) -> Result<StatementOperation> {
        let entity = type_name::<E>();

        let target = meta
            .field(&self.field)
            .ok_or_else(|| declaration!("{entity} has no field '{}'", self.field))?;

        let unique = meta.unique_key_field();
        if unique.is_none() && self.conditions.is_empty() {
            return Err(declaration!(
                "{entity} declares no unique key; updating '{}' needs at least one condition",
                self.field
            ));
        }

        let value = self
            .entity
            .get(target.name())
            .ok_or_else(|| declaration!("{entity} has no readable field '{}'", target.name()))?;

        let mut predicate = self.conditions.render();
        let key = match unique {
            Some(key) => {
                if !predicate.is_empty() {
                    predicate.push_str(" AND ");
                }
                predicate.push_str(key.column());
                predicate.push_str("=?");

                let value = self.entity.get(key.name()).ok_or_else(|| {
                    declaration!("{entity} has no readable unique key '{}'", key.name())
                })?;
                Some(value)
            }
            None => None,
        };

        let sql = format!("UPDATE {} SET {}=? WHERE {predicate}", meta.table(), target.column());

        let mut args = Vec::with_capacity(self.conditions.len() + 2);
        args.push(value);
        args.extend(self.conditions.into_values());
        args.extend(key);

        tracing::debug!(
            table = meta.table(),
            sql = %sql,
            param_count = args.len(),
            "Update generated SQL"
        );

        Ok(StatementOperation::new(sql, args))
    }
}

impl<E: Entity> Operation for Update<E> {
    type Output = u64;

    fn execute(self, db: &Database) -> Result<u64> {
        let meta = db.metadata().resolve::<E>()?;
        RawVoid::from(self.build(&meta)?).execute(db)
    }
}
