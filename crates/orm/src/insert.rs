use std::any::type_name;

use crate::database::Database;
use crate::entity::Entity;
use crate::error::{Result, declaration};
use crate::metadata::EntityMeta;
use crate::operation::Operation;
use crate::raw::RawVoid;
use crate::statement::StatementOperation;

/// Insert an entity's declared insert fields as a new row.
pub struct Insert<E: Entity> {
    entity: E,
}

impl<E: Entity> Insert<E> {
    /// Insert `entity`.
    #[must_use]
    pub const fn new(entity: E) -> Self {
        Self { entity }
    }

    /// Build the INSERT statement.
    ///
    /// # Errors
    ///
    /// Returns a declaration error if the entity declares no insert fields.
    pub fn build(self, meta: &EntityMeta) -> Result<StatementOperation> {
        let fields: Vec<_> = meta.insert_fields().collect();
        if fields.is_empty() {
            return Err(declaration!("{} declares no insert fields", type_name::<E>()));
        }

        let columns = fields.iter().map(|field| field.column()).collect::<Vec<_>>().join(", ");
        let placeholders = vec!["?"; fields.len()].join(", ");
        let sql = format!("INSERT INTO {} ({columns}) VALUES ({placeholders})", meta.table());

        let args = fields
            .iter()
            .map(|field| {
                self.entity.get(field.name()).ok_or_else(|| {
                    declaration!("{} has no readable field '{}'", type_name::<E>(), field.name())
                })
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            table = meta.table(),
            sql = %sql,
            param_count = args.len(),
            "Insert generated SQL"
        );

        Ok(StatementOperation::new(sql, args))
    }
}

impl<E: Entity> Operation for Insert<E> {
    type Output = ();

    fn execute(self, db: &Database) -> Result<()> {
        let meta = db.metadata().resolve::<E>()?;
        RawVoid::from(self.build(&meta)?).execute(db)?;
        Ok(())
    }
}
