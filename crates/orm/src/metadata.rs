//! # Entity metadata
//!
//! [`EntityMeta`] is the validated, resolved form of an entity declaration:
//! table name, column fields with overrides applied, insert fields and unique
//! key. Resolution is pure, so the [`MetadataCache`] memoizes it per type and
//! may evict and recompute entries transparently.

use std::any::TypeId;
use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use moka::sync::Cache;

use crate::entity::{ColumnField, Entity};
use crate::error::{Error, Result, declaration};

static GLOBAL: LazyLock<MetadataCache> = LazyLock::new(MetadataCache::new);

const MAX_ENTITIES: u64 = 10_000;

/// Resolved metadata for one entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityMeta {
    table: &'static str,
    fields: Vec<ColumnField>,
    insert: Vec<usize>,
    unique: Option<usize>,
}

impl EntityMeta {
    /// Resolve and validate the declaration of `T`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Declaration`] if the table name is empty, a field is
    /// declared twice, two fields share a column, or a column override,
    /// insert field or unique key names an unknown field.
    pub fn resolve<T: Entity>() -> Result<Self> {
        let entity = std::any::type_name::<T>();
        if T::TABLE.trim().is_empty() {
            return Err(declaration!("{entity} does not declare a table"));
        }

        let mut fields = T::fields();

        let mut names = HashSet::new();
        if let Some(dup) = fields.iter().find(|field| !names.insert(field.name())) {
            return Err(declaration!("{entity} declares field '{}' twice", dup.name()));
        }

        for (name, column) in T::column_overrides() {
            let field = fields.iter_mut().find(|field| field.name() == *name).ok_or_else(|| {
                declaration!("{entity} overrides the column of unknown field '{name}'")
            })?;
            *field = field.clone().with_column(*column);
        }

        let mut columns = HashSet::new();
        if let Some(dup) =
            fields.iter().find(|field| !columns.insert(field.column().to_ascii_lowercase()))
        {
            let column = dup.column();
            return Err(declaration!("{entity} maps more than one field to column '{column}'"));
        }

        let position = |name: &str| fields.iter().position(|field| field.name() == name);

        let mut insert = Vec::with_capacity(T::insert_fields().len());
        for &name in T::insert_fields() {
            let index = position(name)
                .ok_or_else(|| declaration!("{entity} inserts unknown field '{name}'"))?;
            if insert.contains(&index) {
                return Err(declaration!("{entity} inserts field '{name}' twice"));
            }
            insert.push(index);
        }

        let unique = T::unique_key()
            .map(|name| {
                position(name).ok_or_else(|| declaration!("{entity} has unknown unique key '{name}'"))
            })
            .transpose()?;

        Ok(Self {
            table: T::TABLE,
            fields,
            insert,
            unique,
        })
    }

    /// Table name.
    #[must_use]
    pub const fn table(&self) -> &'static str {
        self.table
    }

    /// Column fields in declaration order.
    #[must_use]
    pub fn column_fields(&self) -> &[ColumnField] {
        &self.fields
    }

    /// Fields written by an insert, in declared order.
    pub fn insert_fields(&self) -> impl Iterator<Item = &ColumnField> {
        self.insert.iter().map(|&index| &self.fields[index])
    }

    /// The unique key field, if declared.
    #[must_use]
    pub fn unique_key_field(&self) -> Option<&ColumnField> {
        self.unique.map(|index| &self.fields[index])
    }

    /// Look up a field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&ColumnField> {
        self.fields.iter().find(|field| field.name() == name)
    }
}

/// Memoizes [`EntityMeta`] per entity type.
///
/// Clones share the same cache. Concurrent first use of a type resolves it
/// once; waiting callers receive the same value.
#[derive(Clone)]
pub struct MetadataCache {
    cache: Cache<TypeId, Arc<EntityMeta>>,
}

impl MetadataCache {
    /// An empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache: Cache::builder().max_capacity(MAX_ENTITIES).build(),
        }
    }

    /// The process-wide cache.
    #[must_use]
    pub fn global() -> Self {
        GLOBAL.clone()
    }

    /// Metadata for `T`, resolving it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Declaration`] if the declaration of `T` is invalid.
    /// Failed resolutions are not cached.
    pub fn resolve<T: Entity>(&self) -> Result<Arc<EntityMeta>> {
        self.cache
            .try_get_with(TypeId::of::<T>(), || {
                tracing::debug!(entity = std::any::type_name::<T>(), "resolving entity metadata");
                EntityMeta::resolve::<T>().map(Arc::new)
            })
            .map_err(|e| match &*e {
                Error::Declaration(msg) => Error::Declaration(msg.clone()),
                other => Error::Declaration(other.to_string()),
            })
    }

    /// Column fields of `T`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Declaration`] if the declaration of `T` is invalid.
    pub fn column_fields<T: Entity>(&self) -> Result<Vec<ColumnField>> {
        Ok(self.resolve::<T>()?.column_fields().to_vec())
    }

    /// Table name of `T`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Declaration`] if the declaration of `T` is invalid.
    pub fn table_name<T: Entity>(&self) -> Result<&'static str> {
        Ok(self.resolve::<T>()?.table())
    }

    /// Unique key field of `T`; `None` if it declares none.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Declaration`] if the declaration of `T` is invalid.
    pub fn unique_key_field<T: Entity>(&self) -> Result<Option<ColumnField>> {
        Ok(self.resolve::<T>()?.unique_key_field().cloned())
    }

    /// Insert fields of `T`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Declaration`] if the declaration of `T` is invalid.
    pub fn insert_fields<T: Entity>(&self) -> Result<Vec<ColumnField>> {
        Ok(self.resolve::<T>()?.insert_fields().cloned().collect())
    }

    /// Drop every cached entry.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }
}

impl Default for MetadataCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MetadataCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataCache").field("entries", &self.cache.entry_count()).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::value::Value;

    crate::entity! {
        table = "players",
        columns = [(joined_at, "joined")],
        insert = ["id", "name", "joined_at"],
        unique = "id",
        #[derive(Debug, Clone, Default)]
        pub struct Player {
            pub id: i32,
            pub name: String,
            pub score: f64,
            pub joined_at: String,
        }
    }

    crate::entity! {
        table = "bad",
        insert = ["missing"],
        #[derive(Debug, Default)]
        pub struct BadInsert {
            pub id: i32,
        }
    }

    crate::entity! {
        table = "bad",
        unique = "missing",
        #[derive(Debug, Default)]
        pub struct BadUnique {
            pub id: i32,
        }
    }

    crate::entity! {
        table = "bad",
        columns = [(id, "name")],
        #[derive(Debug, Default)]
        pub struct BadColumns {
            pub id: i32,
            pub name: String,
        }
    }

    crate::entity! {
        table = "",
        #[derive(Debug, Default)]
        pub struct NoTable {
            pub id: i32,
        }
    }

    static RESOLUTIONS: AtomicUsize = AtomicUsize::new(0);

    // Hand-written entity that counts how often its declaration is read.
    #[derive(Debug, Default)]
    struct Counted;

    impl Entity for Counted {
        const TABLE: &'static str = "counted";

        fn fields() -> Vec<ColumnField> {
            RESOLUTIONS.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(10));
            vec![ColumnField::new::<i32>("id")]
        }

        fn insert_fields() -> &'static [&'static str] {
            &["id"]
        }

        fn get(&self, _field: &str) -> Option<Value> {
            None
        }

        fn set(&mut self, _field: &str, value: Value) -> std::result::Result<(), Value> {
            Err(value)
        }
    }

    #[test]
    fn resolves_declaration() {
        let meta = EntityMeta::resolve::<Player>().unwrap();

        assert_eq!(meta.table(), "players");
        assert_eq!(meta.column_fields().len(), 4);
        assert_eq!(meta.field("joined_at").unwrap().column(), "joined");
        assert_eq!(meta.field("name").unwrap().column(), "name");
        assert_eq!(meta.unique_key_field().unwrap().name(), "id");

        let insert: Vec<_> = meta.insert_fields().map(ColumnField::column).collect();
        assert_eq!(insert, vec!["id", "name", "joined"]);
    }

    #[test]
    fn invalid_declarations() {
        let err = EntityMeta::resolve::<BadInsert>().unwrap_err();
        assert!(err.is_declaration());
        assert!(err.to_string().contains("inserts unknown field 'missing'"));

        let err = EntityMeta::resolve::<BadUnique>().unwrap_err();
        assert!(err.to_string().contains("unknown unique key 'missing'"));

        let err = EntityMeta::resolve::<BadColumns>().unwrap_err();
        assert!(err.to_string().contains("column 'name'"));

        let err = EntityMeta::resolve::<NoTable>().unwrap_err();
        assert!(err.to_string().contains("does not declare a table"));
    }

    #[test]
    fn cache_lookups() {
        let cache = MetadataCache::new();

        assert_eq!(cache.table_name::<Player>().unwrap(), "players");
        assert_eq!(cache.column_fields::<Player>().unwrap().len(), 4);
        assert_eq!(cache.unique_key_field::<Player>().unwrap().unwrap().name(), "id");
        assert_eq!(cache.insert_fields::<Player>().unwrap().len(), 3);
        assert!(cache.unique_key_field::<BadColumns>().unwrap_err().is_declaration());

        let first = cache.resolve::<Player>().unwrap();
        assert!(Arc::ptr_eq(&first, &cache.resolve::<Player>().unwrap()));
    }

    #[test]
    fn concurrent_first_use() {
        let cache = MetadataCache::new();

        let resolved: Vec<_> = std::thread::scope(|scope| {
            let handles: Vec<_> =
                (0..8).map(|_| scope.spawn(|| cache.resolve::<Counted>().unwrap())).collect();
            handles.into_iter().map(|handle| handle.join().unwrap()).collect()
        });

        assert_eq!(RESOLUTIONS.load(Ordering::SeqCst), 1);
        assert!(resolved.iter().all(|meta| Arc::ptr_eq(meta, &resolved[0])));
        assert_eq!(resolved[0].table(), "counted");

        cache.invalidate_all();
        assert_eq!(cache.table_name::<Counted>().unwrap(), "counted");
    }
}
