use std::any::{TypeId, type_name};

use crate::value::Value;

/// Declares a database-backed entity with an automatic `Entity` trait
/// implementation.
///
/// Only `table` is required. `columns` overrides the column name of
/// individual fields (a field maps to a column of its own name otherwise),
/// `insert` lists the fields written by an insert (all fields when omitted),
/// and `unique` names the field identifying a single row.
///
/// Every field type must be `Clone + Send + Sync + 'static`, and the entity
/// must implement `Default`: fetched rows are read into a default instance.
///
/// # Examples
///
/// ```ignore
/// entity! {
///     table = "users",
///     columns = [(first_join, "joined")],
///     insert = ["id", "name", "rank", "first_join"],
///     unique = "id",
///     #[derive(Debug, Clone, Default)]
///     pub struct User {
///         pub id: Uuid,
///         pub name: String,
///         pub rank: Rank,
///         pub first_join: NaiveDateTime,
///     }
/// }
/// ```
#[macro_export]
macro_rules! entity {
    (
        table = $table:literal,
        $(columns = [$( ($col_field:ident, $col_name:literal) ),* $(,)?],)?
        $(insert = [$($insert:literal),* $(,)?],)?
        $(unique = $unique:literal,)?
        $(#[$meta:meta])*
        pub struct $struct_name:ident {
            $(
                $(#[$field_meta:meta])*
                pub $field_name:ident : $field_type:ty
            ),* $(,)?
        }
    ) => {
        #[allow(missing_docs)]
        $(#[$meta])*
        pub struct $struct_name {
            $(
                $(#[$field_meta])*
                pub $field_name : $field_type
            ),*
        }

        impl $crate::Entity for $struct_name {
            const TABLE: &'static str = $table;

            fn fields() -> ::std::vec::Vec<$crate::ColumnField> {
                vec![$( $crate::ColumnField::new::<$field_type>(stringify!($field_name)) ),*]
            }

            fn column_overrides() -> &'static [(&'static str, &'static str)] {
                &[$($( (stringify!($col_field), $col_name) ),*)?]
            }

            fn insert_fields() -> &'static [&'static str] {
                $crate::__entity_insert!(
                    $(declared [$($insert),*])?
                    default [$(stringify!($field_name)),*]
                )
            }

            fn unique_key() -> ::std::option::Option<&'static str> {
                $crate::__entity_unique!($($unique)?)
            }

            fn get(&self, field: &str) -> ::std::option::Option<$crate::Value> {
                match field {
                    $(
                        stringify!($field_name) => ::std::option::Option::Some(
                            $crate::Value::new(::std::clone::Clone::clone(&self.$field_name)),
                        ),
                    )*
                    _ => ::std::option::Option::None,
                }
            }

            fn set(
                &mut self,
                field: &str,
                value: $crate::Value,
            ) -> ::std::result::Result<(), $crate::Value> {
                match field {
                    $(
                        stringify!($field_name) => {
                            self.$field_name = value.downcast::<$field_type>()?;
                            ::std::result::Result::Ok(())
                        }
                    )*
                    _ => ::std::result::Result::Err(value),
                }
            }
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __entity_insert {
    (declared [$($insert:literal),*] default [$($all:expr),*]) => {
        &[$($insert),*]
    };
    (default [$($all:expr),*]) => {
        &[$($all),*]
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __entity_unique {
    () => {
        ::std::option::Option::None
    };
    ($unique:literal) => {
        ::std::option::Option::Some($unique)
    };
}

/// Trait for database-backed types.
///
/// Typically implemented via the `entity!` macro rather than manually.
pub trait Entity: Default + Send + Sync + 'static {
    /// The database table name for this entity.
    const TABLE: &'static str;

    /// Column-bearing fields in declaration order, each mapped to a column of
    /// its own name.
    fn fields() -> Vec<ColumnField>;

    /// `(field, column)` pairs overriding the default column name.
    #[must_use]
    fn column_overrides() -> &'static [(&'static str, &'static str)] {
        &[]
    }

    /// Fields written by an insert, in column order.
    fn insert_fields() -> &'static [&'static str];

    /// The field identifying a single row, if any.
    #[must_use]
    fn unique_key() -> Option<&'static str> {
        None
    }

    /// A copy of the named field's value, or `None` for an unknown field.
    fn get(&self, field: &str) -> Option<Value>;

    /// Assign the named field.
    ///
    /// # Errors
    ///
    /// Hands `value` back if the field is unknown or the value is not of the
    /// field's type.
    fn set(&mut self, field: &str, value: Value) -> Result<(), Value>;
}

/// One mapped attribute of an [`Entity`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnField {
    name: &'static str,
    column: &'static str,
    type_id: TypeId,
    type_name: &'static str,
}

impl ColumnField {
    /// A field of type `T` stored in a column named after the field.
    #[must_use]
    pub fn new<T: 'static>(name: &'static str) -> Self {
        Self {
            name,
            column: name,
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
        }
    }

    /// Store the field in `column` instead.
    #[must_use]
    pub const fn with_column(mut self, column: &'static str) -> Self {
        self.column = column;
        self
    }

    /// Field name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Column name.
    #[must_use]
    pub const fn column(&self) -> &'static str {
        self.column
    }

    /// Runtime type of the field's values.
    #[must_use]
    pub const fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Name of the field's type, for diagnostics.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }
}
