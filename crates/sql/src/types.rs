//! Wire values exchanged with a driver.

use crate::error::{Error, Result};

/// A scalar value sent to, or read back from, the database.
///
/// Temporal values travel as text in the formats noted on each variant so
/// that drivers without native date types can store them losslessly.
#[derive(Debug, Clone, PartialEq)]
pub enum DataType {
    /// SQL `NULL`.
    Null,
    /// Boolean value.
    Boolean(bool),
    /// 32-bit signed integer.
    Int32(i32),
    /// 64-bit signed integer.
    Int64(i64),
    /// 32-bit floating point.
    Float(f32),
    /// 64-bit floating point.
    Double(f64),
    /// UTF-8 text.
    Str(String),
    /// Raw bytes.
    Binary(Vec<u8>),
    /// Calendar date, `%Y-%m-%d`.
    Date(String),
    /// Time of day, `%H:%M:%S%.f`.
    Time(String),
    /// Date and time, `%Y-%m-%d %H:%M:%S%.f` or RFC 3339.
    Timestamp(String),
}

impl DataType {
    /// Whether the value is SQL `NULL`.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

/// A named column value within a [`Row`].
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Column name as reported by the driver.
    pub name: String,

    /// Column value.
    pub value: DataType,
}

/// A single result row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    /// Columns in result order.
    pub fields: Vec<Field>,
}

impl Row {
    /// Look up a column by name.
    ///
    /// An exact match is preferred; otherwise the first column whose name
    /// matches ignoring ASCII case is returned, since SQL identifiers are
    /// case-insensitive.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&DataType> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .or_else(|| self.fields.iter().find(|field| field.name.eq_ignore_ascii_case(name)))
            .map(|field| &field.value)
    }

    /// Column names in result order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|field| field.name.as_str())
    }
}

/// A prepared statement: SQL text plus one argument slot per `?` placeholder.
///
/// Slots are addressed with 1-based positions. A slot left unbound is handed
/// to the driver as-is; what an unbound placeholder means is driver-specific
/// (SQLite treats it as `NULL`).
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    sql: String,
    slots: Vec<Option<DataType>>,
}

impl Statement {
    /// Create a statement with `parameter_count` empty argument slots.
    #[must_use]
    pub fn new(sql: impl Into<String>, parameter_count: usize) -> Self {
        Self {
            sql: sql.into(),
            slots: vec![None; parameter_count],
        }
    }

    /// The statement's SQL text.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Number of placeholders in the statement.
    #[must_use]
    pub const fn parameter_count(&self) -> usize {
        self.slots.len()
    }

    /// Bind `value` to the 1-based `position`, replacing any earlier binding.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BindOutOfRange`] if `position` is zero or exceeds the
    /// number of placeholders.
    pub fn bind(&mut self, position: usize, value: DataType) -> Result<()> {
        let count = self.slots.len();
        let slot = position
            .checked_sub(1)
            .and_then(|index| self.slots.get_mut(index))
            .ok_or(Error::BindOutOfRange { position, count })?;
        *slot = Some(value);
        Ok(())
    }

    /// Argument slots in positional order.
    #[must_use]
    pub fn params(&self) -> &[Option<DataType>] {
        &self.slots
    }

    /// 1-based positions that have no bound value.
    #[must_use]
    pub fn unbound(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_none())
            .map(|(index, _)| index + 1)
            .collect()
    }
}
