use std::any::Any;

use indexmap::IndexMap;

use crate::value::Value;

/// Column equality predicates forming a `WHERE` clause.
///
/// Predicates render in the order their columns were first added; setting a
/// column again replaces its value but keeps its position.
///
/// ```ignore
/// let conditions = Conditions::new().r#where("name", "Sam").r#where("rank", Rank::Vip);
/// assert_eq!(conditions.render(), "name=? AND rank=?");
/// ```
#[derive(Debug, Default)]
pub struct Conditions {
    predicates: IndexMap<String, Value>,
}

impl Conditions {
    /// An empty condition set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `column` to equal `value`.
    #[must_use]
    pub fn r#where<V>(mut self, column: impl Into<String>, value: V) -> Self
    where
        V: Any + Send + Sync,
    {
        self.insert(column, Value::new(value));
        self
    }

    /// Require `column` to equal an already wrapped `value`.
    pub fn insert(&mut self, column: impl Into<String>, value: Value) {
        self.predicates.insert(column.into(), value);
    }

    /// Render as `col1=? AND col2=?`, or an empty string if there are no
    /// predicates.
    #[must_use]
    pub fn render(&self) -> String {
        self.predicates.keys().map(|column| format!("{column}=?")).collect::<Vec<_>>().join(" AND ")
    }

    /// Number of predicates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    /// Whether there are no predicates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Columns in render order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.predicates.keys().map(String::as_str)
    }

    /// Values in render order, for positional binding.
    #[must_use]
    pub fn into_values(self) -> Vec<Value> {
        self.predicates.into_values().collect()
    }
}
