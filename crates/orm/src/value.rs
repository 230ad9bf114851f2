//! Runtime-typed argument values.

use std::any::{Any, TypeId, type_name};
use std::fmt;

/// A scalar value of any type, carrying its concrete runtime type.
///
/// Operations hold their arguments as `Value`s; the [`Registry`] picks the
/// mapping for each one from [`Value::type_id`], so an `Option<i32>` and an
/// `i32` resolve to different mappings.
///
/// [`Registry`]: crate::Registry
pub struct Value {
    inner: Box<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Value {
    /// Wrap `value`.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            inner: Box::new(value),
            type_name: type_name::<T>(),
        }
    }

    /// The [`TypeId`] of the wrapped value.
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        (*self.inner).type_id()
    }

    /// The name of the wrapped value's type, for diagnostics.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Whether the wrapped value is a `T`.
    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.inner.is::<T>()
    }

    /// Borrow the wrapped value as a `T`.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref()
    }

    /// Take the wrapped value as a `T`.
    ///
    /// # Errors
    ///
    /// Returns the `Value` unchanged if it does not hold a `T`.
    pub fn downcast<T: Any>(self) -> Result<T, Self> {
        let type_name = self.type_name;
        self.inner.downcast::<T>().map(|value| *value).map_err(|inner| Self { inner, type_name })
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Value").field(&self.type_name).finish()
    }
}

/// Build a `Vec<Value>` from a list of expressions of any scalar type.
///
/// ```ignore
/// let args = params!["Sam", 42, Rank::Vip];
/// ```
#[macro_export]
macro_rules! params {
    () => {
        ::std::vec::Vec::<$crate::Value>::new()
    };
    ($($value:expr),+ $(,)?) => {
        vec![$($crate::Value::new($value)),+]
    };
}
