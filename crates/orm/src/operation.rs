use crate::database::Database;
use crate::error::Result;

/// A single statement execution and its result contract.
///
/// An operation is consumed by [`Operation::execute`], so an instance runs at
/// most once; build a new one for every execution. Operations are normally
/// run through [`Database::execute_sync`] or [`Database::execute_async`].
pub trait Operation: Send + Sized + 'static {
    /// What a successful execution produces.
    type Output: Send + 'static;

    /// Run the operation on the calling thread.
    ///
    /// # Errors
    ///
    /// Returns a declaration error before any I/O when the operation cannot
    /// be expressed for its entity, a mapping error when a result column
    /// cannot be read, or an execution error from the pool or driver.
    fn execute(self, db: &Database) -> Result<Self::Output>;
}
