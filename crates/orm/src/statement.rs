use tabula_sql::{Connection, Statement};

use crate::error::Result;
use crate::mapping::Registry;
use crate::value::Value;

/// SQL text with `?` placeholders and the values to bind to them, in order.
#[derive(Debug)]
pub struct StatementOperation {
    sql: String,
    args: Vec<Value>,
}

impl StatementOperation {
    /// Pair `sql` with its positional arguments.
    #[must_use]
    pub fn new(sql: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            args,
        }
    }

    /// The SQL text.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// The arguments, in placeholder order.
    #[must_use]
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Prepare the statement on `conn` and bind every argument through
    /// `registry`, first argument at position 1.
    ///
    /// Arguments without a registered mapping are left unbound and reported;
    /// the statement is still returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver rejects the SQL or there are more
    /// arguments than placeholders.
    pub fn prepare(&self, conn: &mut dyn Connection, registry: &Registry) -> Result<Statement> {
        let mut statement = conn.prepare(&self.sql)?;

        for (index, arg) in self.args.iter().enumerate() {
            registry.bind(&mut statement, index + 1, arg)?;
        }

        let unbound = statement.unbound();
        if !unbound.is_empty() {
            tracing::warn!(sql = %self.sql, ?unbound, "statement has unbound arguments");
        }

        Ok(statement)
    }
}
