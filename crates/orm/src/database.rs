//! # Execution façade
//!
//! [`Database`] lends pooled connections to operations. Operations run either
//! on the calling thread ([`Database::execute_sync`]) or on the blocking
//! worker pool of a Tokio runtime ([`Database::execute_async`]).

use std::any::type_name;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tabula_sql::sqlite::ConnectOptions;
use tabula_sql::{FromEnv, Pool, PooledConnection};
use tokio::runtime::Handle;
use tracing::instrument;

use crate::error::{Error, Result};
use crate::mapping::Registry;
use crate::metadata::MetadataCache;
use crate::operation::Operation;

/// A boxed future resolving to an operation's result.
pub type FutureResult<T> = BoxFuture<'static, Result<T>>;

/// Runs operations against a connection pool.
///
/// Cloning a `Database` yields another handle to the same pool, registry and
/// metadata cache.
#[derive(Clone, Debug)]
pub struct Database {
    pool: Pool,
    registry: Arc<Registry>,
    metadata: MetadataCache,
    runtime: Option<Handle>,
}

impl Database {
    /// A database backed by `pool`, using the process-wide registry and
    /// metadata cache.
    #[must_use]
    pub fn new(pool: Pool) -> Self {
        Self {
            pool,
            registry: Registry::shared(),
            metadata: MetadataCache::global(),
            runtime: None,
        }
    }

    /// Connect to the `SQLite` database named by the `SQL_*` environment
    /// variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the variables are invalid or the database cannot be
    /// opened.
    pub fn connect() -> Result<Self> {
        let options =
            <ConnectOptions as FromEnv>::from_env().map_err(tabula_sql::Error::from)?;
        Self::connect_with(options)
    }

    /// Connect to the `SQLite` database described by `options`.
    ///
    /// # Errors
    ///
    /// Returns an error if the options are invalid or the database cannot be
    /// opened.
    pub fn connect_with(options: ConnectOptions) -> Result<Self> {
        Ok(Self::new(Pool::sqlite(options)?))
    }

    /// Use `registry` instead of the process-wide one.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = registry;
        self
    }

    /// Use `metadata` instead of the process-wide cache.
    #[must_use]
    pub fn with_metadata(mut self, metadata: MetadataCache) -> Self {
        self.metadata = metadata;
        self
    }

    /// Submit asynchronous operations to `runtime` rather than to the runtime
    /// current at the call site.
    #[must_use]
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Run `operation` on the calling thread.
    ///
    /// # Errors
    ///
    /// Returns the operation's error.
    #[instrument(skip_all, fields(operation = type_name::<O>()))]
    pub fn execute_sync<O: Operation>(&self, operation: O) -> Result<O::Output> {
        operation.execute(self).inspect_err(|e| tracing::error!("operation failed: {e}"))
    }

    /// Run `operation` on a worker thread.
    ///
    /// The operation is submitted immediately; the returned future only
    /// reports its outcome. Dropping the future does not cancel the
    /// operation.
    ///
    /// Fails with [`Error::Worker`] if no Tokio runtime is configured or
    /// current, or if the worker does not complete the operation.
    pub fn execute_async<O: Operation>(&self, operation: O) -> FutureResult<O::Output> {
        let runtime = match self.runtime.clone().map_or_else(Handle::try_current, Ok) {
            Ok(runtime) => runtime,
            Err(e) => {
                let err = Error::Worker(format!("no runtime to run {}: {e}", type_name::<O>()));
                return async move { Err(err) }.boxed();
            }
        };

        let db = self.clone();
        let task = runtime.spawn_blocking(move || db.execute_sync(operation));

        async move {
            task.await.map_err(|e| Error::Worker(format!("operation did not complete: {e}")))?
        }
        .boxed()
    }

    /// Borrow a connection from the pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool is closed or exhausted.
    pub fn acquire(&self) -> Result<PooledConnection> {
        Ok(self.pool.acquire()?)
    }

    /// The scalar mapping registry used by this database.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The metadata cache used by this database.
    #[must_use]
    pub const fn metadata(&self) -> &MetadataCache {
        &self.metadata
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Whether the pool still hands out connections.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.pool.is_open()
    }

    /// Shut the pool down. Subsequent operations fail with
    /// [`tabula_sql::Error::PoolClosed`].
    pub fn close(&self) {
        self.pool.shutdown();
    }
}
