//! Connection pooling for database connections.

use std::fmt;
use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::pin::pin;
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};
use std::thread::{self, Thread};
use std::time::{Duration, Instant};

use deadpool::managed::{self, Metrics, PoolError, RecycleResult};

use crate::error::{Error, Result};
use crate::traits::{Connection, Manager};

/// Default maximum number of pooled connections.
pub(crate) const DEFAULT_MAX_SIZE: usize = 10;

/// Default acquire timeout, in milliseconds.
pub(crate) const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Configuration for connection pool behavior.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of open connections, idle or in use.
    pub max_size: usize,

    /// How long [`Pool::acquire`] waits for a connection to be returned.
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            acquire_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}

/// A blocking connection pool.
///
/// Connections are opened lazily through the pool's [`Manager`] up to
/// `max_size`. A connection handed out by [`Pool::acquire`] is never shared:
/// it goes back to the pool only when its [`PooledConnection`] is dropped.
/// Cloning a `Pool` yields another handle to the same connections.
#[derive(Clone)]
pub struct Pool {
    inner: managed::Pool<Connector>,
    config: PoolConfig,
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = self.inner.status();
        f.debug_struct("Pool")
            .field("config", &self.config)
            .field("size", &status.size)
            .field("idle", &status.available)
            .field("closed", &self.inner.is_closed())
            .finish()
    }
}

impl Pool {
    /// Creates a new pool that opens connections with `manager`.
    ///
    /// A `max_size` of zero is treated as one.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying pool cannot be built.
    pub fn new(manager: impl Manager, mut config: PoolConfig) -> Result<Self> {
        config.max_size = config.max_size.max(1);

        let inner = managed::Pool::builder(Connector {
            manager: Box::new(manager),
        })
        .max_size(config.max_size)
        .build()
        .map_err(|err| Error::Driver(err.into()))?;

        Ok(Self { inner, config })
    }

    /// Retrieves a connection from the pool, opening a new one if the pool
    /// has capacity and none are idle.
    ///
    /// Blocks the calling thread for at most the configured acquire timeout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PoolClosed`] after [`Pool::shutdown`],
    /// [`Error::PoolExhausted`] if no connection became available in time, or
    /// the manager's error if a new connection could not be opened.
    pub fn acquire(&self) -> Result<PooledConnection> {
        let timeout = self.config.acquire_timeout;

        let Some(object) = wait_until(self.inner.get(), Instant::now() + timeout) else {
            tracing::error!(?timeout, "connection pool exhausted");
            return Err(Error::PoolExhausted { timeout });
        };

        match object {
            Ok(inner) => Ok(PooledConnection { inner }),
            Err(PoolError::Backend(err)) => {
                tracing::error!("error opening pooled connection: {err}");
                Err(err)
            }
            Err(PoolError::Closed) => Err(Error::PoolClosed),
            Err(PoolError::Timeout(_)) => Err(Error::PoolExhausted { timeout }),
            Err(err) => Err(Error::Driver(anyhow::anyhow!("connection pool error: {err}"))),
        }
    }

    /// Whether the pool accepts new acquisitions.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.inner.is_closed()
    }

    /// Close the pool.
    ///
    /// Idle connections are closed immediately; connections in use are closed
    /// when they are returned. Waiting and future acquisitions fail with
    /// [`Error::PoolClosed`].
    pub fn shutdown(&self) {
        let idle = self.inner.status().available;
        self.inner.close();
        tracing::info!(closed = idle, "connection pool shut down");
    }

    /// Number of open connections, idle or in use.
    #[must_use]
    pub fn size(&self) -> usize {
        self.inner.status().size
    }

    /// Number of idle connections.
    #[must_use]
    pub fn idle(&self) -> usize {
        self.inner.status().available
    }

    /// The pool's configuration.
    #[must_use]
    pub const fn config(&self) -> &PoolConfig {
        &self.config
    }
}

#[derive(Debug)]
struct Connector {
    manager: Box<dyn Manager>,
}

impl managed::Manager for Connector {
    type Type = Box<dyn Connection>;
    type Error = Error;

    async fn create(&self) -> Result<Self::Type> {
        let conn = self.manager.connect()?;
        tracing::debug!("opened pooled connection");
        Ok(conn)
    }

    async fn recycle(&self, _conn: &mut Self::Type, _metrics: &Metrics) -> RecycleResult<Error> {
        Ok(())
    }
}

/// Drive `future` on the calling thread, parking between polls, until it
/// completes or `deadline` passes. The future is dropped on timeout.
fn wait_until<F: Future>(future: F, deadline: Instant) -> Option<F::Output> {
    struct Unpark(Thread);

    impl Wake for Unpark {
        fn wake(self: Arc<Self>) {
            self.0.unpark();
        }

        fn wake_by_ref(self: &Arc<Self>) {
            self.0.unpark();
        }
    }

    let waker = Waker::from(Arc::new(Unpark(thread::current())));
    let mut cx = Context::from_waker(&waker);
    let mut future = pin!(future);

    loop {
        if let Poll::Ready(output) = future.as_mut().poll(&mut cx) {
            return Some(output);
        }

        let now = Instant::now();
        if now >= deadline {
            return None;
        }
        thread::park_timeout(deadline - now);
    }
}

/// A connection retrieved from a pool.
///
/// When dropped, the connection is returned to the pool for reuse.
pub struct PooledConnection {
    inner: managed::Object<Connector>,
}

impl PooledConnection {
    /// Return the connection to the pool.
    pub fn release(self) {
        drop(self);
    }
}

impl fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection").field("conn", &**self.inner).finish_non_exhaustive()
    }
}

impl Deref for PooledConnection {
    type Target = dyn Connection;

    fn deref(&self) -> &Self::Target {
        &**self.inner
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut **self.inner
    }
}
