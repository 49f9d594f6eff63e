use crate::pool::fairy::Fairy;
use crate::pool::lease::{scoped, Lease};
use crate::pool::{ConnectionFactory, ConnectionPool, Error};
use futures_util::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// A pool that does not pool.
///
/// Every acquisition establishes a fresh connection and every scope exit
/// closes it outright: nothing is retained or recycled, and no
/// acquisition ever waits. Useful as a baseline in tests and for callers
/// who want the [`ConnectionPool`] interface without pooling behaviour.
pub struct NullPool<F: ConnectionFactory> {
    factory: Arc<F>,
}

impl<F: ConnectionFactory> NullPool<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory: Arc::new(factory),
        }
    }

    /// Establish a fresh connection.
    ///
    /// # Errors
    ///
    /// [`Error::Connect`] when the factory fails; this pool has no
    /// saturation state, so it never times out.
    pub async fn acquire(&self) -> Result<Lease<F::Connection>, Error> {
        let connection = self
            .factory
            .new_connection()
            .await
            .map_err(Error::Connect)?;
        let fairy = Fairy::new(connection);
        debug!(fairy = %fairy.id(), "established single-use connection");
        Ok(Lease::transient(fairy))
    }

    /// Run `op` against a fresh connection, closing it afterwards
    /// regardless of the outcome. `op`'s error is passed back unchanged.
    pub async fn with_connection<T, E, Op>(&self, op: Op) -> Result<T, E>
    where
        E: From<Error>,
        Op: for<'c> FnOnce(&'c F::Connection) -> BoxFuture<'c, Result<T, E>> + Send,
    {
        let lease = self.acquire().await?;
        scoped(lease, op).await
    }
}

impl<F: ConnectionFactory> Clone for NullPool<F> {
    fn clone(&self) -> Self {
        Self {
            factory: Arc::clone(&self.factory),
        }
    }
}

#[async_trait::async_trait]
impl<F: ConnectionFactory> ConnectionPool for NullPool<F> {
    type Connection = F::Connection;

    async fn acquire(&self) -> Result<Lease<F::Connection>, Error> {
        NullPool::acquire(self).await
    }

    async fn acquire_timeout(&self, _timeout: Duration) -> Result<Lease<F::Connection>, Error> {
        // There is never anything to wait for here.
        NullPool::acquire(self).await
    }
}
