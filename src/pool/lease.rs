use crate::pool::fairy::Fairy;
use crate::pool::queued::PoolShared;
use crate::pool::PoolableConnection;
use futures_util::future::BoxFuture;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// A connection checked out of a pool.
///
/// The lease derefs to the wrapped connection, so protocol capabilities
/// (e.g. `create_channel` on a [`lapin::Connection`]) pass straight
/// through:
///
/// ```rust,no_run
/// # use fairy_floss::amqp::{AmqpConnectionFactory, BrokerSettings};
/// # use fairy_floss::pool::QueuedPool;
/// # async fn example() -> Result<(), anyhow::Error> {
/// let factory = AmqpConnectionFactory::new_from_config(&BrokerSettings::default())?;
/// let pool = QueuedPool::builder(factory).build();
///
/// let lease = pool.acquire().await?;
/// let channel = lease.create_channel().await?;
/// # drop(channel);
/// lease.release();
/// # Ok(())
/// # }
/// ```
///
/// Exactly one of [`release`](Lease::release) and
/// [`invalidate`](Lease::invalidate) runs per lease. Dropping the lease
/// counts as a normal release, except while the thread is panicking, in
/// which case the connection is not trusted anymore and is invalidated.
/// Callers running fallible work should prefer the pools'
/// `with_connection`, which picks the right disposal from the closure's
/// `Result`.
pub struct Lease<C: PoolableConnection> {
    fairy: Option<Fairy<C>>,
    origin: Origin<C>,
}

enum Origin<C: PoolableConnection> {
    /// Checked out of a [`QueuedPool`](crate::pool::QueuedPool); goes back
    /// through the pool's bookkeeping.
    Pooled(Arc<PoolShared<C>>),
    /// Created for a single use; closed outright on any exit.
    Transient,
}

enum Disposal {
    Release,
    Invalidate,
}

impl<C: PoolableConnection> Lease<C> {
    pub(crate) fn pooled(fairy: Fairy<C>, shared: Arc<PoolShared<C>>) -> Self {
        Self {
            fairy: Some(fairy),
            origin: Origin::Pooled(shared),
        }
    }

    pub(crate) fn transient(fairy: Fairy<C>) -> Self {
        Self {
            fairy: Some(fairy),
            origin: Origin::Transient,
        }
    }

    /// The tracked wrapper around the connection, exposing its identity
    /// and timestamps.
    pub fn fairy(&self) -> &Fairy<C> {
        self.fairy
            .as_ref()
            .expect("lease already disposed of its fairy")
    }

    /// The wrapped connection.
    pub fn connection(&self) -> &C {
        self.fairy().connection()
    }

    /// Hand the connection back for reuse.
    ///
    /// Connections that are no longer open are closed instead of being
    /// pooled, so releasing is always safe.
    pub fn release(mut self) {
        self.finish(Disposal::Release);
    }

    /// Close the connection instead of returning it to the pool.
    ///
    /// Use this when the work performed on the connection failed and its
    /// protocol state cannot be trusted anymore.
    pub fn invalidate(mut self) {
        self.finish(Disposal::Invalidate);
    }

    fn finish(&mut self, disposal: Disposal) {
        let Some(fairy) = self.fairy.take() else {
            return;
        };
        match (&self.origin, disposal) {
            (Origin::Pooled(shared), Disposal::Release) => shared.hand_back(fairy),
            (Origin::Pooled(shared), Disposal::Invalidate) => shared.discard(fairy),
            (Origin::Transient, _) => {
                tracing::debug!(fairy = %fairy.id(), "closing single-use connection");
                fairy.close();
            }
        }
    }
}

impl<C: PoolableConnection> Deref for Lease<C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.connection()
    }
}

impl<C: PoolableConnection> Drop for Lease<C> {
    fn drop(&mut self) {
        if self.fairy.is_none() {
            return;
        }
        // An unwinding caller never got to hand the connection back in an
        // orderly fashion; its protocol state is suspect.
        let disposal = if std::thread::panicking() {
            Disposal::Invalidate
        } else {
            Disposal::Release
        };
        self.finish(disposal);
    }
}

impl<C: PoolableConnection> fmt::Debug for Lease<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease").field("fairy", &self.fairy).finish()
    }
}

/// Run `op` against the leased connection, then dispose of the lease based
/// on the outcome: release on `Ok`, invalidate on `Err`.
///
/// The caller's error is passed back unchanged.
pub(crate) async fn scoped<C, T, E, Op>(lease: Lease<C>, op: Op) -> Result<T, E>
where
    C: PoolableConnection,
    Op: for<'c> FnOnce(&'c C) -> BoxFuture<'c, Result<T, E>>,
{
    let outcome = op(lease.connection()).await;
    match outcome {
        Ok(value) => {
            lease.release();
            Ok(value)
        }
        Err(error) => {
            lease.invalidate();
            Err(error)
        }
    }
}
