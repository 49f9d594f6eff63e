//! The trait seams the pools are generic over.
//!
//! These are pure interfaces: [`PoolableConnection`] is the open/close
//! capability a pooled connection must expose, [`ConnectionFactory`] is the
//! async seam that mints them, and [`ConnectionPool`] is the shared acquire
//! surface both pool flavours present. All behaviour lives in the impls
//! (see [`QueuedPool`](crate::pool::QueuedPool),
//! [`NullPool`](crate::pool::NullPool), and
//! [`AmqpConnectionFactory`](crate::amqp::AmqpConnectionFactory)).

use crate::pool::error::Error;
use crate::pool::lease::Lease;
use std::time::Duration;

/// A connection that a pool can health-check and tear down.
///
/// `close` is synchronous on purpose: pool bookkeeping never awaits
/// connection teardown, so it runs under a plain `std::sync::Mutex` with no
/// lock held across an `.await`.
pub trait PoolableConnection: Send + Sync + 'static {
    /// Whether the connection is still usable.
    fn is_open(&self) -> bool;

    /// Dispose of the connection.
    fn close(&self);
}

/// Establishes fresh connections on behalf of a pool.
#[async_trait::async_trait]
pub trait ConnectionFactory: Send + Sync + 'static {
    /// The kind of connection this factory produces.
    type Connection: PoolableConnection;

    /// Establish a new connection, or report why it could not be made.
    async fn new_connection(&self) -> Result<Self::Connection, anyhow::Error>;
}

/// The shared acquire interface implemented by both pool flavours.
#[async_trait::async_trait]
pub trait ConnectionPool: Send + Sync {
    /// The kind of connection handed out of this pool.
    type Connection: PoolableConnection;

    /// Check a connection out of the pool.
    async fn acquire(&self) -> Result<Lease<Self::Connection>, Error>;

    /// Check a connection out, waiting at most `timeout` for a slot.
    async fn acquire_timeout(&self, timeout: Duration) -> Result<Lease<Self::Connection>, Error>;
}
