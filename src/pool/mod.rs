//! Pooling for expensive-to-create broker connections.
//!
//! Two flavours share one interface:
//! - [`QueuedPool`] keeps up to `max_size` connections warm, allows
//!   `max_overflow` extra connections under burst load, replaces
//!   connections by age (`recycle`) and idle time (`stale`) lazily at
//!   hand-out, and bounds saturated acquisitions with a timeout.
//! - [`NullPool`] creates a fresh connection per acquisition and closes it
//!   on release.
//!
//! ```rust,no_run
//! use fairy_floss::amqp::{AmqpConnectionFactory, BrokerSettings};
//! use fairy_floss::pool::QueuedPool;
//! use std::time::Duration;
//!
//! async fn example() -> anyhow::Result<()> {
//!     let factory = AmqpConnectionFactory::new_from_config(&BrokerSettings::default())?;
//!
//!     let pool = QueuedPool::builder(factory)
//!         .max_size(10)
//!         .max_overflow(10)
//!         .recycle(Duration::from_secs(3600))
//!         .stale(Duration::from_secs(45))
//!         .timeout(Duration::from_secs(10))
//!         .build();
//!
//!     let lease = pool.acquire().await?;
//!     let channel = lease.create_channel().await?;
//!     // ... declare, publish, consume ...
//!     # drop(channel);
//!     lease.release();
//!     Ok(())
//! }
//! ```
//!
//! Connections checked out of a pool come wrapped in a [`Lease`]: dropping
//! it (or calling [`Lease::release`]) hands the connection back, while
//! [`Lease::invalidate`] closes it for good. The pools' `with_connection`
//! runs a closure and picks the right disposal from its `Result`, so a
//! failed unit of work never leaks a suspect connection back into the
//! idle set.

mod error;
mod fairy;
mod lease;
mod null;
mod queued;
mod traits;

pub use error::Error;
pub use fairy::Fairy;
pub use lease::Lease;
pub use null::NullPool;
pub use queued::{QueuedPool, QueuedPoolBuilder};
pub use traits::{ConnectionFactory, ConnectionPool, PoolableConnection};
