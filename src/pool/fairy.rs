use crate::pool::PoolableConnection;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

/// A tracked wrapper around one live connection.
///
/// A fairy binds the connection to the timestamps the pool consults when
/// deciding whether it is still worth handing out, plus a unique id so
/// individual connections can be told apart in logs and tests.
///
/// A fairy is owned by the pool while idle and by exactly one
/// [`Lease`](crate::pool::Lease) while checked out; it is never visible to
/// two callers at the same time.
pub struct Fairy<C: PoolableConnection> {
    connection: C,
    id: Uuid,
    created_at: Instant,
    released_at: Option<Instant>,
}

impl<C: PoolableConnection> Fairy<C> {
    pub(crate) fn new(connection: C) -> Self {
        Self {
            connection,
            id: Uuid::new_v4(),
            created_at: Instant::now(),
            released_at: None,
        }
    }

    /// The wrapped connection.
    pub fn connection(&self) -> &C {
        &self.connection
    }

    /// Unique identity of this particular connection.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// When the underlying connection was established.
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// When the connection was last handed back to the pool, if ever.
    pub fn released_at(&self) -> Option<Instant> {
        self.released_at
    }

    /// How long the underlying connection has been alive.
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// How long the connection has been sitting idle since its last
    /// release, if it has ever been released.
    pub fn idle_for(&self) -> Option<Duration> {
        self.released_at.map(|at| at.elapsed())
    }

    pub(crate) fn mark_released(&mut self, at: Instant) {
        self.released_at = Some(at);
    }

    /// Tear the connection down and drop it.
    pub(crate) fn close(self) {
        self.connection.close();
    }
}

impl<C: PoolableConnection> fmt::Debug for Fairy<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fairy")
            .field("id", &self.id)
            .field("age", &self.age())
            .field("idle_for", &self.idle_for())
            .finish_non_exhaustive()
    }
}
