use crate::pool::fairy::Fairy;
use crate::pool::lease::{scoped, Lease};
use crate::pool::{ConnectionFactory, ConnectionPool, Error, PoolableConnection};
use futures_util::future::BoxFuture;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::debug;

/// Default roof for how many connections are steadily pooled.
const DEFAULT_MAX_SIZE: usize = 10;

/// Default allowance for burst connections beyond the steady roof.
const DEFAULT_MAX_OVERFLOW: usize = 10;

/// A bounded, recycling connection pool.
///
/// Up to `max_size` connections are kept warm and reused in
/// most-recently-released order. Under load, up to `max_overflow`
/// additional connections are created to absorb the burst; those are
/// closed on release instead of being retained. Once
/// `max_size + max_overflow` connections are checked out, further
/// acquisitions wait for a slot to free up, bounded by the configured or
/// per-call timeout.
///
/// Idle connections are revalidated at hand-out time: anything older than
/// `recycle`, idle longer than `stale`, or no longer open is closed and
/// replaced. There is no background sweeper.
///
/// The pool is cheap to clone; clones share the same state.
pub struct QueuedPool<F: ConnectionFactory> {
    factory: Arc<F>,
    shared: Arc<PoolShared<F::Connection>>,
}

/// Configures and builds a [`QueuedPool`].
pub struct QueuedPoolBuilder<F: ConnectionFactory> {
    factory: F,
    max_size: usize,
    max_overflow: usize,
    recycle: Option<Duration>,
    stale: Option<Duration>,
    timeout: Option<Duration>,
}

impl<F: ConnectionFactory> QueuedPoolBuilder<F> {
    fn new(factory: F) -> Self {
        Self {
            factory,
            max_size: DEFAULT_MAX_SIZE,
            max_overflow: DEFAULT_MAX_OVERFLOW,
            recycle: None,
            stale: None,
            timeout: None,
        }
    }

    /// Change how many connections are steadily pooled.
    ///
    /// Default: 10.
    #[must_use]
    pub fn max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    /// Change how many burst connections may exist beyond
    /// [`max_size`](QueuedPoolBuilder::max_size). Burst connections are
    /// closed on release instead of being retained.
    ///
    /// Default: 10.
    #[must_use]
    pub fn max_overflow(mut self, max_overflow: usize) -> Self {
        self.max_overflow = max_overflow;
        self
    }

    /// Close pooled connections older than this instead of handing them
    /// out, measured from when the connection was established.
    ///
    /// A zero duration disables age-based replacement, which is also the
    /// default.
    #[must_use]
    pub fn recycle(mut self, recycle: Duration) -> Self {
        self.recycle = (!recycle.is_zero()).then_some(recycle);
        self
    }

    /// Close pooled connections that sat idle longer than this instead of
    /// handing them out, measured from their last release.
    ///
    /// A zero duration disables idle-based replacement, which is also the
    /// default.
    #[must_use]
    pub fn stale(mut self, stale: Duration) -> Self {
        self.stale = (!stale.is_zero()).then_some(stale);
        self
    }

    /// How long [`acquire`](QueuedPool::acquire) may wait for a slot when
    /// the pool is saturated.
    ///
    /// A zero duration means acquisitions on a saturated pool fail
    /// immediately, which is also the default.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    /// Finalize the builder.
    pub fn build(self) -> QueuedPool<F> {
        QueuedPool {
            factory: Arc::new(self.factory),
            shared: Arc::new(PoolShared {
                max_size: self.max_size,
                max_overflow: self.max_overflow,
                recycle: self.recycle,
                stale: self.stale,
                default_timeout: self.timeout,
                state: Mutex::new(PoolState {
                    idle: Vec::with_capacity(self.max_size),
                    in_use: 0,
                }),
                slot_freed: Notify::new(),
            }),
        }
    }
}

impl<F: ConnectionFactory> QueuedPool<F> {
    /// Start configuring a pool fed by `factory`.
    pub fn builder(factory: F) -> QueuedPoolBuilder<F> {
        QueuedPoolBuilder::new(factory)
    }

    /// Check a connection out of the pool.
    ///
    /// Reuses the most recently released idle connection when a valid one
    /// exists, establishes a fresh one while under the connection cap, and
    /// otherwise waits for up to the configured timeout (failing
    /// immediately when none is configured).
    ///
    /// # Errors
    ///
    /// [`Error::Timeout`] when the pool stayed saturated for the whole
    /// wait window; [`Error::Connect`] when the factory failed to
    /// establish a fresh connection.
    pub async fn acquire(&self) -> Result<Lease<F::Connection>, Error> {
        self.acquire_inner(self.shared.default_timeout).await
    }

    /// Like [`acquire`](QueuedPool::acquire), with `timeout` overriding
    /// the configured wait window for this call only.
    ///
    /// A zero `timeout` means "fail immediately if nothing is available".
    pub async fn acquire_timeout(
        &self,
        timeout: Duration,
    ) -> Result<Lease<F::Connection>, Error> {
        self.acquire_inner((!timeout.is_zero()).then_some(timeout)).await
    }

    #[tracing::instrument(level = "debug", skip_all)]
    async fn acquire_inner(
        &self,
        timeout: Option<Duration>,
    ) -> Result<Lease<F::Connection>, Error> {
        let shared = &self.shared;
        let deadline = timeout.map(|t| Instant::now() + t);

        // What to do once the lock is released. Deciding under the lock but
        // awaiting outside of its guard's scope keeps this future `Send`:
        // the `MutexGuard` never lives across an `.await`.
        enum Step<'n> {
            Connect,
            Wait {
                deadline: Instant,
                notified: std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + 'n>>,
            },
        }

        loop {
            let step = {
                let mut state = shared.lock_state();
                let now = Instant::now();

                // Most-recently-released first, revalidated at hand-out time.
                let mut reused = None;
                while let Some(fairy) = state.idle.pop() {
                    if let Some(reason) = shared.expiry(&fairy, now) {
                        debug!(fairy = %fairy.id(), reason, "replacing expired idle connection");
                        fairy.close();
                        continue;
                    }
                    state.in_use += 1;
                    reused = Some(fairy);
                    break;
                }

                if let Some(fairy) = reused {
                    return Ok(Lease::pooled(fairy, Arc::clone(shared)));
                } else if state.in_use < shared.capacity() {
                    // Reserve the slot before connecting so the connection
                    // cap holds while the factory call is in flight.
                    state.in_use += 1;
                    Step::Connect
                } else if let Some(deadline) = deadline {
                    // Register for a wakeup before releasing the lock, so a
                    // release landing in between is not missed.
                    let mut notified = Box::pin(shared.slot_freed.notified());
                    notified.as_mut().enable();
                    Step::Wait { deadline, notified }
                } else {
                    return Err(Error::Timeout);
                }
            };

            match step {
                Step::Connect => {
                    return match self.factory.new_connection().await {
                        Ok(connection) => {
                            let fairy = Fairy::new(connection);
                            debug!(fairy = %fairy.id(), "established new pooled connection");
                            Ok(Lease::pooled(fairy, Arc::clone(shared)))
                        }
                        Err(source) => {
                            shared.forfeit_slot();
                            Err(Error::Connect(source))
                        }
                    };
                }
                Step::Wait { deadline, notified } => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Err(Error::Timeout);
                    }
                    if tokio::time::timeout(remaining, notified).await.is_err() {
                        return Err(Error::Timeout);
                    }
                    // Woken by a freed slot; contend for it from the top.
                }
            }
        }
    }

    /// Run `op` against a pooled connection and dispose of it based on the
    /// outcome: handed back for reuse on `Ok`, closed on `Err`.
    ///
    /// `op`'s error is passed back unchanged; acquisition failures convert
    /// into `E` via its `From<Error>`.
    pub async fn with_connection<T, E, Op>(&self, op: Op) -> Result<T, E>
    where
        E: From<Error>,
        Op: for<'c> FnOnce(&'c F::Connection) -> BoxFuture<'c, Result<T, E>> + Send,
    {
        let lease = self.acquire().await?;
        scoped(lease, op).await
    }

    /// How many connections are currently checked out.
    pub fn in_use(&self) -> usize {
        self.shared.lock_state().in_use
    }

    /// How many idle connections are currently pooled.
    pub fn idle(&self) -> usize {
        self.shared.lock_state().idle.len()
    }
}

impl<F: ConnectionFactory> Clone for QueuedPool<F> {
    fn clone(&self) -> Self {
        Self {
            factory: Arc::clone(&self.factory),
            shared: Arc::clone(&self.shared),
        }
    }
}

#[async_trait::async_trait]
impl<F: ConnectionFactory> ConnectionPool for QueuedPool<F> {
    type Connection = F::Connection;

    async fn acquire(&self) -> Result<Lease<F::Connection>, Error> {
        QueuedPool::acquire(self).await
    }

    async fn acquire_timeout(&self, timeout: Duration) -> Result<Lease<F::Connection>, Error> {
        QueuedPool::acquire_timeout(self, timeout).await
    }
}

/// State and policy shared between a pool, its clones, and its leases.
pub(crate) struct PoolShared<C: PoolableConnection> {
    max_size: usize,
    max_overflow: usize,
    recycle: Option<Duration>,
    stale: Option<Duration>,
    default_timeout: Option<Duration>,
    state: Mutex<PoolState<C>>,
    slot_freed: Notify,
}

struct PoolState<C: PoolableConnection> {
    /// Idle connections, most recently released last. Never grows past
    /// `max_size`.
    idle: Vec<Fairy<C>>,
    /// Connections currently checked out by callers. Never exceeds
    /// `max_size + max_overflow`.
    in_use: usize,
}

impl<C: PoolableConnection> PoolShared<C> {
    fn lock_state(&self) -> MutexGuard<'_, PoolState<C>> {
        // The lock is only held for bookkeeping, never across an await, so
        // poisoning means a panic inside that bookkeeping itself.
        self.state.lock().expect("pool state lock poisoned")
    }

    fn capacity(&self) -> usize {
        self.max_size + self.max_overflow
    }

    /// Why `fairy` must not be handed out, if any reason applies.
    fn expiry(&self, fairy: &Fairy<C>, now: Instant) -> Option<&'static str> {
        if !fairy.connection().is_open() {
            return Some("connection no longer open");
        }
        if let Some(recycle) = self.recycle {
            if now.duration_since(fairy.created_at()) >= recycle {
                return Some("past maximum age");
            }
        }
        if let Some(stale) = self.stale {
            if let Some(released_at) = fairy.released_at() {
                if now.duration_since(released_at) >= stale {
                    return Some("idle for too long");
                }
            }
        }
        None
    }

    /// Hand a checked-out connection back for reuse.
    ///
    /// Burst connections surface here as releases finding the idle set
    /// already full; they are closed instead of retained.
    pub(crate) fn hand_back(&self, mut fairy: Fairy<C>) {
        let mut state = self.lock_state();
        state.in_use -= 1;
        if fairy.connection().is_open() && state.idle.len() < self.max_size {
            fairy.mark_released(Instant::now());
            state.idle.push(fairy);
        } else {
            debug!(fairy = %fairy.id(), "closing connection instead of pooling it");
            fairy.close();
        }
        drop(state);
        self.slot_freed.notify_one();
    }

    /// Close a checked-out connection without returning it to the pool.
    pub(crate) fn discard(&self, fairy: Fairy<C>) {
        debug!(fairy = %fairy.id(), "invalidating connection");
        fairy.close();
        let mut state = self.lock_state();
        state.in_use -= 1;
        drop(state);
        self.slot_freed.notify_one();
    }

    /// Roll back a slot reservation after a failed factory call.
    fn forfeit_slot(&self) {
        let mut state = self.lock_state();
        state.in_use -= 1;
        drop(state);
        self.slot_freed.notify_one();
    }
}
