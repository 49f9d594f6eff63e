use fairy_floss::pool::{ConnectionFactory, PoolableConnection};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// In-memory stand-in for a broker connection.
pub struct MockConnection {
    id: Uuid,
    open: Arc<AtomicBool>,
}

impl MockConnection {
    fn establish() -> Self {
        Self {
            id: Uuid::new_v4(),
            open: Arc::new(AtomicBool::new(true)),
        }
    }

    /// A handle onto this connection that outlives its lease, for
    /// asserting on its fate after the pool disposed of it.
    pub fn probe(&self) -> ConnectionProbe {
        ConnectionProbe {
            id: self.id,
            open: Arc::clone(&self.open),
        }
    }
}

impl PoolableConnection for MockConnection {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

/// Observes a [`MockConnection`] from outside the pool.
#[derive(Clone)]
pub struct ConnectionProbe {
    pub id: Uuid,
    open: Arc<AtomicBool>,
}

impl ConnectionProbe {
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Simulate the broker side dropping the connection.
    pub fn sever(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

/// Produces [`MockConnection`]s and counts how many it made.
///
/// Clones share the counter, so tests can keep one half while the pool
/// owns the other.
#[derive(Clone, Default)]
pub struct MockFactory {
    created: Arc<AtomicUsize>,
}

impl MockFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ConnectionFactory for MockFactory {
    type Connection = MockConnection;

    async fn new_connection(&self) -> Result<MockConnection, anyhow::Error> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(MockConnection::establish())
    }
}

/// A factory standing in for an unreachable broker.
pub struct UnreachableFactory;

#[async_trait::async_trait]
impl ConnectionFactory for UnreachableFactory {
    type Connection = MockConnection;

    async fn new_connection(&self) -> Result<MockConnection, anyhow::Error> {
        Err(anyhow::anyhow!("broker unreachable"))
    }
}
