//! Client pool implementation.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::PoolConfig;
use crate::error::{PoolError, Result};
use crate::heap::{LoadHeap, ReleaseOutcome};
use crate::lifecycle::{Connector, Session};
use crate::metrics::{MetricsRecorder, PoolMetrics};
use crate::mongo::MongoConnector;

/// A fixed-size pool of MongoDB clients.
///
/// Every client is opened up front. [`acquire`](Pool::acquire) hands out the
/// client with the fewest outstanding borrows; a client that is fully idle
/// when picked is pinged first and replaced in place if the ping fails.
/// Clients may be shared: two borrowers can hold the same client at once.
///
/// `Pool` is cheap to clone; clones share the same clients.
pub struct Pool<C: Connector = MongoConnector> {
    inner: Arc<PoolInner<C>>,
}

struct Slot<S> {
    session: Arc<S>,
    /// Reconnect without probing the next time this slot is picked idle.
    broken: bool,
}

struct PoolState<S> {
    heap: LoadHeap,
    slots: Vec<Slot<S>>,
    closed: bool,
}

struct PoolInner<C: Connector> {
    config: PoolConfig,
    connector: C,
    /// Bookkeeping, only ever locked for short synchronous sections.
    state: Mutex<PoolState<C::Session>>,
    /// Serializes acquire and close, including probe and reconnect I/O.
    acquire_lock: tokio::sync::Mutex<()>,
    metrics: MetricsRecorder,
}

impl Pool<MongoConnector> {
    /// Open a pool of MongoDB clients.
    ///
    /// All `config.pool_size` clients are created before this returns. If
    /// any of them fails, the ones already created are shut down and the
    /// error is returned.
    pub async fn open(config: PoolConfig) -> Result<Self> {
        config.validate()?;
        let connector = MongoConnector::new(&config).await?;
        Self::with_connector(config, connector).await
    }

    /// Open a pool with the default timeouts.
    ///
    /// A `pool_size` of zero selects [`DEFAULT_POOL_SIZE`](crate::config::DEFAULT_POOL_SIZE).
    pub async fn connect(address: impl Into<String>, pool_size: usize) -> Result<Self> {
        Self::open(PoolConfig::new().address(address).pool_size(pool_size)).await
    }

    /// Open a pool with explicit connect and idle timeouts.
    pub async fn connect_with_timeout(
        address: impl Into<String>,
        pool_size: usize,
        connect_timeout: Duration,
        idle_timeout: Duration,
    ) -> Result<Self> {
        let config = PoolConfig::new()
            .address(address)
            .pool_size(pool_size)
            .connect_timeout(connect_timeout)
            .idle_timeout(idle_timeout);
        Self::open(config).await
    }
}

impl<C: Connector> Pool<C> {
    /// Open a pool whose clients are produced by `connector`.
    pub async fn with_connector(config: PoolConfig, connector: C) -> Result<Self> {
        config.validate()?;
        let size = config.effective_pool_size();

        let mut sessions = Vec::with_capacity(size);
        for _ in 0..size {
            match connector.connect().await {
                Ok(session) => sessions.push(session),
                Err(source) => {
                    tracing::error!(
                        address = connector.address(),
                        established = sessions.len(),
                        error = %source,
                        "failed to fill client pool"
                    );
                    for session in &sessions {
                        session.disconnect().await;
                    }
                    return Err(PoolError::Connect {
                        address: connector.address().to_string(),
                        source,
                    });
                }
            }
        }

        let slots = sessions
            .into_iter()
            .map(|session| Slot {
                session: Arc::new(session),
                broken: false,
            })
            .collect();

        tracing::info!(address = connector.address(), pool_size = size, "client pool opened");

        Ok(Self {
            inner: Arc::new(PoolInner {
                config,
                connector,
                state: Mutex::new(PoolState {
                    heap: LoadHeap::new(size),
                    slots,
                    closed: false,
                }),
                acquire_lock: tokio::sync::Mutex::new(()),
                metrics: MetricsRecorder::default(),
            }),
        })
    }

    /// Borrow the least used client.
    ///
    /// If the chosen client has no other borrowers it is pinged first; when
    /// the ping fails the client is shut down and replaced. If the
    /// replacement cannot be opened this returns [`PoolError::Reconnect`] and
    /// the pool's bookkeeping is left as it was.
    ///
    /// The client goes back to the pool when the returned guard is dropped.
    pub async fn acquire(&self) -> Result<PooledConnection<C>> {
        match self.acquire_inner().await {
            Ok(conn) => {
                self.inner.metrics.acquired();
                Ok(conn)
            }
            Err(e) => {
                self.inner.metrics.acquire_failed();
                Err(e)
            }
        }
    }

    async fn acquire_inner(&self) -> Result<PooledConnection<C>> {
        let _serial = self.inner.acquire_lock.lock().await;

        let (slot, session, broken) = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return Err(PoolError::PoolClosed);
            }
            let slot = state.heap.peek_min().ok_or(PoolError::PoolClosed)?;

            // A client with other borrowers is in active use and is not probed.
            if state.heap.use_count(slot) > 0 {
                return Ok(self.checkout(&mut state, slot));
            }
            let entry = &state.slots[slot];
            (slot, Arc::clone(&entry.session), entry.broken)
        };

        // Releases meanwhile can only bring other slots down to zero, so the
        // idle slot is still least loaded.
        self.refresh(slot, &session, broken).await?;

        let mut state = self.inner.state.lock();
        Ok(self.checkout(&mut state, slot))
    }

    /// Record the borrow of `slot` and build its guard.
    fn checkout(&self, state: &mut PoolState<C::Session>, slot: usize) -> PooledConnection<C> {
        state.heap.acquire(slot);
        tracing::trace!(
            slot,
            use_count = state.heap.use_count(slot),
            position = state.heap.position(slot),
            "client acquired"
        );
        PooledConnection {
            pool: Arc::clone(&self.inner),
            slot,
            session: Arc::clone(&state.slots[slot].session),
        }
    }

    /// Probe an idle slot and reconnect it if the probe fails.
    async fn refresh(&self, slot: usize, session: &C::Session, broken: bool) -> Result<()> {
        if broken {
            tracing::debug!(slot, "client marked broken, reconnecting");
        } else {
            match session.ping().await {
                Ok(()) => {
                    self.inner.metrics.probed(true);
                    return Ok(());
                }
                Err(e) => {
                    self.inner.metrics.probed(false);
                    tracing::warn!(slot, error = %e, "liveness probe failed, reconnecting");
                }
            }
        }

        session.disconnect().await;
        let fresh = self.inner.connector.connect().await.map_err(|source| {
            tracing::error!(slot, error = %source, "reconnect failed");
            PoolError::Reconnect {
                address: self.inner.connector.address().to_string(),
                source,
            }
        })?;

        let mut state = self.inner.state.lock();
        let entry = &mut state.slots[slot];
        entry.session = Arc::new(fresh);
        entry.broken = false;
        self.inner.metrics.reconnected();
        tracing::debug!(slot, "client replaced");
        Ok(())
    }

    /// Return a borrowed client. Equivalent to dropping the guard.
    pub fn release(&self, conn: PooledConnection<C>) {
        drop(conn);
    }

    /// Return a client if there is one; `None` is a no-op.
    pub fn release_opt(&self, conn: Option<PooledConnection<C>>) {
        drop(conn);
    }

    /// Shut down every client.
    ///
    /// Clients that still have borrowers are reported and shut down anyway.
    /// Guards that are dropped afterwards do nothing, and further acquires
    /// fail with [`PoolError::PoolClosed`]. Closing twice is a no-op.
    pub async fn close(&self) {
        let _serial = self.inner.acquire_lock.lock().await;

        let (drained, sessions) = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            let drained = state.heap.drain();
            let sessions: Vec<_> = state
                .slots
                .iter()
                .map(|slot| Arc::clone(&slot.session))
                .collect();
            (drained, sessions)
        };

        let mut outstanding = 0usize;
        for ((slot, use_count), session) in drained.into_iter().zip(sessions) {
            session.disconnect().await;
            if use_count != 0 {
                outstanding += 1;
                tracing::error!(slot, use_count, "client still borrowed at pool close");
            }
        }

        tracing::info!(outstanding, "client pool closed");
    }

    /// Check if the pool is closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    /// Get the current pool status.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let state = self.inner.state.lock();
        let counts = state.heap.use_counts();
        let size = state.slots.len();
        let in_use = counts.iter().filter(|&&c| c > 0).count();
        PoolStatus {
            size,
            in_use,
            idle: size - in_use,
            borrows: counts.iter().sum(),
        }
    }

    /// Outstanding borrows per client, indexed by slot.
    #[must_use]
    pub fn use_counts(&self) -> Vec<usize> {
        self.inner.state.lock().heap.use_counts()
    }

    /// Get a snapshot of the pool counters.
    #[must_use]
    pub fn metrics(&self) -> PoolMetrics {
        self.inner.metrics.snapshot()
    }

    /// Get the pool configuration.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Get the connector used to open clients.
    #[must_use]
    pub fn connector(&self) -> &C {
        &self.inner.connector
    }
}

impl<C: Connector> PoolInner<C> {
    fn release_slot(&self, slot: usize) {
        let outcome = self.state.lock().heap.release(slot);
        match outcome {
            ReleaseOutcome::Released => {
                self.metrics.released();
                tracing::trace!(slot, "client returned to pool");
            }
            ReleaseOutcome::Underflow => {
                tracing::warn!(slot, "release without a matching acquire ignored");
            }
            ReleaseOutcome::Detached => {
                tracing::trace!(slot, "release after pool close ignored");
            }
        }
    }

    fn mark_broken(&self, slot: usize, session: &Arc<C::Session>) {
        let mut state = self.state.lock();
        if let Some(entry) = state.slots.get_mut(slot) {
            // A slot that was already reconnected keeps its new client.
            if Arc::ptr_eq(&entry.session, session) {
                entry.broken = true;
            }
        }
    }
}

impl<C: Connector> Clone for Pool<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Connector> fmt::Debug for Pool<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("address", &self.inner.connector.address())
            .field("status", &self.status())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Status information about the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Number of clients in the pool.
    pub size: usize,
    /// Clients with at least one borrower.
    pub in_use: usize,
    /// Clients with no borrowers.
    pub idle: usize,
    /// Total outstanding borrows across all clients.
    pub borrows: usize,
}

impl PoolStatus {
    /// Percentage of clients with at least one borrower.
    #[must_use]
    pub fn utilization(&self) -> f64 {
        if self.size == 0 {
            0.0
        } else {
            self.in_use as f64 / self.size as f64 * 100.0
        }
    }
}

/// A client borrowed from the pool.
///
/// Dereferences to the underlying client. When dropped, the borrow is
/// returned to the pool.
pub struct PooledConnection<C: Connector = MongoConnector> {
    pool: Arc<PoolInner<C>>,
    slot: usize,
    session: Arc<C::Session>,
}

impl<C: Connector> PooledConnection<C> {
    /// Index of the pool slot this client belongs to.
    #[must_use]
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Current number of borrowers of this client, this one included.
    #[must_use]
    pub fn use_count(&self) -> usize {
        self.pool.state.lock().heap.use_count(self.slot)
    }

    /// Flag this client as unusable.
    ///
    /// Clients that still have borrowers are never probed, so a failure seen
    /// by one borrower would otherwise go unnoticed until the client becomes
    /// idle and is picked again. A flagged client is reconnected without
    /// probing the next time it is picked while idle.
    pub fn mark_broken(&self) {
        tracing::debug!(slot = self.slot, "client marked broken by borrower");
        self.pool.mark_broken(self.slot, &self.session);
    }
}

impl<C: Connector> Deref for PooledConnection<C> {
    type Target = C::Session;

    fn deref(&self) -> &Self::Target {
        &self.session
    }
}

impl<C: Connector> fmt::Debug for PooledConnection<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("slot", &self.slot)
            .finish_non_exhaustive()
    }
}

impl<C: Connector> Drop for PooledConnection<C> {
    fn drop(&mut self) {
        self.pool.release_slot(self.slot);
    }
}
