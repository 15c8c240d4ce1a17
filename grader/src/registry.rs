//! Process-wide registry of per-student connection pools.
//!
//! The registry hands out one [`AsyncPool`] per student identity. Pools are
//! created on first use, touched on every access and closed by a background
//! reaper once they have been idle longer than the configured threshold.
//!
//! Creation is serialised per identity: the map only stores a slot, and the
//! pool inside the slot is initialised through a [`OnceCell`]. Concurrent
//! first requests for the same student therefore share one pool, while other
//! students are never blocked by a slow connect.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{oneshot, OnceCell, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::error::{GraderError, GraderResult};
use crate::pool::{AcquireError, AsyncPool, Pooled};

/// Opens connections for a student identity.
///
/// Methods return `impl Future + Send` so registry futures can be spawned.
pub trait Connector: Send + Sync + 'static {
    type Conn: Send + 'static;

    fn connect(&self, identity: &str) -> impl Future<Output = Result<Self::Conn, String>> + Send;

    /// Checked on every borrow; unhealthy connections are discarded.
    fn is_healthy(_conn: &Self::Conn) -> bool {
        true
    }
}

pub type StudentPool<T> = Arc<AsyncPool<T>>;

#[derive(Clone, Debug)]
pub struct RegistryConfig {
    pub max_conns: usize,
    /// How long a request waits for a connection before giving up.
    pub acquire_timeout: Duration,
    pub reap_interval: Duration,
    pub stale_after: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_conns: 3,
            acquire_timeout: Duration::from_secs(5),
            reap_interval: Duration::from_secs(10),
            stale_after: Duration::from_secs(1200),
        }
    }
}

struct PoolSlot<T> {
    pool: OnceCell<StudentPool<T>>,
    last_access: Mutex<Instant>,
}

impl<T> PoolSlot<T> {
    fn new() -> Self {
        Self {
            pool: OnceCell::new(),
            last_access: Mutex::new(Instant::now()),
        }
    }

    fn touch(&self) {
        *self.last_access.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    fn idle_for(&self, now: Instant) -> Duration {
        let last = *self.last_access.lock().unwrap_or_else(PoisonError::into_inner);
        now.saturating_duration_since(last)
    }
}

pub struct PoolRegistry<C: Connector> {
    connector: Arc<C>,
    config: RegistryConfig,
    slots: RwLock<HashMap<String, Arc<PoolSlot<C::Conn>>>>,
}

impl<C: Connector> PoolRegistry<C> {
    pub fn new(connector: C, config: RegistryConfig) -> Arc<Self> {
        Arc::new(Self {
            connector: Arc::new(connector),
            config,
            slots: RwLock::new(HashMap::new()),
        })
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Return the pool for `identity`, creating it on first use.
    ///
    /// A new pool is health-checked with one connection before it is handed
    /// out. If that fails the error is returned and the next call retries.
    pub async fn get_pool(&self, identity: &str) -> GraderResult<StudentPool<C::Conn>> {
        let slot = self.slot(identity).await;
        let pool = slot
            .pool
            .get_or_try_init(|| self.open_pool(identity))
            .await?;
        Ok(Arc::clone(pool))
    }

    /// Borrow a healthy connection for `identity`.
    pub async fn acquire(&self, identity: &str) -> GraderResult<Pooled<C::Conn>> {
        let mut attempts = self.config.max_conns + 1;
        loop {
            attempts -= 1;
            let pool = self.get_pool(identity).await?;
            match pool.acquire(Some(self.config.acquire_timeout)).await {
                Ok(conn) if C::is_healthy(&conn) => return Ok(conn),
                Ok(conn) => {
                    tracing::debug!(identity, "Discarding broken connection");
                    conn.discard();
                }
                // Reaped between lookup and borrow; the next lookup opens a new pool.
                Err(AcquireError::Closed) => {}
                Err(err) => return Err(unavailable(identity, err)),
            }
            if attempts == 0 {
                return Err(unavailable(identity, "no healthy connection available"));
            }
        }
    }

    async fn slot(&self, identity: &str) -> Arc<PoolSlot<C::Conn>> {
        {
            let slots = self.slots.read().await;
            if let Some(slot) = slots.get(identity) {
                slot.touch();
                return Arc::clone(slot);
            }
        }
        let mut slots = self.slots.write().await;
        let slot = slots
            .entry(identity.to_string())
            .or_insert_with(|| Arc::new(PoolSlot::new()));
        slot.touch();
        Arc::clone(slot)
    }

    async fn open_pool(&self, identity: &str) -> GraderResult<StudentPool<C::Conn>> {
        let connector = Arc::clone(&self.connector);
        let owner = identity.to_string();
        let pool = AsyncPool::new(self.config.max_conns, move || {
            let connector = Arc::clone(&connector);
            let owner = owner.clone();
            async move { connector.connect(&owner).await }
        });

        // Fail fast on misconfiguration; the connection stays idle for reuse.
        let probe = pool
            .acquire(Some(self.config.acquire_timeout))
            .await
            .map_err(|err| unavailable(identity, err))?;
        drop(probe);

        tracing::info!(identity, max_conns = self.config.max_conns, "Opened student pool");
        Ok(pool)
    }

    /// Close and evict every pool idle for longer than `stale_after`.
    /// Returns the number of evicted pools.
    pub async fn close_unused(&self, stale_after: Duration) -> usize {
        let now = Instant::now();
        let evicted: Vec<(String, Arc<PoolSlot<C::Conn>>)> = {
            let mut slots = self.slots.write().await;
            let stale: Vec<String> = slots
                .iter()
                .filter(|(_, slot)| slot.idle_for(now) > stale_after)
                .map(|(identity, _)| identity.clone())
                .collect();
            stale
                .into_iter()
                .filter_map(|identity| slots.remove_entry(&identity))
                .collect()
        };

        for (identity, slot) in &evicted {
            if let Some(pool) = slot.pool.get() {
                pool.close();
            }
            tracing::info!(identity = %identity, "Closed unused student pool");
        }
        evicted.len()
    }

    /// Close every pool. Used on process shutdown.
    pub async fn close_all(&self) {
        let drained: Vec<_> = self.slots.write().await.drain().collect();
        for (_, slot) in &drained {
            if let Some(pool) = slot.pool.get() {
                pool.close();
            }
        }
        tracing::info!(pools = drained.len(), "Closed all student pools");
    }

    pub async fn contains(&self, identity: &str) -> bool {
        self.slots.read().await.contains_key(identity)
    }

    pub async fn len(&self) -> usize {
        self.slots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.slots.read().await.is_empty()
    }

    /// Start the background task that runs [`Self::close_unused`] every
    /// `reap_interval`.
    pub fn spawn_reaper(self: &Arc<Self>) -> ReaperHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let registry = Arc::clone(self);
        let interval = self.config.reap_interval;
        let stale_after = self.config.stale_after;

        let join = tokio::spawn(async move {
            tracing::info!(?interval, ?stale_after, "Pool reaper started");
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {
                        let closed = registry.close_unused(stale_after).await;
                        tracing::debug!(closed, "Reaper tick");
                    }
                }
            }
            tracing::info!("Pool reaper stopped");
        });

        ReaperHandle {
            shutdown: Some(shutdown_tx),
            join,
        }
    }
}

/// Owns the reaper task; [`ReaperHandle::shutdown`] stops it.
pub struct ReaperHandle {
    shutdown: Option<oneshot::Sender<()>>,
    join: JoinHandle<()>,
}

impl ReaperHandle {
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(err) = (&mut self.join).await {
            tracing::warn!("Pool reaper ended abnormally: {err}");
        }
    }
}

impl Drop for ReaperHandle {
    fn drop(&mut self) {
        if self.shutdown.is_some() {
            self.join.abort();
        }
    }
}

fn unavailable(identity: &str, reason: impl std::fmt::Display) -> GraderError {
    GraderError::PoolUnavailable {
        identity: identity.to_string(),
        reason: reason.to_string(),
    }
}
