//! Bounded async pool for reusable connection-like objects.

use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::{timeout_at, Instant};

pub type FactoryFuture<T> = Pin<Box<dyn Future<Output = Result<T, String>> + Send>>;

struct PoolState<T> {
    idle: Vec<T>,
    /// Items alive, idle or borrowed, including ones still being created.
    size: usize,
    closed: bool,
}

/// An async bounded pool. Items are created lazily by the factory, handed out
/// as [`Pooled`] guards and returned to the pool when the guard drops.
pub struct AsyncPool<T> {
    max: usize,
    factory: Box<dyn Fn() -> FactoryFuture<T> + Send + Sync>,
    state: Mutex<PoolState<T>>,
    available: Notify,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum AcquireError {
    #[error("timed out waiting for a free connection")]
    Timeout,
    #[error("pool is closed")]
    Closed,
    #[error("failed to open connection: {0}")]
    Create(String),
}

enum Slot<T> {
    Idle(T),
    Create,
    Wait,
}

/// A pooled value that returns to the pool on drop.
pub struct Pooled<T> {
    pool: Arc<AsyncPool<T>>,
    value: Option<T>,
}

impl<T> std::fmt::Debug for AsyncPool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncPool").field("max", &self.max).finish_non_exhaustive()
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Pooled<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pooled").field("value", &self.value).finish_non_exhaustive()
    }
}

/// Frees a reserved slot unless the creation it guards succeeded.
struct Reservation<'a, T> {
    pool: &'a AsyncPool<T>,
    armed: bool,
}

impl<T> Drop for Reservation<'_, T> {
    fn drop(&mut self) {
        if self.armed {
            self.pool.discard();
        }
    }
}

impl<T> AsyncPool<T> {
    pub fn new<F, Fut, E>(max: usize, factory: F) -> Arc<Self>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: std::fmt::Display,
    {
        let factory = Box::new(move || {
            let fut = factory();
            Box::pin(async move { fut.await.map_err(|err| err.to_string()) }) as FactoryFuture<T>
        });
        Arc::new(Self {
            max: max.max(1),
            factory,
            state: Mutex::new(PoolState {
                idle: Vec::new(),
                size: 0,
                closed: false,
            }),
            available: Notify::new(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, PoolState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Borrow an item, creating one if the pool is below its bound.
    ///
    /// With `timeout = None` this waits until an item is returned.
    pub async fn acquire(
        self: &Arc<Self>,
        timeout: Option<Duration>,
    ) -> Result<Pooled<T>, AcquireError> {
        let deadline = timeout.map(|limit| Instant::now() + limit);
        loop {
            // Register interest before inspecting the state so a release
            // between the check and the wait is not lost.
            let notified = self.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let slot = {
                let mut state = self.lock();
                if state.closed {
                    return Err(AcquireError::Closed);
                }
                if let Some(item) = state.idle.pop() {
                    Slot::Idle(item)
                } else if state.size < self.max {
                    state.size += 1;
                    Slot::Create
                } else {
                    Slot::Wait
                }
            };

            match slot {
                Slot::Idle(item) => return Ok(self.wrap(item)),
                Slot::Create => {
                    let mut reservation = Reservation {
                        pool: self,
                        armed: true,
                    };
                    let created = match deadline {
                        Some(limit) => timeout_at(limit, (self.factory)())
                            .await
                            .map_err(|_| AcquireError::Timeout)?,
                        None => (self.factory)().await,
                    };
                    let item = created.map_err(AcquireError::Create)?;
                    reservation.armed = false;
                    return Ok(self.wrap(item));
                }
                Slot::Wait => match deadline {
                    Some(limit) => {
                        if timeout_at(limit, notified).await.is_err() {
                            return Err(AcquireError::Timeout);
                        }
                    }
                    None => notified.await,
                },
            }
        }
    }

    /// Reject new borrows and drop idle items. Outstanding borrows keep
    /// working; their items are dropped instead of returned.
    pub fn close(&self) {
        let idle = {
            let mut state = self.lock();
            state.closed = true;
            let idle = std::mem::take(&mut state.idle);
            state.size -= idle.len();
            idle
        };
        drop(idle);
        self.available.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Items alive, idle or borrowed.
    pub fn size(&self) -> usize {
        self.lock().size
    }

    pub fn idle_count(&self) -> usize {
        self.lock().idle.len()
    }

    pub fn borrowed(&self) -> usize {
        let state = self.lock();
        state.size - state.idle.len()
    }

    fn wrap(self: &Arc<Self>, item: T) -> Pooled<T> {
        Pooled {
            pool: Arc::clone(self),
            value: Some(item),
        }
    }

    fn release(&self, item: T) {
        let mut state = self.lock();
        if state.closed {
            state.size -= 1;
            drop(state);
            drop(item);
        } else {
            state.idle.push(item);
            drop(state);
        }
        self.available.notify_one();
    }

    fn discard(&self) {
        self.lock().size -= 1;
        self.available.notify_one();
    }
}

impl<T> Pooled<T> {
    /// Drop the item instead of returning it, freeing its slot.
    pub fn discard(mut self) {
        if let Some(item) = self.value.take() {
            drop(item);
            self.pool.discard();
        }
    }
}

impl<T> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &T {
        match self.value.as_ref() {
            Some(value) => value,
            None => unreachable!("pooled value is only taken on discard or drop"),
        }
    }
}

impl<T> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut T {
        match self.value.as_mut() {
            Some(value) => value,
            None => unreachable!("pooled value is only taken on discard or drop"),
        }
    }
}

impl<T> Drop for Pooled<T> {
    fn drop(&mut self) {
        if let Some(item) = self.value.take() {
            self.pool.release(item);
        }
    }
}
