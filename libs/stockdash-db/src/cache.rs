//! Process-wide connection cache.
//!
//! Holds at most one established handle and at most one in-flight
//! establishment attempt. Concurrent first use joins the same attempt
//! instead of opening a second connection.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::config::DbConfig;
use crate::connector::{ConnectTarget, Connector};
use crate::error::ConnectError;
use crate::{DbError, Result};

type AttemptFuture<H> = Shared<BoxFuture<'static, std::result::Result<H, ConnectError>>>;

enum Slot<H> {
    Empty,
    Pending { attempt: u64, fut: AttemptFuture<H> },
    Ready(H),
}

struct Inner<C: Connector> {
    connector: C,
    target: Option<ConnectTarget>,
    attempt_timeout: Duration,
    slot: Mutex<Slot<C::Handle>>,
    attempts: AtomicU64,
}

/// Lazily connected, shared database handle.
///
/// Construct once in the composition root and pass clones to whatever needs a
/// connection. Clones share the same slot.
pub struct ConnectionCache<C: Connector> {
    inner: Arc<Inner<C>>,
}

impl<C: Connector> Clone for ConnectionCache<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Connector> ConnectionCache<C> {
    /// Creates an empty cache. No I/O happens until the first [`acquire`](Self::acquire).
    ///
    /// A missing DSN is accepted here and reported by every `acquire` call.
    ///
    /// # Errors
    /// Returns [`DbError::InvalidConfig`] when the DSN scheme is unsupported.
    pub fn new(connector: C, cfg: &DbConfig) -> Result<Self> {
        let target = ConnectTarget::from_config(cfg)?;
        Ok(Self {
            inner: Arc::new(Inner {
                connector,
                target,
                attempt_timeout: cfg.attempt_timeout,
                slot: Mutex::new(Slot::Empty),
                attempts: AtomicU64::new(0),
            }),
        })
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.inner.target.is_some()
    }

    /// Number of establishment attempts started so far.
    #[must_use]
    pub fn attempts(&self) -> u64 {
        self.inner.attempts.load(Ordering::SeqCst)
    }

    /// Returns the established handle, if any, without I/O.
    #[must_use]
    pub fn cached(&self) -> Option<C::Handle> {
        match &*self.inner.slot.lock() {
            Slot::Ready(handle) => Some(handle.clone()),
            Slot::Empty | Slot::Pending { .. } => None,
        }
    }

    /// Returns the shared handle, establishing it on first use.
    ///
    /// Callers arriving while an attempt is running await that attempt and
    /// receive its outcome; they never start a second one. A failed attempt
    /// leaves the cache empty so a later call retries.
    ///
    /// Must be called from within a tokio runtime; the attempt runs as a
    /// spawned task.
    ///
    /// # Errors
    /// - [`DbError::NotConfigured`] immediately and on every call when no DSN is set.
    /// - [`DbError::Connect`] when the attempt this call joined failed.
    pub async fn acquire(&self) -> Result<C::Handle> {
        let Some(target) = self.inner.target.as_ref() else {
            return Err(DbError::NotConfigured);
        };

        let (attempt, fut) = {
            let mut slot = self.inner.slot.lock();
            match &*slot {
                Slot::Ready(handle) => return Ok(handle.clone()),
                Slot::Pending { attempt, fut } => {
                    debug!(attempt, "Joining in-flight database connection attempt");
                    (*attempt, fut.clone())
                }
                Slot::Empty => {
                    let attempt = self.inner.attempts.fetch_add(1, Ordering::SeqCst) + 1;
                    let fut = Inner::start(Arc::clone(&self.inner), attempt, target.clone());
                    *slot = Slot::Pending {
                        attempt,
                        fut: fut.clone(),
                    };
                    (attempt, fut)
                }
            }
        };

        match fut.await {
            Ok(handle) => {
                self.inner.settle(attempt, Some(&handle));
                Ok(handle)
            }
            Err(source) => {
                self.inner.settle(attempt, None);
                Err(DbError::Connect { attempt, source })
            }
        }
    }
}

impl<C: Connector> Inner<C> {
    /// Spawns the attempt so it runs to completion even if every waiter is dropped.
    fn start(inner: Arc<Self>, attempt: u64, target: ConnectTarget) -> AttemptFuture<C::Handle> {
        let task = tokio::spawn(async move {
            let result = inner.establish(attempt, &target).await;
            inner.settle(attempt, result.as_ref().ok());
            result
        });

        async move {
            match task.await {
                Ok(result) => result,
                Err(e) => Err(ConnectError::Aborted(e.to_string())),
            }
        }
        .boxed()
        .shared()
    }

    async fn establish(
        &self,
        attempt: u64,
        target: &ConnectTarget,
    ) -> std::result::Result<C::Handle, ConnectError> {
        let dsn = target.redacted();
        debug!(attempt, dsn = %dsn, engine = %target.engine(), "Connecting to database");
        let started = Instant::now();

        let outcome =
            tokio::time::timeout(self.attempt_timeout, self.connector.connect(target)).await;
        match outcome {
            Ok(Ok(handle)) => {
                info!(attempt, dsn = %dsn, elapsed = ?started.elapsed(), "Connected to database");
                Ok(handle)
            }
            Ok(Err(e)) => {
                error!(attempt, dsn = %dsn, error = %e, "Database connection failed");
                Err(e)
            }
            Err(_elapsed) => {
                let e = ConnectError::Timeout(self.attempt_timeout);
                error!(attempt, dsn = %dsn, error = %e, "Database connection failed");
                Err(e)
            }
        }
    }

    /// Moves the slot out of `Pending` for `attempt`. Idempotent; a newer
    /// attempt is never overwritten.
    fn settle(&self, attempt: u64, handle: Option<&C::Handle>) {
        let mut slot = self.slot.lock();
        if let Slot::Pending { attempt: current, .. } = &*slot
            && *current == attempt
        {
            *slot = match handle {
                Some(handle) => Slot::Ready(handle.clone()),
                None => Slot::Empty,
            };
        }
    }
}
