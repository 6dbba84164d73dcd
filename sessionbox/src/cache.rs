//! Local cache sharing one [`SessionItems`] between concurrent requests.
//!
//! Every live session key has a holder with the shared collection, the
//! number of requests currently using it and the time it was last touched.
//! [`LocalSessionCache::acquire`] and [`LocalSessionCache::release`] move the
//! reference count; a periodic sweep drops holders that are unreferenced and
//! have been idle for the session timeout.
//!
//! Acquire and release take the shared side of a reader/writer gate around
//! their map work only, and the sweep takes the exclusive side, so a holder
//! can never be swept between being found and being referenced. The loader
//! runs outside the gate.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use sessionbox_core::SessionKey;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{Instrument, debug, error, info_span, trace, warn};

use crate::config::{EvictionPolicy, SessionConfig};
use crate::metrics;
use crate::observer::{NoopObserver, SessionObserver};
use crate::{SessionError, SessionItems};

/// Source of session contents on a cache miss.
#[async_trait]
pub trait SessionLoader: Send + Sync {
    /// Error returned by a failed load.
    type Error: Send;

    /// Loads the session stored under `key`.
    async fn load(&self, key: &SessionKey) -> Result<SessionItems, Self::Error>;
}

/// Result of [`LocalSessionCache::release`].
#[derive(Debug, Clone)]
pub struct Released {
    /// The shared collection.
    pub items: Arc<SessionItems>,
    /// Whether no other request holds the session anymore.
    pub last: bool,
}

struct Holder {
    items: OnceCell<Arc<SessionItems>>,
    refs: AtomicUsize,
    // Milliseconds since the cache epoch.
    last_access: AtomicU64,
}

impl Holder {
    fn new(now: u64) -> Self {
        Self {
            items: OnceCell::new(),
            refs: AtomicUsize::new(0),
            last_access: AtomicU64::new(now),
        }
    }

    fn touch(&self, now: u64) {
        self.last_access.fetch_max(now, Ordering::AcqRel);
    }

    /// Decrements the reference count, returning the previous count, or
    /// `None` if it was already zero.
    fn decrement(&self) -> Option<usize> {
        self.refs
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |refs| refs.checked_sub(1))
            .ok()
    }
}

struct CacheInner {
    holders: DashMap<SessionKey, Arc<Holder>>,
    gate: RwLock<()>,
    epoch: Instant,
    session_timeout: Duration,
    sweep_interval: Duration,
    eviction: EvictionPolicy,
    observer: Arc<dyn SessionObserver>,
}

impl CacheInner {
    fn now(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn enter(&self, key: &SessionKey) -> Arc<Holder> {
        let now = self.now();
        let _gate = self.gate.read();
        let holder = self
            .holders
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Holder::new(now)))
            .clone();
        holder.refs.fetch_add(1, Ordering::AcqRel);
        holder.touch(now);
        holder
    }

    fn abandon(&self, key: &SessionKey, holder: &Arc<Holder>) {
        let _gate = self.gate.read();
        holder.decrement();
        let removed = self.holders.remove_if(key, |_, current| {
            Arc::ptr_eq(current, holder)
                && current.refs.load(Ordering::Acquire) == 0
                && current.items.get().is_none()
        });
        if removed.is_some() {
            debug!(%key, "Dropped session holder after failed load");
        }
    }

    fn sweep(&self, force: bool) -> usize {
        let now = self.now();
        let timeout = u64::try_from(self.session_timeout.as_millis()).unwrap_or(u64::MAX);
        let eager = self.eviction == EvictionPolicy::Eager;

        let _gate = self.gate.write();
        let before = self.holders.len();
        self.holders.retain(|key, holder| {
            let idle = now.saturating_sub(holder.last_access.load(Ordering::Acquire));
            let evict =
                holder.refs.load(Ordering::Acquire) == 0 && (force || eager || idle >= timeout);
            if evict {
                debug!(%key, idle_ms = idle, "Evicting session from local cache");
            }
            !evict
        });
        let remaining = self.holders.len();
        let evicted = before.saturating_sub(remaining);
        metrics::record_sweep(evicted, remaining);
        evicted
    }
}

/// Process-local, reference-counted cache of live sessions.
pub struct LocalSessionCache {
    inner: Arc<CacheInner>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl LocalSessionCache {
    /// Creates a cache using the timeout, sweep period and eviction policy of
    /// `config`. The sweep does not run until [`start`](Self::start).
    pub fn new(config: &SessionConfig) -> Self {
        Self::with_observer(config, Arc::new(NoopObserver))
    }

    /// Creates a cache reporting sweep failures to `observer`.
    pub fn with_observer(config: &SessionConfig, observer: Arc<dyn SessionObserver>) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                holders: DashMap::new(),
                gate: RwLock::new(()),
                epoch: Instant::now(),
                session_timeout: config.session_timeout,
                sweep_interval: config.sweep_interval,
                eviction: config.eviction,
                observer,
            }),
            sweeper: Mutex::new(None),
        }
    }

    /// Returns the shared collection for `key`, loading it on first use.
    ///
    /// Concurrent first acquirers share a single load. If the load fails the
    /// error goes to this caller only and its reference is dropped; a waiting
    /// acquirer then runs its own loader.
    pub async fn acquire<L>(&self, key: &SessionKey, loader: &L) -> Result<Arc<SessionItems>, L::Error>
    where
        L: SessionLoader + ?Sized,
    {
        let holder = self.inner.enter(key);
        if let Some(items) = holder.items.get() {
            trace!(%key, "Session served from local cache");
            metrics::record_acquire(true);
            return Ok(items.clone());
        }

        metrics::record_acquire(false);
        let loaded = holder
            .items
            .get_or_try_init(|| async { loader.load(key).await.map(Arc::new) })
            .await;
        match loaded {
            Ok(items) => Ok(items.clone()),
            Err(error) => {
                self.inner.abandon(key, &holder);
                Err(error)
            }
        }
    }

    /// Drops one reference to `key` and touches it.
    ///
    /// Returns `None` if the session is not in the cache or was never
    /// loaded. Releasing more often than acquiring logs a warning and leaves
    /// the count at zero.
    pub fn release(&self, key: &SessionKey) -> Option<Released> {
        let now = self.inner.now();
        let _gate = self.inner.gate.read();
        let holder = self.inner.holders.get(key)?.clone();
        let items = holder.items.get()?.clone();
        holder.touch(now);
        let last = match holder.decrement() {
            Some(previous) => previous == 1,
            None => {
                warn!(%key, "Unbalanced session release");
                false
            }
        };
        Some(Released { items, last })
    }

    /// Removes unreferenced holders, returning how many were evicted.
    ///
    /// Without `force` a holder must also have been idle for the session
    /// timeout, unless the eviction policy is [`EvictionPolicy::Eager`].
    pub fn sweep(&self, force: bool) -> usize {
        self.inner.sweep(force)
    }

    /// Starts the periodic sweep. Does nothing if it is already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let mut sweeper = self.sweeper.lock();
        if sweeper.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let inner = self.inner.clone();
        let period = inner.sweep_interval.max(Duration::from_millis(1));
        let task = async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let pass = inner.clone();
                match tokio::spawn(async move { pass.sweep(false) }).await {
                    Ok(0) => {}
                    Ok(evicted) => debug!(evicted, "Sweep pass finished"),
                    Err(join_error) => {
                        let error = SessionError::Sweep(join_error);
                        error!(%error, "Session sweep pass failed");
                        inner.observer.on_error(&error, None);
                    }
                }
            }
        };
        *sweeper = Some(tokio::spawn(task.instrument(info_span!("session_sweeper"))));
        debug!(period_ms = period.as_millis(), "Session sweeper started");
    }

    /// Stops the periodic sweep. Returns `false` if it was not running.
    pub fn stop(&self) -> bool {
        match self.sweeper.lock().take() {
            Some(handle) => {
                handle.abort();
                debug!("Session sweeper stopped");
                true
            }
            None => false,
        }
    }

    /// Whether the periodic sweep is running.
    pub fn is_running(&self) -> bool {
        self.sweeper
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Current reference count of `key`.
    pub fn ref_count(&self, key: &SessionKey) -> Option<usize> {
        self.inner
            .holders
            .get(key)
            .map(|holder| holder.refs.load(Ordering::Acquire))
    }

    /// Whether `key` has a holder.
    pub fn contains(&self, key: &SessionKey) -> bool {
        self.inner.holders.contains_key(key)
    }

    /// Number of holders.
    pub fn len(&self) -> usize {
        self.inner.holders.len()
    }

    /// True if no session is cached.
    pub fn is_empty(&self) -> bool {
        self.inner.holders.is_empty()
    }
}

impl Drop for LocalSessionCache {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.get_mut().take() {
            handle.abort();
        }
    }
}
