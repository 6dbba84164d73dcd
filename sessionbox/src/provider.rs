//! Host-facing entry points of the session store.
//!
//! A request pipeline calls [`SessionProvider::load_or_create`] when a
//! request starts and one of [`save`](SessionProvider::save),
//! [`discard`](SessionProvider::discard) or
//! [`end_request`](SessionProvider::end_request) when it ends. Code running
//! outside a request uses [`SessionProvider::open`], which hands out a
//! [`SessionLease`] that saves the session when finished or dropped.

use std::convert::Infallible;
use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use sessionbox_backend::{HashStore, SessionCodec};
use sessionbox_core::SessionKey;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{Instrument, debug, info_span, trace, warn};

use crate::cache::LocalSessionCache;
use crate::config::SessionConfig;
use crate::key::{IdentityKey, KeyDerivation, RequestIdentity};
use crate::observer::{NoopObserver, SessionObserver};
use crate::sync::{ClearOnOverflow, OverflowHandler, SessionSync};
use crate::{SessionError, SessionItems};

struct ProviderInner<S> {
    config: SessionConfig,
    sync: SessionSync<S>,
    cache: LocalSessionCache,
    keys: Arc<dyn KeyDerivation>,
    observer: Arc<dyn SessionObserver>,
    reporter: Mutex<Option<JoinHandle<()>>>,
}

impl<S> ProviderInner<S>
where
    S: HashStore + 'static,
{
    fn report_activity(&self) {
        let activity = self.sync.drain_activity();
        if activity.is_empty() {
            return;
        }
        trace!(nodes = activity.len(), "Reporting backend activity");
        self.observer.on_connection_activity(&activity);
    }
}

impl<S> Drop for ProviderInner<S> {
    fn drop(&mut self) {
        if let Some(handle) = self.reporter.get_mut().take() {
            handle.abort();
        }
    }
}

/// Shared session store serving a request pipeline.
///
/// Cheap to clone; clones share the local cache and the backend.
pub struct SessionProvider<S> {
    inner: Arc<ProviderInner<S>>,
}

impl<S> Clone for SessionProvider<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S> fmt::Debug for SessionProvider<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionProvider")
            .field("config", &self.inner.config)
            .field("cached", &self.inner.cache.len())
            .finish_non_exhaustive()
    }
}

impl<S> SessionProvider<S>
where
    S: HashStore + 'static,
{
    /// Creates a builder over `store`.
    pub fn builder(store: S) -> SessionProviderBuilder<S> {
        SessionProviderBuilder::new(Arc::new(store))
    }

    /// Creates a provider with default settings.
    pub fn new(store: S) -> Self {
        Self::builder(store).build()
    }

    /// The configuration the provider was built with.
    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// The local session cache.
    pub fn cache(&self) -> &LocalSessionCache {
        &self.inner.cache
    }

    /// The backend protocol.
    pub fn sync(&self) -> &SessionSync<S> {
        &self.inner.sync
    }

    /// Backend key of the session named `session_id`.
    pub fn key(&self, session_id: &str, identity: &RequestIdentity) -> SessionKey {
        self.inner.keys.derive(session_id, identity)
    }

    /// A fresh collection for a request that has no session yet.
    pub fn create_empty(&self) -> SessionItems {
        SessionItems::new()
    }

    /// Returns the shared collection of the session, loading it from the
    /// backend if no other request holds it. Every call must be balanced by
    /// [`save`](Self::save), [`discard`](Self::discard) or
    /// [`end_request`](Self::end_request).
    pub async fn load_or_create(
        &self,
        session_id: &str,
        identity: &RequestIdentity,
    ) -> Arc<SessionItems> {
        let key = self.key(session_id, identity);
        self.acquire(&key).await
    }

    /// Releases this request's hold on the session and writes its changes.
    ///
    /// Writes the shared collection if the session is cached, `items`
    /// otherwise. The write happens whether or not other requests still hold
    /// the session.
    pub async fn save(&self, session_id: &str, identity: &RequestIdentity, items: &SessionItems) {
        let key = self.key(session_id, identity);
        match self.inner.cache.release(&key) {
            Some(released) => self.inner.sync.save(&key, &released.items).await,
            None => self.inner.sync.save(&key, items).await,
        }
    }

    /// Releases this request's hold on the session and deletes its record.
    ///
    /// The shared collection is emptied so that requests still holding it do
    /// not write the fields back.
    pub async fn discard(&self, session_id: &str, identity: &RequestIdentity) {
        let key = self.key(session_id, identity);
        if let Some(released) = self.inner.cache.release(&key) {
            released.items.reset();
        }
        debug!(%key, "Discarding session");
        self.inner.sync.discard(&key).await;
    }

    /// Releases this request's hold on the session, writing its changes if
    /// no other request holds it anymore.
    pub async fn end_request(&self, session_id: &str, identity: &RequestIdentity) {
        let key = self.key(session_id, identity);
        match self.inner.cache.release(&key) {
            Some(released) if released.last => self.inner.sync.save(&key, &released.items).await,
            Some(_) => trace!(%key, "Session still held by other requests"),
            None => trace!(%key, "No cached session to release"),
        }
    }

    /// Opens the session outside of a request pipeline.
    pub async fn open(&self, session_id: &str, identity: &RequestIdentity) -> SessionLease<S> {
        let key = self.key(session_id, identity);
        let items = self.acquire(&key).await;
        SessionLease {
            provider: self.clone(),
            key,
            items,
            finished: false,
        }
    }

    /// Starts the cache sweep and, if configured, backend activity reports.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        self.inner.cache.start();

        let Some(period) = self.inner.config.activity_interval else {
            return;
        };
        let mut reporter = self.inner.reporter.lock();
        if reporter.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }
        let period = period.max(Duration::from_millis(1));
        let inner = Arc::downgrade(&self.inner);
        *reporter = Some(tokio::spawn(
            activity_loop(inner, period).instrument(info_span!("session_activity")),
        ));
    }

    /// Stops background tasks and waits up to `timeout` for pending writes.
    pub async fn stop(&self, timeout: Duration) -> Result<(), SessionError> {
        self.inner.cache.stop();
        if let Some(handle) = self.inner.reporter.lock().take() {
            handle.abort();
        }
        self.flush(timeout).await
    }

    /// Waits up to `timeout` for pending background writes.
    pub async fn flush(&self, timeout: Duration) -> Result<(), SessionError> {
        let result = self.inner.sync.dispatcher().flush(timeout).await;
        if let Err(error) = &result {
            warn!(%error, "Session writes did not finish in time");
            self.inner.observer.on_error(error, None);
        }
        result
    }

    /// Hands the backend call counts since the previous report to the observer.
    pub fn report_activity(&self) {
        self.inner.report_activity();
    }

    async fn acquire(&self, key: &SessionKey) -> Arc<SessionItems> {
        let loaded: Result<_, Infallible> = self.inner.cache.acquire(key, &self.inner.sync).await;
        match loaded {
            Ok(items) => items,
            Err(never) => match never {},
        }
    }

    fn release(&self, key: &SessionKey, items: &Arc<SessionItems>) -> Arc<SessionItems> {
        self.inner
            .cache
            .release(key)
            .map_or_else(|| items.clone(), |released| released.items)
    }
}

async fn activity_loop<S>(inner: Weak<ProviderInner<S>>, period: Duration)
where
    S: HashStore + 'static,
{
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        match inner.upgrade() {
            Some(inner) => inner.report_activity(),
            None => break,
        }
    }
}

/// Builder for [`SessionProvider`].
pub struct SessionProviderBuilder<S> {
    store: Arc<S>,
    config: SessionConfig,
    codec: SessionCodec,
    keys: Arc<dyn KeyDerivation>,
    observer: Arc<dyn SessionObserver>,
    overflow: Arc<dyn OverflowHandler>,
}

impl<S> SessionProviderBuilder<S>
where
    S: HashStore + 'static,
{
    fn new(store: Arc<S>) -> Self {
        Self {
            store,
            config: SessionConfig::default(),
            codec: SessionCodec::new(),
            keys: Arc::new(IdentityKey),
            observer: Arc::new(NoopObserver),
            overflow: Arc::new(ClearOnOverflow),
        }
    }

    /// Set the session configuration.
    pub fn config(self, config: SessionConfig) -> Self {
        Self { config, ..self }
    }

    /// Set the codec, e.g. one with its own type registry.
    pub fn codec(self, codec: SessionCodec) -> Self {
        Self { codec, ..self }
    }

    /// Set how session identifiers map to backend keys.
    pub fn key_derivation(self, keys: impl KeyDerivation + 'static) -> Self {
        Self {
            keys: Arc::new(keys),
            ..self
        }
    }

    /// Set the observer.
    pub fn observer(self, observer: impl SessionObserver + 'static) -> Self {
        Self {
            observer: Arc::new(observer),
            ..self
        }
    }

    /// Set the overflow handler.
    pub fn overflow_handler(self, overflow: impl OverflowHandler + 'static) -> Self {
        Self {
            overflow: Arc::new(overflow),
            ..self
        }
    }

    /// Build the provider. Background tasks start with
    /// [`SessionProvider::start`].
    pub fn build(self) -> SessionProvider<S> {
        let sync = SessionSync::new(self.store, &self.config)
            .with_codec(self.codec)
            .with_observer(self.observer.clone())
            .with_overflow(self.overflow);
        let cache = LocalSessionCache::with_observer(&self.config, self.observer.clone());
        SessionProvider {
            inner: Arc::new(ProviderInner {
                config: self.config,
                sync,
                cache,
                keys: self.keys,
                observer: self.observer,
                reporter: Mutex::new(None),
            }),
        }
    }
}

/// A session opened with [`SessionProvider::open`].
///
/// Dereferences to the shared [`SessionItems`]. [`finish`](Self::finish)
/// releases the session and writes its changes. Dropping an unfinished lease
/// does the same with the write spawned on the current runtime.
pub struct SessionLease<S>
where
    S: HashStore + 'static,
{
    provider: SessionProvider<S>,
    key: SessionKey,
    items: Arc<SessionItems>,
    finished: bool,
}

impl<S> SessionLease<S>
where
    S: HashStore + 'static,
{
    /// Backend key of the session.
    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    /// The shared collection.
    pub fn items(&self) -> &Arc<SessionItems> {
        &self.items
    }

    /// Releases the session and writes its changes.
    pub async fn finish(mut self) {
        self.finished = true;
        let items = self.provider.release(&self.key, &self.items);
        self.provider.inner.sync.save(&self.key, &items).await;
    }
}

impl<S> Deref for SessionLease<S>
where
    S: HashStore + 'static,
{
    type Target = SessionItems;

    fn deref(&self) -> &SessionItems {
        &self.items
    }
}

impl<S> fmt::Debug for SessionLease<S>
where
    S: HashStore + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionLease")
            .field("key", &self.key)
            .field("items", &self.items)
            .finish()
    }
}

impl<S> Drop for SessionLease<S>
where
    S: HashStore + 'static,
{
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let items = self.provider.release(&self.key, &self.items);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let provider = self.provider.clone();
                let key = self.key.clone();
                runtime.spawn(async move { provider.inner.sync.save(&key, &items).await });
            }
            Err(_) => warn!(key = %self.key, "Session lease dropped outside a runtime, changes lost"),
        }
    }
}
