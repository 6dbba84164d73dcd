//! Load and write-back protocol between [`SessionItems`] and a [`HashStore`].
//!
//! A session lives in the backend as one hash record whose entries are
//! type-tagged encoded fields. Loading reads the whole record and refreshes
//! its expiry. Saving writes only the delta: one `hash_set` for changed
//! fields, one `hash_delete` for removed fields and an expiry refresh, issued
//! in that order inside a single dispatched job.
//!
//! Failures never reach the caller. They are logged, handed to the
//! [`SessionObserver`] and the protocol carries on with whatever it has.

use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sessionbox_backend::{HashStore, SessionCodec, ShardActivity};
use sessionbox_core::SessionKey;
use smol_str::SmolStr;
use tracing::{debug, error, warn};

use crate::cache::SessionLoader;
use crate::config::SessionConfig;
use crate::metrics;
use crate::observer::{NoopObserver, SessionObserver};
use crate::offload::{DispatchConfig, WriteDispatcher};
use crate::{SessionError, SessionItems};

/// Decides what happens to a session that grew past the size limit.
///
/// Runs before the delta of the save is computed, so whatever it removes is
/// deleted from the backend by the same save.
pub trait OverflowHandler: Send + Sync {
    /// Called with the estimated size in bytes.
    fn on_overflow(&self, key: &SessionKey, items: &SessionItems, size: usize);
}

/// Drops every field of an oversized session.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClearOnOverflow;

impl OverflowHandler for ClearOnOverflow {
    fn on_overflow(&self, key: &SessionKey, items: &SessionItems, size: usize) {
        warn!(%key, size, fields = items.len(), "Clearing oversized session");
        items.clear();
    }
}

impl<F> OverflowHandler for F
where
    F: Fn(&SessionKey, &SessionItems, usize) + Send + Sync,
{
    fn on_overflow(&self, key: &SessionKey, items: &SessionItems, size: usize) {
        self(key, items, size)
    }
}

/// Reads and writes sessions through a [`HashStore`].
pub struct SessionSync<S> {
    store: Arc<S>,
    codec: SessionCodec,
    dispatcher: WriteDispatcher,
    observer: Arc<dyn SessionObserver>,
    overflow: Arc<dyn OverflowHandler>,
    session_timeout: Duration,
    max_session_bytes: usize,
}

impl<S> Clone for SessionSync<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            codec: self.codec.clone(),
            dispatcher: self.dispatcher.clone(),
            observer: self.observer.clone(),
            overflow: self.overflow.clone(),
            session_timeout: self.session_timeout,
            max_session_bytes: self.max_session_bytes,
        }
    }
}

impl<S> fmt::Debug for SessionSync<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionSync")
            .field("dispatcher", &self.dispatcher)
            .field("session_timeout", &self.session_timeout)
            .field("max_session_bytes", &self.max_session_bytes)
            .finish_non_exhaustive()
    }
}

impl<S> SessionSync<S>
where
    S: HashStore + 'static,
{
    /// Creates the protocol over `store` with the timeout, size limit and
    /// write settings of `config`, the global type registry, no observer and
    /// [`ClearOnOverflow`].
    pub fn new(store: Arc<S>, config: &SessionConfig) -> Self {
        let dispatch = DispatchConfig::builder()
            .mode(config.write_mode)
            .timeout_policy(config.write_timeout)
            .build();
        Self {
            store,
            codec: SessionCodec::new(),
            dispatcher: WriteDispatcher::new(dispatch),
            observer: Arc::new(NoopObserver),
            overflow: Arc::new(ClearOnOverflow),
            session_timeout: config.session_timeout,
            max_session_bytes: config.max_session_bytes,
        }
    }

    /// Replaces the codec.
    pub fn with_codec(self, codec: SessionCodec) -> Self {
        Self { codec, ..self }
    }

    /// Replaces the observer.
    pub fn with_observer(self, observer: Arc<dyn SessionObserver>) -> Self {
        Self { observer, ..self }
    }

    /// Replaces the overflow handler.
    pub fn with_overflow(self, overflow: Arc<dyn OverflowHandler>) -> Self {
        Self { overflow, ..self }
    }

    /// The backend store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// The field codec.
    pub fn codec(&self) -> &SessionCodec {
        &self.codec
    }

    /// The write dispatcher.
    pub fn dispatcher(&self) -> &WriteDispatcher {
        &self.dispatcher
    }

    /// Reads the session stored under `key` and refreshes its expiry.
    ///
    /// A backend failure yields an empty collection; undecodable fields are
    /// left out.
    pub async fn load(&self, key: &SessionKey) -> SessionItems {
        let items = match self.store.hash_get_all(key).await {
            Ok(raw) => {
                let bytes: usize = raw.iter().map(|(name, value)| name.len() + value.len()).sum();
                self.observer.on_session_loaded(key, bytes);

                let decoded = self.codec.decode_fields(raw);
                for (field, source) in decoded.errors {
                    let error = SessionError::format(field, source);
                    self.observer.on_error(&error, Some(key));
                }
                debug!(%key, fields = decoded.fields.len(), bytes, "Session loaded");
                metrics::record_load(true);
                SessionItems::from_decoded(decoded.fields)
            }
            Err(error) => {
                report(&*self.observer, key, error.into());
                metrics::record_load(false);
                SessionItems::new()
            }
        };

        let job = self.expire_job(key);
        self.dispatcher.dispatch("expire", key, job).await;
        items
    }

    /// Writes the changes of `items` back under `key`.
    ///
    /// Runs the overflow handler first if the session is over the size
    /// limit. The expiry is refreshed even when nothing changed.
    pub async fn save(&self, key: &SessionKey, items: &SessionItems) {
        let size = items.estimated_size(&self.codec);
        let overflow = size > self.max_session_bytes;
        if overflow {
            warn!(%key, size, limit = self.max_session_bytes, "Session exceeds maximum size");
            self.overflow.on_overflow(key, items, size);
        }
        metrics::record_save(size, overflow);

        let delta = items.delta(&self.codec);
        for (field, source) in delta.errors {
            let error = SessionError::format(field, source);
            warn!(%key, %error, "Skipping unencodable session field");
            self.observer.on_error(&error, Some(key));
        }
        let changed = delta
            .changed
            .into_iter()
            .map(|field| (field.name, field.encoded))
            .collect::<Vec<_>>();
        let removed = delta.removed;
        debug!(%key, changed = changed.len(), removed = removed.len(), "Saving session");

        let store = self.store.clone();
        let observer = self.observer.clone();
        let ttl = self.session_timeout;
        let session = key.clone();
        let job = async move {
            write_back(&*store, &*observer, &session, &changed, &removed).await;
            expire(&*store, &*observer, &session, ttl).await;
        };
        self.dispatcher.dispatch("save", key, job).await;
    }

    /// Deletes the whole record stored under `key`.
    pub async fn discard(&self, key: &SessionKey) {
        let store = self.store.clone();
        let observer = self.observer.clone();
        let session = key.clone();
        let job = async move {
            match store.key_delete(&session).await {
                Ok(status) => debug!(key = %session, ?status, "Session record deleted"),
                Err(error) => report(&*observer, &session, error.into()),
            }
        };
        self.dispatcher.dispatch("discard", key, job).await;
    }

    /// Per-node backend call counts since the previous call.
    pub fn drain_activity(&self) -> Vec<ShardActivity> {
        self.store.drain_activity()
    }

    fn expire_job(&self, key: &SessionKey) -> impl Future<Output = ()> + Send + 'static {
        let store = self.store.clone();
        let observer = self.observer.clone();
        let ttl = self.session_timeout;
        let session = key.clone();
        async move { expire(&*store, &*observer, &session, ttl).await }
    }
}

#[async_trait]
impl<S> SessionLoader for SessionSync<S>
where
    S: HashStore + 'static,
{
    type Error = Infallible;

    async fn load(&self, key: &SessionKey) -> Result<SessionItems, Self::Error> {
        Ok(SessionSync::load(self, key).await)
    }
}

async fn write_back<S>(
    store: &S,
    observer: &dyn SessionObserver,
    key: &SessionKey,
    changed: &[(SmolStr, String)],
    removed: &[SmolStr],
) where
    S: HashStore + ?Sized,
{
    if !changed.is_empty() {
        match store.hash_set(key, changed).await {
            Ok(()) => observer.on_fields_written(key, changed),
            Err(error) => report(observer, key, error.into()),
        }
    }
    if !removed.is_empty() {
        match store.hash_delete(key, removed).await {
            Ok(_) => observer.on_fields_removed(key, removed),
            Err(error) => report(observer, key, error.into()),
        }
    }
}

async fn expire<S>(store: &S, observer: &dyn SessionObserver, key: &SessionKey, ttl: Duration)
where
    S: HashStore + ?Sized,
{
    match store.key_expire(key, ttl).await {
        Ok(true) => {}
        Ok(false) => debug!(%key, "No session record to expire"),
        Err(error) => report(observer, key, error.into()),
    }
}

fn report(observer: &dyn SessionObserver, key: &SessionKey, error: SessionError) {
    error!(%key, %error, "Session backend call failed");
    observer.on_error(&error, Some(key));
}
