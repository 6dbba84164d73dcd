//! Hooks for watching what the session store does.
//!
//! Everything reported here is also logged through `tracing`; an observer is
//! for hosts that want to forward errors to their own error reporting or keep
//! statistics on session sizes and backend traffic.

use std::sync::Arc;

use sessionbox_backend::ShardActivity;
use sessionbox_core::SessionKey;
use smol_str::SmolStr;

use crate::SessionError;

/// Receives session store events. Every method defaults to doing nothing.
///
/// Methods are called inline on request and background tasks and must not
/// block.
pub trait SessionObserver: Send + Sync {
    /// An error was swallowed to keep the request going.
    fn on_error(&self, _error: &SessionError, _key: Option<&SessionKey>) {}

    /// Fields were written to the backend.
    fn on_fields_written(&self, _key: &SessionKey, _fields: &[(SmolStr, String)]) {}

    /// Fields were removed from the backend.
    fn on_fields_removed(&self, _key: &SessionKey, _fields: &[SmolStr]) {}

    /// A session was read from the backend; `bytes` is the size of its raw fields.
    fn on_session_loaded(&self, _key: &SessionKey, _bytes: usize) {}

    /// Per-node backend call counts since the previous report.
    fn on_connection_activity(&self, _activity: &[ShardActivity]) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

impl<T> SessionObserver for Arc<T>
where
    T: SessionObserver + ?Sized,
{
    fn on_error(&self, error: &SessionError, key: Option<&SessionKey>) {
        (**self).on_error(error, key)
    }

    fn on_fields_written(&self, key: &SessionKey, fields: &[(SmolStr, String)]) {
        (**self).on_fields_written(key, fields)
    }

    fn on_fields_removed(&self, key: &SessionKey, fields: &[SmolStr]) {
        (**self).on_fields_removed(key, fields)
    }

    fn on_session_loaded(&self, key: &SessionKey, bytes: usize) {
        (**self).on_session_loaded(key, bytes)
    }

    fn on_connection_activity(&self, activity: &[ShardActivity]) {
        (**self).on_connection_activity(activity)
    }
}
