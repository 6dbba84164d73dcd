#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

/// Local reference-counted session cache.
///
/// Provides [`LocalSessionCache`](cache::LocalSessionCache), which lets every
/// in-flight request for one session share a single [`SessionItems`], and the
/// [`SessionLoader`](cache::SessionLoader) seam it fills misses through.
pub mod cache;

/// Session store configuration.
///
/// Defines [`SessionConfig`](config::SessionConfig) with:
/// - **Session timeout** — backend record lifetime and local idle limit
/// - **Size limit** — estimated size above which the overflow handler runs
/// - **Sweep and activity periods** — timing of background tasks
/// - **Write mode** — fire-and-forget or acknowledged backend writes
pub mod config;

/// Error types for session operations.
pub mod error;

/// Dirty-tracking session fields.
pub mod items;

/// Session key derivation.
///
/// Maps host session identifiers to backend keys through the
/// [`KeyDerivation`](key::KeyDerivation) trait.
pub mod key;

/// Metrics collection for session store observability.
///
/// When the `metrics` feature is enabled, this module provides counters
/// and histograms for:
/// - Local cache hits, misses and evictions
/// - Session loads, saves, sizes and overflows
/// - Dispatched backend writes and their duration
pub mod metrics;

/// Observer hooks for errors and backend traffic.
pub mod observer;

/// Background dispatch of backend writes.
///
/// Provides the [`WriteDispatcher`](offload::WriteDispatcher) that runs the
/// write-back jobs of saves, expiry refreshes and discards.
pub mod offload;

/// Host pipeline entry points.
pub mod provider;

/// Load and write-back protocol.
pub mod sync;

pub use cache::{LocalSessionCache, Released, SessionLoader};
pub use config::{EvictionPolicy, SessionConfig, SessionConfigBuilder, WriteMode};
pub use error::SessionError;
pub use items::{ChangedField, ItemsDelta, SessionItems};
pub use key::{ApplicationScopedKey, IdentityKey, KeyDerivation, PrefixedKey, RequestIdentity};
pub use observer::{NoopObserver, SessionObserver};
pub use provider::{SessionLease, SessionProvider, SessionProviderBuilder};
pub use sync::{ClearOnOverflow, OverflowHandler, SessionSync};

pub use sessionbox_backend::{HashStore, SessionCodec, TypeRegistry};
pub use sessionbox_core::{SessionKey, SessionValue};

/// The `sessionbox` prelude.
///
/// ```rust
/// use sessionbox::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        HashStore, RequestIdentity, SessionConfig, SessionItems, SessionKey, SessionProvider,
        SessionValue,
    };
}
