//! Session store configuration.
//!
//! [`SessionConfig`] carries every tunable that can be written down in a
//! configuration file. Durations use human-readable strings (`"20m"`, `"5s"`).
//! Behaviour that needs code (key derivation, overflow handling, observers)
//! is given to [`SessionProvider::builder`](crate::SessionProvider::builder)
//! instead.
//!
//! ```
//! use std::time::Duration;
//! use sessionbox::config::{SessionConfig, WriteMode};
//!
//! let config = SessionConfig::builder()
//!     .session_timeout(Duration::from_secs(600))
//!     .write_mode(WriteMode::Acknowledged)
//!     .build();
//! assert_eq!(config.max_session_bytes, 30_000);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use sessionbox_core::HashFunction;

use crate::offload::TimeoutPolicy;

/// Default idle time after which an unreferenced session leaves the local cache.
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(20 * 60);
/// Default size above which the overflow handler runs.
pub const DEFAULT_MAX_SESSION_BYTES: usize = 30_000;
/// Default period of the local cache sweep.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5);
/// Default period of backend activity reports.
pub const DEFAULT_ACTIVITY_INTERVAL: Duration = Duration::from_secs(30);

/// When the sweep may evict an unreferenced session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Default)]
pub enum EvictionPolicy {
    /// Evict once unreferenced and idle for the session timeout.
    #[default]
    Idle,
    /// Evict as soon as unreferenced, regardless of idle time.
    Eager,
}

/// How backend writes are issued.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Default)]
pub enum WriteMode {
    /// Spawn writes in the background; the caller never waits.
    #[default]
    FireAndForget,
    /// Await writes before the save call returns.
    Acknowledged,
}

/// Session store configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Backend record lifetime, refreshed on every load and save, and local
    /// idle time before eviction (e.g. "20m").
    #[serde(with = "humantime_serde")]
    pub session_timeout: Duration,
    /// Estimated size above which the overflow handler runs before saving.
    pub max_session_bytes: usize,
    /// Period of the local cache sweep (e.g. "5s").
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
    /// Period of backend activity reports, `None` to disable.
    #[serde(with = "humantime_serde")]
    pub activity_interval: Option<Duration>,
    /// Local cache eviction policy.
    pub eviction: EvictionPolicy,
    /// Whether saves wait for the backend.
    pub write_mode: WriteMode,
    /// Time limit applied to each dispatched write.
    pub write_timeout: TimeoutPolicy,
    /// Hash function for shard routing.
    pub hash: HashFunction,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_timeout: DEFAULT_SESSION_TIMEOUT,
            max_session_bytes: DEFAULT_MAX_SESSION_BYTES,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            activity_interval: Some(DEFAULT_ACTIVITY_INTERVAL),
            eviction: EvictionPolicy::default(),
            write_mode: WriteMode::default(),
            write_timeout: TimeoutPolicy::default(),
            hash: HashFunction::default(),
        }
    }
}

impl SessionConfig {
    /// Create a new builder for SessionConfig.
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }
}

/// Builder for SessionConfig.
#[derive(Debug, Clone, Default)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    /// Set the session timeout.
    pub fn session_timeout(mut self, timeout: Duration) -> Self {
        self.config.session_timeout = timeout;
        self
    }

    /// Set the overflow threshold in bytes.
    pub fn max_session_bytes(mut self, bytes: usize) -> Self {
        self.config.max_session_bytes = bytes;
        self
    }

    /// Set the sweep period.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.config.sweep_interval = interval;
        self
    }

    /// Set the activity report period.
    pub fn activity_interval(mut self, interval: Option<Duration>) -> Self {
        self.config.activity_interval = interval;
        self
    }

    /// Set eviction policy.
    pub fn eviction(mut self, eviction: EvictionPolicy) -> Self {
        self.config.eviction = eviction;
        self
    }

    /// Set write mode.
    pub fn write_mode(mut self, mode: WriteMode) -> Self {
        self.config.write_mode = mode;
        self
    }

    /// Set timeout policy for dispatched writes.
    pub fn write_timeout(mut self, policy: TimeoutPolicy) -> Self {
        self.config.write_timeout = policy;
        self
    }

    /// Set the routing hash function.
    pub fn hash(mut self, hash: HashFunction) -> Self {
        self.config.hash = hash;
        self
    }

    /// Build the SessionConfig.
    pub fn build(self) -> SessionConfig {
        self.config
    }
}
