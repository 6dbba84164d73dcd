//! Write dispatch policies and configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::WriteMode;

/// Policy for handling write timeouts.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, Eq, PartialEq)]
pub enum TimeoutPolicy {
    /// No timeout - write runs until completion.
    #[default]
    None,
    /// Cancel write after specified duration.
    Cancel(#[serde(with = "humantime_serde")] Duration),
    /// Log warning after duration but let write continue.
    Warn(#[serde(with = "humantime_serde")] Duration),
}

/// Configuration for the WriteDispatcher.
#[derive(Debug, Clone, Default)]
pub struct DispatchConfig {
    /// Whether writes are spawned or awaited.
    pub mode: WriteMode,
    /// Timeout policy for each write job.
    pub timeout_policy: TimeoutPolicy,
}

impl DispatchConfig {
    /// Create a new builder for DispatchConfig.
    pub fn builder() -> DispatchConfigBuilder {
        DispatchConfigBuilder::default()
    }
}

/// Builder for DispatchConfig.
#[derive(Debug, Clone, Default)]
pub struct DispatchConfigBuilder {
    mode: WriteMode,
    timeout_policy: TimeoutPolicy,
}

impl DispatchConfigBuilder {
    /// Set write mode.
    pub fn mode(self, mode: WriteMode) -> Self {
        Self { mode, ..self }
    }

    /// Set timeout policy.
    pub fn timeout_policy(self, policy: TimeoutPolicy) -> Self {
        Self {
            timeout_policy: policy,
            ..self
        }
    }

    /// Set timeout with cancel policy.
    pub fn timeout(self, duration: Duration) -> Self {
        self.timeout_policy(TimeoutPolicy::Cancel(duration))
    }

    /// Build the DispatchConfig.
    pub fn build(self) -> DispatchConfig {
        DispatchConfig {
            mode: self.mode,
            timeout_policy: self.timeout_policy,
        }
    }
}
