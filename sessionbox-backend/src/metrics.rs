//! Backend metrics for sessionbox.
//!
//! Enable the `metrics` feature to record them; without it every function
//! here compiles to nothing.
//!
//! ## Naming Pattern
//!
//! All metrics follow the pattern: `sessionbox_backend_{subject}_{metric_type}`
//!
//! - `sessionbox_backend_node_operations_total` - calls routed to each shard node
//! - `sessionbox_backend_call_*` - per-store call counts, durations and errors

use std::time::Duration;

#[cfg(feature = "metrics")]
use std::time::Instant;

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

/// Zero-cost timer for metrics collection.
///
/// When the `metrics` feature is enabled, this captures the start time.
/// When disabled, this is a zero-sized struct with no overhead.
pub struct Timer {
    #[cfg(feature = "metrics")]
    start: Instant,
}

impl Timer {
    /// Create a new timer, capturing the current instant if metrics enabled.
    #[inline]
    pub fn new() -> Self {
        Self {
            #[cfg(feature = "metrics")]
            start: Instant::now(),
        }
    }

    /// Get elapsed duration since timer creation.
    ///
    /// Returns actual elapsed time when metrics enabled, Duration::ZERO otherwise.
    #[inline]
    pub fn elapsed(&self) -> Duration {
        #[cfg(feature = "metrics")]
        {
            self.start.elapsed()
        }
        #[cfg(not(feature = "metrics"))]
        {
            Duration::ZERO
        }
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "metrics")]
lazy_static! {
    /// Metric name for calls routed to a shard node.
    pub static ref BACKEND_NODE_OPERATIONS: &'static str = {
        metrics::describe_counter!(
            "sessionbox_backend_node_operations_total",
            "Total number of store calls routed to each shard node."
        );
        "sessionbox_backend_node_operations_total"
    };

    /// Metric name for total store calls.
    pub static ref BACKEND_CALL_TOTAL: &'static str = {
        metrics::describe_counter!(
            "sessionbox_backend_call_total",
            "Total number of hash store calls per backend and operation."
        );
        "sessionbox_backend_call_total"
    };

    /// Metric name for store call duration histogram.
    pub static ref BACKEND_CALL_DURATION: &'static str = {
        metrics::describe_histogram!(
            "sessionbox_backend_call_duration_seconds",
            metrics::Unit::Seconds,
            "Duration of hash store calls in seconds."
        );
        "sessionbox_backend_call_duration_seconds"
    };

    /// Metric name for failed store calls.
    pub static ref BACKEND_CALL_ERRORS: &'static str = {
        metrics::describe_counter!(
            "sessionbox_backend_call_errors_total",
            "Total number of failed hash store calls per backend and operation."
        );
        "sessionbox_backend_call_errors_total"
    };
}

/// Record a call routed to a shard node.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_operation(node: &str, operation: &'static str) {
    metrics::counter!(
        *BACKEND_NODE_OPERATIONS,
        "node" => node.to_string(),
        "operation" => operation
    )
    .increment(1);
}

/// Record a routed call (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_operation(_node: &str, _operation: &'static str) {}

/// Record a completed store call with its duration.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_call(backend: &str, operation: &'static str, duration: Duration) {
    metrics::counter!(
        *BACKEND_CALL_TOTAL,
        "backend" => backend.to_string(),
        "operation" => operation
    )
    .increment(1);
    metrics::histogram!(
        *BACKEND_CALL_DURATION,
        "backend" => backend.to_string(),
        "operation" => operation
    )
    .record(duration.as_secs_f64());
}

/// Record a store call (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_call(_backend: &str, _operation: &'static str, _duration: Duration) {}

/// Record a failed store call.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_call_error(backend: &str, operation: &'static str) {
    metrics::counter!(
        *BACKEND_CALL_ERRORS,
        "backend" => backend.to_string(),
        "operation" => operation
    )
    .increment(1);
}

/// Record a failed call (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_call_error(_backend: &str, _operation: &'static str) {}
