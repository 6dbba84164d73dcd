//! Metrics declaration and initialization.
//!
//! All metrics follow the pattern `sessionbox_{subject}_{metric_type}`. They
//! are recorded only with the `metrics` feature; otherwise every function
//! below is an empty inline stub.

use std::time::Duration;

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
lazy_static! {
    // Local cache metrics

    /// Track number of acquires served by an already loaded session.
    pub static ref SESSION_CACHE_HIT_COUNTER: &'static str = {
        metrics::describe_counter!(
            "sessionbox_cache_hit_total",
            "Total number of session acquires served from the local cache."
        );
        "sessionbox_cache_hit_total"
    };
    /// Track number of acquires that had to load the session.
    pub static ref SESSION_CACHE_MISS_COUNTER: &'static str = {
        metrics::describe_counter!(
            "sessionbox_cache_miss_total",
            "Total number of session acquires that loaded from the backend."
        );
        "sessionbox_cache_miss_total"
    };
    /// Track number of sessions evicted by the sweep.
    pub static ref SESSION_EVICTED_COUNTER: &'static str = {
        metrics::describe_counter!(
            "sessionbox_cache_evicted_total",
            "Total number of sessions evicted from the local cache."
        );
        "sessionbox_cache_evicted_total"
    };
    /// Number of sessions currently held in the local cache.
    pub static ref SESSIONS_CACHED_GAUGE: &'static str = {
        metrics::describe_gauge!(
            "sessionbox_cache_sessions",
            "Number of sessions held in the local cache after the last sweep."
        );
        "sessionbox_cache_sessions"
    };

    // Sync protocol metrics

    /// Track number of session loads.
    pub static ref SESSION_LOAD_COUNTER: &'static str = {
        metrics::describe_counter!(
            "sessionbox_load_total",
            "Total number of sessions read from the backend."
        );
        "sessionbox_load_total"
    };
    /// Track number of session saves.
    pub static ref SESSION_SAVE_COUNTER: &'static str = {
        metrics::describe_counter!(
            "sessionbox_save_total",
            "Total number of session saves."
        );
        "sessionbox_save_total"
    };
    /// Size of sessions at save time.
    pub static ref SESSION_SIZE_HISTOGRAM: &'static str = {
        metrics::describe_histogram!(
            "sessionbox_session_size_bytes",
            metrics::Unit::Bytes,
            "Estimated session size at save time."
        );
        "sessionbox_session_size_bytes"
    };
    /// Track number of overflow handler runs.
    pub static ref SESSION_OVERFLOW_COUNTER: &'static str = {
        metrics::describe_counter!(
            "sessionbox_overflow_total",
            "Total number of saves that exceeded the maximum session size."
        );
        "sessionbox_overflow_total"
    };

    // Write dispatch metrics

    /// Track number of dispatched write jobs.
    pub static ref WRITES_DISPATCHED_COUNTER: &'static str = {
        metrics::describe_counter!(
            "sessionbox_writes_dispatched_total",
            "Total number of backend write jobs dispatched."
        );
        "sessionbox_writes_dispatched_total"
    };
    /// Track number of completed write jobs.
    pub static ref WRITES_COMPLETED_COUNTER: &'static str = {
        metrics::describe_counter!(
            "sessionbox_writes_completed_total",
            "Total number of backend write jobs completed."
        );
        "sessionbox_writes_completed_total"
    };
    /// Track number of write jobs cancelled by timeout.
    pub static ref WRITES_TIMEOUT_COUNTER: &'static str = {
        metrics::describe_counter!(
            "sessionbox_writes_timeout_total",
            "Total number of backend write jobs cancelled due to timeout."
        );
        "sessionbox_writes_timeout_total"
    };
    /// Histogram of write job duration.
    pub static ref WRITE_DURATION_HISTOGRAM: &'static str = {
        metrics::describe_histogram!(
            "sessionbox_write_duration_seconds",
            metrics::Unit::Seconds,
            "Duration of backend write jobs in seconds."
        );
        "sessionbox_write_duration_seconds"
    };
}

/// Record a local cache hit or miss.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_acquire(hit: bool) {
    if hit {
        metrics::counter!(*SESSION_CACHE_HIT_COUNTER).increment(1);
    } else {
        metrics::counter!(*SESSION_CACHE_MISS_COUNTER).increment(1);
    }
}

/// Record a local cache hit or miss (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_acquire(_hit: bool) {}

/// Record a sweep pass.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_sweep(evicted: usize, remaining: usize) {
    metrics::counter!(*SESSION_EVICTED_COUNTER).increment(evicted as u64);
    metrics::gauge!(*SESSIONS_CACHED_GAUGE).set(remaining as f64);
}

/// Record a sweep pass (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_sweep(_evicted: usize, _remaining: usize) {}

/// Record a session load.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_load(ok: bool) {
    metrics::counter!(*SESSION_LOAD_COUNTER, "status" => if ok { "ok" } else { "error" })
        .increment(1);
}

/// Record a session load (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_load(_ok: bool) {}

/// Record a session save and its estimated size.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_save(size: usize, overflow: bool) {
    metrics::counter!(*SESSION_SAVE_COUNTER).increment(1);
    metrics::histogram!(*SESSION_SIZE_HISTOGRAM).record(size as f64);
    if overflow {
        metrics::counter!(*SESSION_OVERFLOW_COUNTER).increment(1);
    }
}

/// Record a session save (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_save(_size: usize, _overflow: bool) {}

/// Record a dispatched write job.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_write_dispatched(kind: &str) {
    metrics::counter!(*WRITES_DISPATCHED_COUNTER, "kind" => kind.to_string()).increment(1);
}

/// Record a dispatched write job (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_write_dispatched(_kind: &str) {}

/// Record a completed write job.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_write_completed(kind: &str, duration: Duration) {
    metrics::counter!(*WRITES_COMPLETED_COUNTER, "kind" => kind.to_string()).increment(1);
    metrics::histogram!(*WRITE_DURATION_HISTOGRAM, "kind" => kind.to_string())
        .record(duration.as_secs_f64());
}

/// Record a completed write job (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_write_completed(_kind: &str, _duration: Duration) {}

/// Record a write job cancelled by timeout.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_write_timeout(kind: &str, duration: Duration) {
    metrics::counter!(*WRITES_TIMEOUT_COUNTER, "kind" => kind.to_string()).increment(1);
    metrics::histogram!(*WRITE_DURATION_HISTOGRAM, "kind" => kind.to_string())
        .record(duration.as_secs_f64());
}

/// Record a write job cancelled by timeout (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_write_timeout(_kind: &str, _duration: Duration) {}
