//! WriteDispatcher implementation for backend write jobs.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use sessionbox_core::SessionKey;
use smol_str::SmolStr;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info_span, warn};

use super::policy::{DispatchConfig, TimeoutPolicy};
use crate::SessionError;
use crate::config::WriteMode;
use crate::metrics;

/// Key identifying one dispatched write job.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WriteKey {
    /// Kind of the job (e.g., "save", "expire", "discard").
    pub kind: SmolStr,
    /// Session the job writes to.
    pub session: SessionKey,
    /// Unique identifier within the dispatcher.
    pub id: u64,
}

/// Handle to a spawned write job.
#[derive(Debug)]
pub struct WriteHandle {
    handle: JoinHandle<()>,
}

impl WriteHandle {
    /// Check if the job is finished.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Internal state shared across clones.
#[derive(Debug)]
struct WriteDispatcherInner {
    config: DispatchConfig,
    tasks: DashMap<WriteKey, WriteHandle>,
    key_counter: AtomicU64,
}

/// Runs backend write jobs, either in the background or inline.
///
/// With [`WriteMode::FireAndForget`] every job is spawned and tracked until
/// it finishes; [`WriteDispatcher::flush`] waits for the stragglers. With
/// [`WriteMode::Acknowledged`] [`WriteDispatcher::dispatch`] awaits the job.
/// Either way the configured [`TimeoutPolicy`] applies, and the backend calls
/// inside one job run in order.
#[derive(Clone, Debug)]
pub struct WriteDispatcher {
    inner: Arc<WriteDispatcherInner>,
}

impl WriteDispatcher {
    /// Create a new WriteDispatcher with the given configuration.
    pub fn new(config: DispatchConfig) -> Self {
        Self {
            inner: Arc::new(WriteDispatcherInner {
                config,
                tasks: DashMap::new(),
                key_counter: AtomicU64::new(0),
            }),
        }
    }

    /// The configured write mode.
    pub fn mode(&self) -> WriteMode {
        self.inner.config.mode
    }

    fn next_key(&self, kind: impl Into<SmolStr>, session: &SessionKey) -> WriteKey {
        let id = self.inner.key_counter.fetch_add(1, Ordering::Relaxed);
        WriteKey {
            kind: kind.into(),
            session: session.clone(),
            id,
        }
    }

    /// Run a write job for `session`.
    ///
    /// Returns once the job is spawned, or once it completed in acknowledged
    /// mode. Jobs report their own failures.
    pub async fn dispatch<F>(&self, kind: impl Into<SmolStr>, session: &SessionKey, job: F) -> WriteKey
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let key = self.next_key(kind, session);
        let span = info_span!(
            "write_job",
            kind = %key.kind,
            session = %key.session,
            id = key.id,
        );
        metrics::record_write_dispatched(&key.kind);

        match self.inner.config.mode {
            WriteMode::FireAndForget => {
                let inner = self.inner.clone();
                let tracked = key.clone();
                let policy = self.inner.config.timeout_policy;
                // The job removes its own entry only after it has been inserted.
                let (registered, wait_registered) = oneshot::channel::<()>();
                let handle = tokio::spawn(
                    async move {
                        run(job, &tracked, policy).await;
                        let _ = wait_registered.await;
                        inner.tasks.remove(&tracked);
                    }
                    .instrument(span),
                );
                self.inner.tasks.insert(key.clone(), WriteHandle { handle });
                let _ = registered.send(());
            }
            WriteMode::Acknowledged => {
                run(job, &key, self.inner.config.timeout_policy)
                    .instrument(span)
                    .await;
            }
        }
        key
    }

    /// Get the number of currently active jobs.
    pub fn active_task_count(&self) -> usize {
        self.inner.tasks.iter().filter(|e| !e.is_finished()).count()
    }

    /// Get the total number of tracked jobs (including finished).
    pub fn total_task_count(&self) -> usize {
        self.inner.tasks.len()
    }

    /// Clean up finished job handles.
    pub fn cleanup_finished(&self) {
        self.inner.tasks.retain(|_, handle| !handle.is_finished());
    }

    /// Wait for all currently tracked jobs to complete.
    ///
    /// This polls active jobs until all are finished, with a small yield
    /// between checks to avoid busy-waiting.
    pub async fn wait_all(&self) {
        loop {
            self.cleanup_finished();

            if self.inner.tasks.is_empty() {
                break;
            }

            tokio::task::yield_now().await;
        }
    }

    /// Wait for all jobs with a timeout.
    ///
    /// Returns `true` if all jobs completed within the timeout,
    /// `false` if the timeout was reached.
    pub async fn wait_all_timeout(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.wait_all()).await.is_ok()
    }

    /// Wait for pending jobs, failing if some are still running after `timeout`.
    pub async fn flush(&self, timeout: Duration) -> Result<(), SessionError> {
        let start = Instant::now();
        if self.wait_all_timeout(timeout).await {
            return Ok(());
        }
        Err(SessionError::Dispatch {
            pending: self.active_task_count(),
            elapsed_ms: start.elapsed().as_millis(),
        })
    }
}

async fn run<F>(job: F, key: &WriteKey, policy: TimeoutPolicy)
where
    F: Future<Output = ()>,
{
    let start = Instant::now();
    match policy {
        TimeoutPolicy::None => job.await,
        TimeoutPolicy::Cancel(duration) => {
            if tokio::time::timeout(duration, job).await.is_err() {
                warn!(?key, "Write job cancelled due to timeout");
                metrics::record_write_timeout(&key.kind, start.elapsed());
                return;
            }
        }
        TimeoutPolicy::Warn(duration) => {
            job.await;
            let elapsed = start.elapsed();
            if elapsed > duration {
                warn!(
                    ?key,
                    elapsed_ms = elapsed.as_millis(),
                    threshold_ms = duration.as_millis(),
                    "Write job exceeded timeout threshold"
                );
            }
        }
    }
    debug!(?key, "Write job finished");
    metrics::record_write_completed(&key.kind, start.elapsed());
}
