use sessionbox_backend::{BackendError, FormatError};
use smol_str::SmolStr;
use thiserror::Error;

/// Errors raised while serving sessions.
///
/// None of these reach the host request: every path that can fail logs the
/// error, hands it to the [`SessionObserver`](crate::SessionObserver) and
/// carries on with partial or empty data.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The backend store failed.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// A single field could not be encoded or decoded.
    #[error("session field `{field}`: {source}")]
    Format {
        /// Name of the offending field.
        field: SmolStr,
        /// What went wrong.
        #[source]
        source: FormatError,
    },

    /// A sweep pass panicked or was cancelled.
    #[error("sweep pass failed: {0}")]
    Sweep(#[from] tokio::task::JoinError),

    /// Dispatched backend writes did not finish in time.
    #[error("{pending} backend writes still pending after {elapsed_ms}ms")]
    Dispatch {
        /// Writes still in flight.
        pending: usize,
        /// How long the flush waited.
        elapsed_ms: u128,
    },
}

impl SessionError {
    pub(crate) fn format(field: impl Into<SmolStr>, source: FormatError) -> Self {
        Self::Format {
            field: field.into(),
            source,
        }
    }
}
