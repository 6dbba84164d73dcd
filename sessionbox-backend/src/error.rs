//! Error types for backend operations.

use crate::format::FormatError;
use crate::partition::PartitionError;
use thiserror::Error;

/// Error type for backend operations.
///
/// This enum categorizes errors that can occur during hash store interactions
/// into distinct groups for appropriate handling.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Internal backend error, state or computation error.
    ///
    /// Any error not related to network interaction.
    #[error(transparent)]
    InternalError(Box<dyn std::error::Error + Send>),

    /// Network interaction error.
    ///
    /// Errors occurring during communication with remote stores (e.g., Redis).
    #[error(transparent)]
    ConnectionError(Box<dyn std::error::Error + Send>),

    /// Field encoding or decoding error.
    #[error(transparent)]
    FormatError(#[from] FormatError),

    /// The shard layout could not be built.
    #[error(transparent)]
    PartitionError(#[from] PartitionError),
}
