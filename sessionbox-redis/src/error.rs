//! Error types for Redis store operations.
//!
//! All errors convert to [`BackendError`] for uniform handling by the session
//! layer. Transport failures become [`BackendError::ConnectionError`], anything
//! the server rejected becomes [`BackendError::InternalError`].
//!
//! [`BackendError`]: sessionbox_backend::BackendError
//! [`BackendError::ConnectionError`]: sessionbox_backend::BackendError::ConnectionError
//! [`BackendError::InternalError`]: sessionbox_backend::BackendError::InternalError

use redis::RedisError;
use sessionbox_backend::BackendError;

/// Error type for Redis store operations.
///
/// # When You'll Encounter This
///
/// - Using [`RedisStoreBuilder::build`] with an invalid connection URL
/// - Performing the first call when Redis is unreachable (the connection is
///   established lazily)
/// - Performing calls when the Redis server returns an error, for example
///   `WRONGTYPE` when the session key holds a non-hash value
///
/// [`RedisStoreBuilder::build`]: crate::RedisStoreBuilder::build
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An error from the underlying Redis client.
    #[error("Redis store error: {0}")]
    Redis(#[from] RedisError),
}

impl Error {
    /// Whether the error came from the network rather than the server.
    pub fn is_connection(&self) -> bool {
        match self {
            Self::Redis(error) => {
                error.is_io_error() || error.is_timeout() || error.is_connection_dropped()
            }
        }
    }
}

impl From<Error> for BackendError {
    fn from(error: Error) -> Self {
        if error.is_connection() {
            Self::ConnectionError(Box::new(error))
        } else {
            Self::InternalError(Box::new(error))
        }
    }
}
