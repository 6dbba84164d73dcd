use sessionbox_backend::PartitionError;
use thiserror::Error;

/// Errors raised while reading configuration or building what it describes.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The YAML document is malformed or does not match the schema.
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_saphyr::Error),

    /// The backend was not compiled in or could not be created.
    #[error("backend not available: {0}")]
    BackendNotAvailable(String),

    /// The node list cannot form a hash ring.
    #[error(transparent)]
    Partition(#[from] PartitionError),
}
