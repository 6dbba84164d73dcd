#![warn(missing_docs)]
//! Backend layer of sessionbox.
//!
//! - [`HashStore`] - the remote hash-map capability sessions are persisted into
//! - [`partition::HashRing`] - consistent-hash routing of session keys to nodes
//! - [`ShardedStore`] - a [`HashStore`] spreading records over several nodes
//! - [`format::SessionCodec`] - the type-tagged textual field encoding
//!
//! If you want to implement your own store, implement [`HashStore`].
mod backend;
mod error;
pub mod format;
pub mod metrics;
pub mod partition;
mod sharded;

pub use backend::{BackendResult, DeleteStatus, HashFields, HashStore, ShardActivity};
pub use error::BackendError;
pub use format::{FormatError, SessionCodec, TypeRegistry};
pub use partition::{HashRing, PartitionError};
pub use sharded::{ShardedStore, ShardedStoreBuilder};
