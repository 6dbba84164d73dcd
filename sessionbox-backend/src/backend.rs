use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use sessionbox_core::{NodeId, SessionKey};
use smol_str::SmolStr;

use crate::BackendError;

/// Result type of every [`HashStore`] operation.
pub type BackendResult<T> = Result<T, BackendError>;

/// Field name / encoded value pairs of one session hash.
pub type HashFields = Vec<(SmolStr, String)>;

/// Status of a whole-record delete.
#[derive(Debug, PartialEq, Eq)]
pub enum DeleteStatus {
    /// Record successfully deleted.
    Deleted(u32),
    /// Record already missing.
    Missing,
}

/// Number of operations one backend node served since the last drain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardActivity {
    /// The node the operations were routed to.
    pub node: NodeId,
    /// Operations issued since the previous drain.
    pub operations: u64,
}

/// Remote hash-map key/value capability the session store persists into.
///
/// Each session is one hash record named by its [`SessionKey`]; each session
/// field is one hash entry holding type-tagged encoded text.
#[async_trait]
pub trait HashStore: Send + Sync {
    /// Reads every field of the record. A missing record yields no fields.
    async fn hash_get_all(&self, key: &SessionKey) -> BackendResult<HashFields>;

    /// Creates or overwrites the given fields.
    async fn hash_set(&self, key: &SessionKey, fields: &[(SmolStr, String)]) -> BackendResult<()>;

    /// Removes the given fields, returning how many existed.
    async fn hash_delete(&self, key: &SessionKey, fields: &[SmolStr]) -> BackendResult<u64>;

    /// Sets the record time-to-live. Returns `false` if the record does not exist.
    async fn key_expire(&self, key: &SessionKey, ttl: Duration) -> BackendResult<bool>;

    /// Removes the whole record.
    async fn key_delete(&self, key: &SessionKey) -> BackendResult<DeleteStatus>;

    /// Returns the name of this store for logging.
    fn name(&self) -> &str {
        "store"
    }

    /// Returns and resets per-node operation counters.
    ///
    /// Single-node stores have nothing to report.
    fn drain_activity(&self) -> Vec<ShardActivity> {
        Vec::new()
    }
}

#[async_trait]
impl<T> HashStore for Arc<T>
where
    T: HashStore + ?Sized,
{
    async fn hash_get_all(&self, key: &SessionKey) -> BackendResult<HashFields> {
        (**self).hash_get_all(key).await
    }

    async fn hash_set(&self, key: &SessionKey, fields: &[(SmolStr, String)]) -> BackendResult<()> {
        (**self).hash_set(key, fields).await
    }

    async fn hash_delete(&self, key: &SessionKey, fields: &[SmolStr]) -> BackendResult<u64> {
        (**self).hash_delete(key, fields).await
    }

    async fn key_expire(&self, key: &SessionKey, ttl: Duration) -> BackendResult<bool> {
        (**self).key_expire(key, ttl).await
    }

    async fn key_delete(&self, key: &SessionKey) -> BackendResult<DeleteStatus> {
        (**self).key_delete(key).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn drain_activity(&self) -> Vec<ShardActivity> {
        (**self).drain_activity()
    }
}

#[async_trait]
impl<T> HashStore for Box<T>
where
    T: HashStore + ?Sized,
{
    async fn hash_get_all(&self, key: &SessionKey) -> BackendResult<HashFields> {
        (**self).hash_get_all(key).await
    }

    async fn hash_set(&self, key: &SessionKey, fields: &[(SmolStr, String)]) -> BackendResult<()> {
        (**self).hash_set(key, fields).await
    }

    async fn hash_delete(&self, key: &SessionKey, fields: &[SmolStr]) -> BackendResult<u64> {
        (**self).hash_delete(key, fields).await
    }

    async fn key_expire(&self, key: &SessionKey, ttl: Duration) -> BackendResult<bool> {
        (**self).key_expire(key, ttl).await
    }

    async fn key_delete(&self, key: &SessionKey) -> BackendResult<DeleteStatus> {
        (**self).key_delete(key).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn drain_activity(&self) -> Vec<ShardActivity> {
        (**self).drain_activity()
    }
}
