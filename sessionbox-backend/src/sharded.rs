//! Store that spreads session records over several independent backends.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use sessionbox_core::{HashFunction, NodeId, SessionKey};
use smol_str::SmolStr;
use tracing::trace;

use crate::backend::{BackendResult, DeleteStatus, HashFields, HashStore, ShardActivity};
use crate::metrics;
use crate::partition::{HashRing, PartitionError};

struct Shard<S> {
    store: S,
    operations: AtomicU64,
}

/// [`HashStore`] routing every call to one of several node stores.
///
/// The node is picked by a [`HashRing`] over the node identifiers, hashing
/// the session key bytes, so all operations on one session land on the same
/// node. Each node store is an independent connection.
///
/// # Example
///
/// ```ignore
/// let store = ShardedStore::builder()
///     .hash_function(HashFunction::Murmur2)
///     .node("redis-a", RedisStore::builder().server("redis://10.0.0.1/").build()?)
///     .node("redis-b", RedisStore::builder().server("redis://10.0.0.2/").build()?)
///     .build()?;
/// ```
pub struct ShardedStore<S> {
    ring: HashRing,
    shards: Vec<Shard<S>>,
}

impl<S> ShardedStore<S>
where
    S: HashStore,
{
    /// Creates a new builder.
    pub fn builder() -> ShardedStoreBuilder<S> {
        ShardedStoreBuilder::default()
    }

    /// Builds a sharded store from `(node, store)` pairs.
    pub fn new<I, N>(nodes: I, hash: HashFunction) -> Result<Self, PartitionError>
    where
        I: IntoIterator<Item = (N, S)>,
        N: Into<NodeId>,
    {
        let (ids, stores): (Vec<NodeId>, Vec<S>) = nodes
            .into_iter()
            .map(|(node, store)| (node.into(), store))
            .unzip();
        let ring = HashRing::build(ids, hash)?;
        let shards = stores
            .into_iter()
            .map(|store| Shard {
                store,
                operations: AtomicU64::new(0),
            })
            .collect();
        Ok(Self { ring, shards })
    }

    /// Returns the node a session key is routed to.
    pub fn node_for(&self, key: &SessionKey) -> &NodeId {
        self.ring.route(key.as_bytes())
    }

    /// Returns the store a session key is routed to.
    pub fn store_for(&self, key: &SessionKey) -> &S {
        &self.shards[self.ring.route_index(key.as_bytes())].store
    }

    /// The ring used for routing.
    pub fn ring(&self) -> &HashRing {
        &self.ring
    }

    fn shard(&self, key: &SessionKey, operation: &'static str) -> &S {
        let index = self.ring.route_index(key.as_bytes());
        let shard = &self.shards[index];
        shard.operations.fetch_add(1, Ordering::Relaxed);
        trace!(%key, node = %self.ring.nodes()[index], operation, "Routing backend call");
        metrics::record_operation(self.ring.nodes()[index].as_str(), operation);
        &shard.store
    }
}

#[async_trait]
impl<S> HashStore for ShardedStore<S>
where
    S: HashStore,
{
    async fn hash_get_all(&self, key: &SessionKey) -> BackendResult<HashFields> {
        self.shard(key, "hash_get_all").hash_get_all(key).await
    }

    async fn hash_set(&self, key: &SessionKey, fields: &[(SmolStr, String)]) -> BackendResult<()> {
        self.shard(key, "hash_set").hash_set(key, fields).await
    }

    async fn hash_delete(&self, key: &SessionKey, fields: &[SmolStr]) -> BackendResult<u64> {
        self.shard(key, "hash_delete").hash_delete(key, fields).await
    }

    async fn key_expire(&self, key: &SessionKey, ttl: Duration) -> BackendResult<bool> {
        self.shard(key, "key_expire").key_expire(key, ttl).await
    }

    async fn key_delete(&self, key: &SessionKey) -> BackendResult<DeleteStatus> {
        self.shard(key, "key_delete").key_delete(key).await
    }

    fn name(&self) -> &str {
        "sharded"
    }

    fn drain_activity(&self) -> Vec<ShardActivity> {
        self.ring
            .nodes()
            .iter()
            .zip(&self.shards)
            .map(|(node, shard)| ShardActivity {
                node: node.clone(),
                operations: shard.operations.swap(0, Ordering::Relaxed),
            })
            .collect()
    }
}

/// Builder for [`ShardedStore`].
pub struct ShardedStoreBuilder<S> {
    hash: HashFunction,
    nodes: Vec<(NodeId, S)>,
}

impl<S> Default for ShardedStoreBuilder<S> {
    fn default() -> Self {
        Self {
            hash: HashFunction::default(),
            nodes: Vec::new(),
        }
    }
}

impl<S> ShardedStoreBuilder<S>
where
    S: HashStore,
{
    /// Set the hash function used for ring placement and routing.
    pub fn hash_function(mut self, hash: HashFunction) -> Self {
        self.hash = hash;
        self
    }

    /// Add a node and the store serving it.
    pub fn node(mut self, node: impl Into<NodeId>, store: S) -> Self {
        self.nodes.push((node.into(), store));
        self
    }

    /// Build the store. Fails if no nodes were added or a node repeats.
    pub fn build(self) -> Result<ShardedStore<S>, PartitionError> {
        ShardedStore::new(self.nodes, self.hash)
    }
}
