use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sessionbox_backend::HashStore;
use sessionbox_core::HashFunction;

use crate::error::ConfigError;

/// One Redis server of the ring.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Node {
    /// Node name. Changing it moves the node's sessions on the ring.
    pub name: String,
    /// Connection URL, e.g. `redis://10.0.0.1:6379/`.
    pub connection_string: String,
}

/// Sessions sharded over a ring of Redis servers.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Redis {
    /// Ring members. At least one is required to build the store.
    pub nodes: Vec<Node>,
    /// Database index selected on every node.
    #[serde(default)]
    pub database: u32,
}

impl Redis {
    /// Builds a sharded store with one Redis connection per node.
    #[cfg(feature = "redis")]
    pub fn into_store(self, hash: HashFunction) -> Result<Arc<dyn HashStore>, ConfigError> {
        use sessionbox_backend::ShardedStore;
        use sessionbox_redis::RedisStore;

        let mut builder = ShardedStore::builder().hash_function(hash);
        for node in self.nodes {
            let store = RedisStore::builder()
                .server(node.connection_string)
                .database(self.database)
                .name(node.name.as_str())
                .build()
                .map_err(|e| ConfigError::BackendNotAvailable(format!("Redis: {}", e)))?;
            builder = builder.node(node.name, store);
        }
        let store = builder.build()?;
        tracing::debug!(nodes = store.ring().nodes().len(), "Built sharded redis store");

        Ok(Arc::new(store))
    }

    /// Fails with [`ConfigError::BackendNotAvailable`] without the `redis` feature.
    #[cfg(not(feature = "redis"))]
    pub fn into_store(self, _hash: HashFunction) -> Result<Arc<dyn HashStore>, ConfigError> {
        Err(ConfigError::BackendNotAvailable("Redis".to_string()))
    }
}
