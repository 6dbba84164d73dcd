use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sessionbox_backend::HashStore;
use sessionbox_core::HashFunction;

use crate::error::ConfigError;

mod redis;

pub use redis::{Node, Redis};

/// Backend store the sessions are kept in.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum Backend {
    /// Redis servers, one hash record per session, sharded by session key.
    Redis(Redis),
}

impl Backend {
    /// Builds the store, routing keys over its nodes with `hash`.
    pub fn into_store(self, hash: HashFunction) -> Result<Arc<dyn HashStore>, ConfigError> {
        match self {
            Backend::Redis(config) => config.into_store(hash),
        }
    }
}
