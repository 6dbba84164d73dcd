use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sessionbox::{SessionConfig, SessionProvider};
use sessionbox_backend::HashStore;

use crate::backend::Backend;
use crate::error::ConfigError;

/// Complete session store configuration: where sessions live and how they
/// are served.
///
/// ```yaml
/// backend:
///   type: Redis
///   database: 2
///   nodes:
///     - name: sessions-a
///       connection_string: redis://10.0.0.1:6379/
///     - name: sessions-b
///       connection_string: redis://10.0.0.2:6379/
/// session:
///   session_timeout: 20m
///   max_session_bytes: 30000
///   write_mode: FireAndForget
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ServerConfig {
    /// Backend store.
    pub backend: Backend,
    /// Session handling, defaults for everything left out.
    #[serde(default)]
    pub session: SessionConfig,
}

impl ServerConfig {
    /// Parses a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_saphyr::from_str(yaml)?)
    }

    /// Builds the backend store.
    pub fn into_store(self) -> Result<Arc<dyn HashStore>, ConfigError> {
        self.backend.into_store(self.session.hash)
    }

    /// Builds a provider over the configured backend. Background tasks start
    /// with [`SessionProvider::start`].
    pub fn into_provider(self) -> Result<SessionProvider<Arc<dyn HashStore>>, ConfigError> {
        let store = self.backend.into_store(self.session.hash)?;
        Ok(SessionProvider::builder(store).config(self.session).build())
    }
}
