//! Redis hash store implementation.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use redis::{Client, FromRedisValue, aio::ConnectionManager};
use sessionbox_backend::metrics::{self, Timer};
use sessionbox_backend::{BackendError, BackendResult, DeleteStatus, HashFields, HashStore};
use sessionbox_core::SessionKey;
use smol_str::SmolStr;
use tokio::sync::OnceCell;
use tracing::{trace, warn};

use crate::error::Error;

/// Redis hash store based on redis-rs crate.
///
/// Each session is one Redis hash. This struct provides Redis as a
/// [`HashStore`] for sessionbox and uses a [`ConnectionManager`] for
/// asynchronous network interaction. The connection is established lazily on
/// the first call.
///
/// [`ConnectionManager`]: redis::aio::ConnectionManager
/// [`HashStore`]: sessionbox_backend::HashStore
pub struct RedisStore {
    client: Client,
    connection: OnceCell<ConnectionManager>,
    name: SmolStr,
}

impl RedisStore {
    /// Create new store instance connected to a local server.
    ///
    /// # Examples
    /// ```
    /// use sessionbox_redis::RedisStore;
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     let store = RedisStore::new();
    /// }
    /// ```
    pub fn new() -> Result<Self, BackendError> {
        Ok(Self::builder().build()?)
    }

    /// Creates new RedisStore builder with default settings.
    #[must_use]
    pub fn builder() -> RedisStoreBuilder {
        RedisStoreBuilder::default()
    }

    /// Create lazy connection to redis via [`ConnectionManager`]
    pub async fn connection(&self) -> Result<&ConnectionManager, BackendError> {
        trace!("Get connection manager");
        let manager = self
            .connection
            .get_or_try_init(|| {
                trace!(store = %self.name, "Initialize new redis connection manager");
                self.client.get_connection_manager()
            })
            .await
            .map_err(Error::from)?;
        Ok(manager)
    }

    async fn query<T>(&self, operation: &'static str, cmd: &redis::Cmd) -> BackendResult<T>
    where
        T: FromRedisValue,
    {
        let mut con = self.connection().await?.clone();
        let timer = Timer::new();
        let result = cmd.query_async::<T>(&mut con).await;
        metrics::record_call(&self.name, operation, timer.elapsed());
        result.map_err(|error| {
            metrics::record_call_error(&self.name, operation);
            Error::from(error).into()
        })
    }
}

/// Part of builder pattern implementation for RedisStore.
pub struct RedisStoreBuilder {
    connection_info: String,
    database: Option<u32>,
    name: SmolStr,
}

impl Default for RedisStoreBuilder {
    fn default() -> Self {
        Self {
            connection_info: "redis://127.0.0.1/".to_owned(),
            database: None,
            name: SmolStr::new_static("redis"),
        }
    }
}

impl RedisStoreBuilder {
    /// Set connection info (host, port, credentials) for RedisStore.
    pub fn server(mut self, connection_info: impl Into<String>) -> Self {
        self.connection_info = connection_info.into();
        self
    }

    /// Select the logical database, overriding any database in the URL.
    pub fn database(mut self, database: u32) -> Self {
        self.database = Some(database);
        self
    }

    /// Set a custom name for this store, used in logs and metrics labels.
    pub fn name(mut self, name: impl Into<SmolStr>) -> Self {
        self.name = name.into();
        self
    }

    /// Create new instance of Redis store with passed settings.
    pub fn build(self) -> Result<RedisStore, Error> {
        let connection_info = match self.database {
            Some(database) => with_database(&self.connection_info, database),
            None => self.connection_info,
        };
        Ok(RedisStore {
            client: Client::open(connection_info)?,
            connection: OnceCell::new(),
            name: self.name,
        })
    }
}

/// Rewrites the path of a `redis://` or `rediss://` URL to select `database`.
///
/// Other schemes are returned unchanged.
pub fn with_database(url: &str, database: u32) -> String {
    let Some(scheme_end) = url.find("://") else {
        return url.to_owned();
    };
    let scheme = &url[..scheme_end];
    if scheme != "redis" && scheme != "rediss" {
        warn!(scheme, "Database index is only applied to redis:// URLs");
        return url.to_owned();
    }

    let (base, query) = match url.split_once('?') {
        Some((base, query)) => (base, Some(query)),
        None => (url, None),
    };
    let authority = scheme_end + 3;
    let host_end = base[authority..]
        .find('/')
        .map_or(base.len(), |offset| authority + offset);

    let mut rewritten = format!("{}/{}", &base[..host_end], database);
    if let Some(query) = query {
        rewritten.push('?');
        rewritten.push_str(query);
    }
    rewritten
}

#[async_trait]
impl HashStore for RedisStore {
    async fn hash_get_all(&self, key: &SessionKey) -> BackendResult<HashFields> {
        let mut cmd = redis::cmd("HGETALL");
        cmd.arg(key.as_str());
        let raw: HashMap<Vec<u8>, Vec<u8>> = self.query("hash_get_all", &cmd).await?;
        Ok(utf8_fields(&self.name, key, raw))
    }

    async fn hash_set(&self, key: &SessionKey, fields: &[(SmolStr, String)]) -> BackendResult<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut cmd = redis::cmd("HSET");
        cmd.arg(key.as_str());
        for (name, value) in fields {
            cmd.arg(name.as_str()).arg(value.as_str());
        }
        self.query::<()>("hash_set", &cmd).await
    }

    async fn hash_delete(&self, key: &SessionKey, fields: &[SmolStr]) -> BackendResult<u64> {
        if fields.is_empty() {
            return Ok(0);
        }
        let mut cmd = redis::cmd("HDEL");
        cmd.arg(key.as_str());
        for name in fields {
            cmd.arg(name.as_str());
        }
        self.query("hash_delete", &cmd).await
    }

    async fn key_expire(&self, key: &SessionKey, ttl: Duration) -> BackendResult<bool> {
        let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        let mut cmd = redis::cmd("PEXPIRE");
        cmd.arg(key.as_str()).arg(millis);
        let updated: i64 = self.query("key_expire", &cmd).await?;
        Ok(updated == 1)
    }

    async fn key_delete(&self, key: &SessionKey) -> BackendResult<DeleteStatus> {
        let mut cmd = redis::cmd("DEL");
        cmd.arg(key.as_str());
        let deleted: i32 = self.query("key_delete", &cmd).await?;

        if deleted > 0 {
            Ok(DeleteStatus::Deleted(deleted as u32))
        } else {
            Ok(DeleteStatus::Missing)
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Keeps the fields whose name and value are valid UTF-8.
///
/// A field with foreign bytes is logged and dropped so the rest of the
/// session still loads.
fn utf8_fields(store: &str, key: &SessionKey, raw: HashMap<Vec<u8>, Vec<u8>>) -> HashFields {
    raw.into_iter()
        .filter_map(|(name, value)| {
            let name = match String::from_utf8(name) {
                Ok(name) => name,
                Err(error) => {
                    warn!(store, %key, %error, "Skipping session field with a non UTF-8 name");
                    return None;
                }
            };
            match String::from_utf8(value) {
                Ok(value) => Some((SmolStr::from(name), value)),
                Err(error) => {
                    warn!(store, %key, field = %name, %error, "Skipping non UTF-8 session field");
                    None
                }
            }
        })
        .collect()
}
