use std::time::Duration;

use pretty_assertions::assert_eq;
use sessionbox::{SessionConfig, WriteMode};
use sessionbox_configuration::{Backend, ConfigError, Node, Redis, ServerConfig};
use sessionbox_core::HashFunction;

const TWO_NODES: &str = r#"
backend:
  type: Redis
  database: 3
  nodes:
    - name: sessions-a
      connection_string: redis://10.0.0.1:6379/
    - name: sessions-b
      connection_string: redis://10.0.0.2:6379/
session:
  session_timeout: 15m
  max_session_bytes: 4096
  write_mode: Acknowledged
  hash: Murmur3
"#;

fn node(name: &str, connection_string: &str) -> Node {
    Node {
        name: name.to_string(),
        connection_string: connection_string.to_string(),
    }
}

#[test]
fn test_redis_backend_deserialize() {
    let config = ServerConfig::from_yaml(TWO_NODES).expect("failed to deserialize");

    match &config.backend {
        Backend::Redis(redis) => {
            assert_eq!(redis.database, 3);
            assert_eq!(
                redis.nodes,
                vec![
                    node("sessions-a", "redis://10.0.0.1:6379/"),
                    node("sessions-b", "redis://10.0.0.2:6379/"),
                ]
            );
        }
    }
    assert_eq!(
        config.session,
        SessionConfig::builder()
            .session_timeout(Duration::from_secs(900))
            .max_session_bytes(4096)
            .write_mode(WriteMode::Acknowledged)
            .hash(HashFunction::Murmur3)
            .build()
    );
}

#[test]
fn test_session_section_is_optional() {
    let yaml = r#"
backend:
  type: Redis
  nodes:
    - name: only
      connection_string: redis://127.0.0.1/
"#;
    let config = ServerConfig::from_yaml(yaml).expect("failed to deserialize");

    assert_eq!(config.session, SessionConfig::default());
    let Backend::Redis(redis) = &config.backend;
    assert_eq!(redis.database, 0);
}

#[test]
fn test_unknown_backend_type_is_rejected() {
    let yaml = r#"
backend:
  type: Memcached
  nodes: []
"#;
    let error = ServerConfig::from_yaml(yaml).unwrap_err();
    assert!(matches!(error, ConfigError::Parse(_)));
}

#[test]
fn test_server_config_roundtrip() {
    let config = ServerConfig {
        backend: Backend::Redis(Redis {
            nodes: vec![node("a", "redis://a/"), node("b", "redis://b/")],
            database: 1,
        }),
        session: SessionConfig::builder()
            .max_session_bytes(100)
            .activity_interval(Some(Duration::from_secs(60)))
            .build(),
    };

    let yaml = serde_saphyr::to_string(&config).expect("failed to serialize");
    let deserialized: ServerConfig = serde_saphyr::from_str(&yaml).expect("failed to deserialize");
    assert_eq!(config, deserialized);
}

#[cfg(not(feature = "redis"))]
#[test]
fn test_redis_store_requires_feature() {
    let config = ServerConfig::from_yaml(TWO_NODES).expect("failed to deserialize");
    let Err(error) = config.into_store() else {
        panic!("expected the store to be unavailable");
    };
    assert!(matches!(error, ConfigError::BackendNotAvailable(_)));
}

#[cfg(feature = "redis")]
mod redis_store {
    use super::*;
    use sessionbox_backend::HashStore;

    #[test]
    fn test_builds_sharded_store() {
        let config = ServerConfig::from_yaml(TWO_NODES).expect("failed to deserialize");
        let store = config.into_store().expect("store builds without connecting");
        assert_eq!(store.name(), "sharded");
    }

    #[test]
    fn test_empty_node_list_is_rejected() {
        let yaml = r#"
backend:
  type: Redis
  nodes: []
"#;
        let config = ServerConfig::from_yaml(yaml).expect("failed to deserialize");
        let Err(error) = config.into_store() else {
            panic!("expected an empty ring to be rejected");
        };
        assert!(matches!(error, ConfigError::Partition(_)));
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        let yaml = r#"
backend:
  type: Redis
  nodes:
    - name: broken
      connection_string: "not a url"
"#;
        let config = ServerConfig::from_yaml(yaml).expect("failed to deserialize");
        let Err(error) = config.into_store() else {
            panic!("expected the url to be rejected");
        };
        assert!(matches!(error, ConfigError::BackendNotAvailable(_)));
    }

    #[tokio::test]
    async fn test_builds_provider() {
        let config = ServerConfig::from_yaml(TWO_NODES).expect("failed to deserialize");
        let provider = config.into_provider().expect("provider builds");
        assert_eq!(provider.config().max_session_bytes, 4096);
    }
}
