mod common;

use std::sync::Arc;
use std::time::Duration;

use common::observer::RecordingObserver;
use common::test_backend::MemoryStore;
use pretty_assertions::assert_eq;
use sessionbox::{
    ApplicationScopedKey, RequestIdentity, SessionConfig, SessionProvider, WriteMode,
};
use sessionbox_backend::ShardedStore;
use sessionbox_core::{SessionKey, SessionValue};

fn acknowledged() -> SessionConfig {
    SessionConfig::builder()
        .write_mode(WriteMode::Acknowledged)
        .activity_interval(None)
        .build()
}

fn provider(store: &MemoryStore) -> SessionProvider<MemoryStore> {
    SessionProvider::builder(store.clone())
        .config(acknowledged())
        .build()
}

#[tokio::test]
async fn test_new_session_is_persisted_at_request_end() {
    let store = MemoryStore::new();
    let provider = provider(&store);
    let identity = RequestIdentity::default();

    let items = provider.load_or_create("abc", &identity).await;
    assert!(items.is_empty());
    items.set("user", "ada");
    provider.end_request("abc", &identity).await;

    assert_eq!(
        store.get_raw("abc", "user").as_deref(),
        Some("|!a_SysString_a!|\"ada\"")
    );
    assert_eq!(provider.cache().ref_count(&SessionKey::new("abc")), Some(0));
}

#[tokio::test]
async fn test_concurrent_requests_share_and_persist_once() {
    let store = MemoryStore::new();
    let provider = provider(&store);
    let identity = RequestIdentity::default();

    let first = provider.load_or_create("abc", &identity).await;
    let second = provider.load_or_create("abc", &identity).await;
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(store.count("hgetall"), 1);

    first.set("a", 1);
    second.set("b", 2);

    provider.end_request("abc", &identity).await;
    assert_eq!(store.count("hset"), 0);

    provider.end_request("abc", &identity).await;
    assert_eq!(store.count("hset"), 1);
    assert_eq!(store.field_count("abc"), 2);
}

#[tokio::test]
async fn test_save_persists_while_others_hold_the_session() {
    let store = MemoryStore::new();
    let provider = provider(&store);
    let identity = RequestIdentity::default();

    let items = provider.load_or_create("abc", &identity).await;
    let _other = provider.load_or_create("abc", &identity).await;
    items.set("a", 1);

    provider.save("abc", &identity, &items).await;

    assert_eq!(store.get_raw("abc", "a").as_deref(), Some("|!a_SysInt_a!|1"));
    assert_eq!(provider.cache().ref_count(&SessionKey::new("abc")), Some(1));
}

#[tokio::test]
async fn test_save_of_uncached_session_writes_given_items() {
    let store = MemoryStore::new();
    let provider = provider(&store);
    let identity = RequestIdentity::default();

    let items = provider.create_empty();
    assert!(items.is_empty());
    items.set("fresh", true);
    provider.save("new", &identity, &items).await;

    assert_eq!(store.get_raw("new", "fresh").as_deref(), Some("|!a_SysBool_a!|true"));
}

#[tokio::test]
async fn test_discard_deletes_and_empties_shared_session() {
    let store = MemoryStore::new();
    store.put_raw("abc", "a", "|!a_SysInt_a!|1");
    let provider = provider(&store);
    let identity = RequestIdentity::default();

    let items = provider.load_or_create("abc", &identity).await;
    let other = provider.load_or_create("abc", &identity).await;
    assert_eq!(other.get("a"), Some(SessionValue::Int(1)));

    provider.discard("abc", &identity).await;
    assert!(!store.has("abc"));
    assert!(items.is_empty());

    // The remaining holder has nothing left to write back.
    provider.end_request("abc", &identity).await;
    assert!(!store.has("abc"));
    assert_eq!(store.count("hset"), 0);
    assert_eq!(store.count("hdel"), 0);
}

#[tokio::test]
async fn test_key_derivation_is_applied() {
    let store = MemoryStore::new();
    let provider = SessionProvider::builder(store.clone())
        .config(acknowledged())
        .key_derivation(ApplicationScopedKey)
        .build();
    let identity = RequestIdentity::application("shop");

    assert_eq!(provider.key("abc", &identity), SessionKey::new("shop:abc"));

    let items = provider.load_or_create("abc", &identity).await;
    items.set("a", 1);
    provider.end_request("abc", &identity).await;

    assert!(store.has("shop:abc"));
    assert!(!store.has("abc"));
}

#[tokio::test]
async fn test_lease_finish_saves_and_releases() {
    let store = MemoryStore::new();
    let provider = provider(&store);
    let identity = RequestIdentity::default();

    let lease = provider.open("abc", &identity).await;
    lease.set("visits", 3);
    assert_eq!(lease.key(), &SessionKey::new("abc"));
    lease.finish().await;

    assert_eq!(store.get_raw("abc", "visits").as_deref(), Some("|!a_SysInt_a!|3"));
    assert_eq!(provider.cache().ref_count(&SessionKey::new("abc")), Some(0));
}

#[tokio::test]
async fn test_dropped_lease_still_saves() {
    let store = MemoryStore::new();
    let provider = provider(&store);
    let identity = RequestIdentity::default();

    {
        let lease = provider.open("abc", &identity).await;
        lease.set("visits", 1);
    }
    assert_eq!(provider.cache().ref_count(&SessionKey::new("abc")), Some(0));

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(store.get_raw("abc", "visits").as_deref(), Some("|!a_SysInt_a!|1"));
}

#[tokio::test(start_paused = true)]
async fn test_activity_is_reported_per_node() {
    let nodes = [MemoryStore::new(), MemoryStore::new()];
    let sharded = ShardedStore::builder()
        .node("node-a", nodes[0].clone())
        .node("node-b", nodes[1].clone())
        .build()
        .unwrap();
    let observer = Arc::new(RecordingObserver::default());
    let config = SessionConfig::builder()
        .write_mode(WriteMode::Acknowledged)
        .activity_interval(Some(Duration::from_secs(1)))
        .build();
    let provider = SessionProvider::builder(sharded)
        .config(config)
        .observer(observer.clone())
        .build();
    let identity = RequestIdentity::default();
    provider.start();

    for id in ["a", "b", "c", "d"] {
        provider.load_or_create(id, &identity).await;
        provider.end_request(id, &identity).await;
    }
    tokio::time::sleep(Duration::from_millis(1500)).await;

    let reports = observer.activity();
    assert_eq!(reports.len(), 1);
    let total: u64 = reports[0].iter().map(|node| node.operations).sum();
    // hgetall and expire on load, expire on end_request.
    assert_eq!(total, 12);

    provider.stop(Duration::from_secs(1)).await.unwrap();
    assert!(!provider.cache().is_running());
}

#[tokio::test(start_paused = true)]
async fn test_stop_flushes_background_writes() {
    let store = MemoryStore::new();
    let provider = SessionProvider::builder(store.clone())
        .config(SessionConfig::builder().activity_interval(None).build())
        .build();
    let identity = RequestIdentity::default();
    provider.start();
    assert!(provider.cache().is_running());

    let items = provider.load_or_create("abc", &identity).await;
    items.set("a", 1);
    provider.end_request("abc", &identity).await;

    provider.stop(Duration::from_secs(1)).await.unwrap();
    assert!(!provider.cache().is_running());
    assert_eq!(store.get_raw("abc", "a").as_deref(), Some("|!a_SysInt_a!|1"));
}

#[tokio::test]
async fn test_load_failure_serves_empty_session() {
    let observer = Arc::new(RecordingObserver::default());
    let provider = SessionProvider::builder(common::test_backend::ErrorStore)
        .config(acknowledged())
        .observer(observer.clone())
        .build();
    let identity = RequestIdentity::default();

    let items = provider.load_or_create("abc", &identity).await;
    assert!(items.is_empty());
    items.set("a", 1);
    provider.end_request("abc", &identity).await;

    assert!(!observer.errors().is_empty());
}
