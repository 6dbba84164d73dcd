mod common;

use std::sync::Arc;
use std::time::Duration;

use common::observer::RecordingObserver;
use common::test_backend::{ErrorStore, MemoryStore};
use pretty_assertions::assert_eq;
use sessionbox::{SessionConfig, SessionItems, SessionObserver, SessionSync, WriteMode};
use sessionbox_core::{SessionKey, SessionValue, SmolStr};

fn config(mode: WriteMode) -> SessionConfig {
    SessionConfig::builder()
        .session_timeout(Duration::from_secs(120))
        .write_mode(mode)
        .build()
}

fn sync_over<S>(store: S, config: &SessionConfig, observer: &Arc<RecordingObserver>) -> SessionSync<S>
where
    S: sessionbox::HashStore + 'static,
{
    let observer: Arc<dyn SessionObserver> = observer.clone();
    SessionSync::new(Arc::new(store), config).with_observer(observer)
}

fn seeded() -> MemoryStore {
    let store = MemoryStore::new();
    store.put_raw("k", "count", "|!a_SysInt_a!|4");
    store.put_raw("k", "name", "|!a_SysString_a!|\"ada\"");
    store
}

#[tokio::test]
async fn test_load_decodes_fields_and_refreshes_expiry() {
    let store = seeded();
    let observer = Arc::new(RecordingObserver::default());
    let sync = sync_over(store.clone(), &config(WriteMode::Acknowledged), &observer);
    let key = SessionKey::new("k");

    let items = sync.load(&key).await;

    assert_eq!(items.get("count"), Some(SessionValue::Int(4)));
    assert_eq!(items.get("name"), Some(SessionValue::from("ada")));
    assert_eq!(store.calls(), vec!["hgetall k", "expire k"]);
    assert_eq!(store.ttl("k"), Some(Duration::from_secs(120)));
    assert_eq!(observer.loaded().len(), 1);

    // Loaded fields are the baseline.
    assert!(items.delta(sync.codec()).is_empty());
}

#[tokio::test]
async fn test_load_skips_undecodable_fields() {
    let store = seeded();
    store.put_raw("k", "broken", "no tag here");
    let observer = Arc::new(RecordingObserver::default());
    let sync = sync_over(store, &config(WriteMode::Acknowledged), &observer);

    let items = sync.load(&SessionKey::new("k")).await;

    assert_eq!(items.len(), 2);
    assert!(!items.contains("broken"));
    assert_eq!(observer.errors().len(), 1);
    assert!(observer.errors()[0].contains("broken"));
}

#[tokio::test]
async fn test_load_failure_yields_empty_session() {
    let observer = Arc::new(RecordingObserver::default());
    let sync = sync_over(ErrorStore, &config(WriteMode::Acknowledged), &observer);

    let items = sync.load(&SessionKey::new("k")).await;

    assert!(items.is_empty());
    // The read and the expiry refresh both fail.
    assert_eq!(observer.errors().len(), 2);
}

#[tokio::test]
async fn test_save_writes_delta_in_order() {
    let store = seeded();
    let observer = Arc::new(RecordingObserver::default());
    let sync = sync_over(store.clone(), &config(WriteMode::Acknowledged), &observer);
    let key = SessionKey::new("k");

    let items = sync.load(&key).await;
    items.set("count", 5);
    items.remove("name");
    items.set("cart", vec![1, 2]);
    sync.save(&key, &items).await;

    assert_eq!(
        store.calls(),
        vec!["hgetall k", "expire k", "hset k", "hdel k", "expire k"]
    );
    assert_eq!(store.get_raw("k", "count").as_deref(), Some("|!a_SysInt_a!|5"));
    assert_eq!(store.get_raw("k", "cart").as_deref(), Some("|!a_SysIntArr_a!|[1,2]"));
    assert_eq!(store.get_raw("k", "name"), None);

    let written = observer.written();
    assert_eq!(written.len(), 1);
    assert_eq!(written[0].1, vec![SmolStr::new("cart"), SmolStr::new("count")]);
    assert_eq!(observer.removed()[0].1, vec![SmolStr::new("name")]);
}

#[tokio::test]
async fn test_save_without_changes_only_refreshes_expiry() {
    let store = seeded();
    let observer = Arc::new(RecordingObserver::default());
    let sync = sync_over(store.clone(), &config(WriteMode::Acknowledged), &observer);
    let key = SessionKey::new("k");

    let items = sync.load(&key).await;
    sync.save(&key, &items).await;

    assert_eq!(store.count("hset"), 0);
    assert_eq!(store.count("hdel"), 0);
    assert_eq!(store.count("expire"), 2);
}

#[tokio::test]
async fn test_oversized_session_is_cleared() {
    let store = seeded();
    let observer = Arc::new(RecordingObserver::default());
    let config = SessionConfig::builder()
        .max_session_bytes(16)
        .write_mode(WriteMode::Acknowledged)
        .build();
    let sync = sync_over(store.clone(), &config, &observer);
    let key = SessionKey::new("k");

    let items = sync.load(&key).await;
    items.set("extra", "more data");
    sync.save(&key, &items).await;

    assert!(items.is_empty());
    assert!(!store.has("k"));
    assert_eq!(store.count("hset"), 0);
}

#[tokio::test]
async fn test_overflow_handler_is_replaceable() {
    let store = seeded();
    let config = SessionConfig::builder()
        .max_session_bytes(16)
        .write_mode(WriteMode::Acknowledged)
        .build();
    let trim = |_: &SessionKey, items: &SessionItems, _: usize| {
        items.remove("name");
    };
    let sync = SessionSync::new(Arc::new(store.clone()), &config).with_overflow(Arc::new(trim));
    let key = SessionKey::new("k");

    let items = sync.load(&key).await;
    sync.save(&key, &items).await;

    assert_eq!(store.field_count("k"), 1);
    assert_eq!(store.get_raw("k", "count").as_deref(), Some("|!a_SysInt_a!|4"));
}

#[tokio::test]
async fn test_save_failure_is_reported_not_raised() {
    let observer = Arc::new(RecordingObserver::default());
    let sync = sync_over(ErrorStore, &config(WriteMode::Acknowledged), &observer);
    let key = SessionKey::new("k");

    let items = SessionItems::new();
    items.set("a", 1);
    items.remove("b");
    sync.save(&key, &items).await;

    // hset and expire fail; nothing was removed so hdel is skipped.
    assert_eq!(observer.errors().len(), 2);
    assert!(observer.written().is_empty());
}

#[tokio::test]
async fn test_unencodable_field_is_reported_on_save() {
    let store = MemoryStore::new();
    let observer = Arc::new(RecordingObserver::default());
    let sync = sync_over(store.clone(), &config(WriteMode::Acknowledged), &observer);
    let key = SessionKey::new("k");

    let items = SessionItems::new();
    items.set("ok", 1);
    items.set("bad", f32::INFINITY);
    sync.save(&key, &items).await;

    assert_eq!(store.field_count("k"), 1);
    assert_eq!(observer.errors().len(), 1);
    assert!(observer.errors()[0].contains("bad"));
}

#[tokio::test]
async fn test_fire_and_forget_writes_complete_on_flush() {
    let store = MemoryStore::new();
    let observer = Arc::new(RecordingObserver::default());
    let sync = sync_over(store.clone(), &config(WriteMode::FireAndForget), &observer);
    let key = SessionKey::new("k");

    let items = SessionItems::new();
    items.set("a", 1);
    sync.save(&key, &items).await;

    sync.dispatcher()
        .flush(Duration::from_secs(1))
        .await
        .expect("writes finish");
    assert_eq!(store.get_raw("k", "a").as_deref(), Some("|!a_SysInt_a!|1"));
    assert_eq!(store.calls(), vec!["hset k", "expire k"]);
}

#[tokio::test]
async fn test_discard_deletes_record() {
    let store = seeded();
    let observer = Arc::new(RecordingObserver::default());
    let sync = sync_over(store.clone(), &config(WriteMode::Acknowledged), &observer);

    sync.discard(&SessionKey::new("k")).await;

    assert!(!store.has("k"));
    assert_eq!(store.calls(), vec!["del k"]);
}
