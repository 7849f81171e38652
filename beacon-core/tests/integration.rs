//! Integration tests for the beacon store
//!
//! These tests run against on-disk SQLite databases in temporary directories
//! to cover durability, concurrent callers and data written by older clients.

use beacon_core::config::{QueueConfig, StoreConfig};
use beacon_core::store::preferences::{CONNECTIONS_KEY, EVENTS_KEY};
use beacon_core::{Database, EventRecord, EventTime, PreferenceBackend, Store};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

const NAMESPACE: &str = "BEACON_STORE";

fn open_store(path: &Path) -> (Arc<Database>, Store) {
    let db = Arc::new(Database::open(path).expect("failed to open db"));
    db.migrate().expect("failed to migrate db");
    let store = Store::open(db.clone(), &StoreConfig::default(), &QueueConfig::default())
        .expect("failed to open store");
    (db, store)
}

fn event(key: &str, ts: i64) -> EventRecord {
    EventRecord::new(
        key,
        EventTime {
            timestamp_ms: ts,
            hour: 8,
            dow: 1,
        },
    )
    .with_count(1)
}

// ============================================
// Durability
// ============================================

#[test]
fn test_queues_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("beacon.db");

    let stored = event("app_open", 1_000).with_segment("screen", "home");
    {
        let (_db, store) = open_store(&path);
        store.events().add_event(&stored).unwrap();
        store.connections().add("app_key=abc&begin_session=1").unwrap();
        store.set_cached_advertising_id(Some("ad-123")).unwrap();
        store.set_consent_push(true).unwrap();
    }

    let (_db, store) = open_store(&path);
    assert_eq!(store.events().list().unwrap(), vec![stored]);
    assert_eq!(
        store.connections().list().unwrap(),
        vec!["app_key=abc&begin_session=1"]
    );
    assert_eq!(store.cached_advertising_id().unwrap().as_deref(), Some("ad-123"));
    assert!(store.consent_push().unwrap());
}

#[test]
fn test_database_path_parent_is_created() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested/dir/beacon.db");
    let (_db, store) = open_store(&path);
    assert!(path.exists());
    assert!(store.events().is_empty().unwrap());
}

// ============================================
// Data written by older clients
// ============================================

#[test]
fn test_legacy_events_with_garbage_segment() {
    let dir = TempDir::new().unwrap();
    let (db, store) = open_store(&dir.path().join("beacon.db"));

    let e1 = event("eventKey1", 1_000);
    let e2 = event("eventKey2", 61_000);
    let joined = format!("{}:::blah:::{}", e2.to_json().unwrap(), e1.to_json().unwrap());
    db.put(NAMESPACE, EVENTS_KEY, &joined).unwrap();

    assert_eq!(store.events().list().unwrap(), vec![e1.clone(), e2.clone()]);
    assert_eq!(store.events().raw().unwrap().len(), 3);
}

#[test]
fn test_legacy_events_with_null_key() {
    let dir = TempDir::new().unwrap();
    let (db, store) = open_store(&dir.path().join("beacon.db"));

    let e1 = event("eventKey1", 1_000);
    let e2 = event("eventKey2", 2_000);
    let joined = format!(
        "{}:::{{\"key\":null}}:::{}",
        e1.to_json().unwrap(),
        e2.to_json().unwrap()
    );
    db.put(NAMESPACE, EVENTS_KEY, &joined).unwrap();

    assert_eq!(store.events().list().unwrap(), vec![e1, e2]);
}

#[test]
fn test_corrupt_element_in_json_array() {
    let dir = TempDir::new().unwrap();
    let (db, store) = open_store(&dir.path().join("beacon.db"));

    let e1 = event("eventKey1", 5);
    let e2 = event("eventKey2", 3);
    let stored = serde_json::to_string(&vec![
        e1.to_json().unwrap(),
        "{not json".to_string(),
        e2.to_json().unwrap(),
    ])
    .unwrap();
    db.put(NAMESPACE, EVENTS_KEY, &stored).unwrap();

    assert_eq!(store.events().list().unwrap(), vec![e2.clone(), e1.clone()]);

    // Removing one record rewrites the queue without the unreadable entry
    store.events().remove(&[e2]).unwrap();
    assert_eq!(store.events().raw().unwrap(), vec![e1.to_json().unwrap()]);
}

#[test]
fn test_empty_stored_values_read_as_empty() {
    let dir = TempDir::new().unwrap();
    let (db, store) = open_store(&dir.path().join("beacon.db"));

    db.put(NAMESPACE, EVENTS_KEY, "").unwrap();
    db.put(NAMESPACE, CONNECTIONS_KEY, "").unwrap();

    assert!(store.events().is_empty().unwrap());
    assert!(store.events().list().unwrap().is_empty());
    assert!(store.connections().is_empty().unwrap());
    assert!(store.connections().list().unwrap().is_empty());
}

// ============================================
// Concurrency
// ============================================

#[test]
fn test_concurrent_event_appends_are_not_lost() {
    let dir = TempDir::new().unwrap();
    let (_db, store) = open_store(&dir.path().join("beacon.db"));
    let store = Arc::new(store);

    const THREADS: usize = 8;
    const PER_THREAD: usize = 25;

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    let e = EventRecord::new(format!("t{}-{}", t, i), store.now());
                    store.events().add_event(&e).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let events = store.events().list().unwrap();
    assert_eq!(events.len(), THREADS * PER_THREAD);
    assert!(events.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
}

#[test]
fn test_concurrent_request_appends_are_not_lost() {
    let dir = TempDir::new().unwrap();
    let (_db, store) = open_store(&dir.path().join("beacon.db"));
    let store = Arc::new(store);

    let handles: Vec<_> = (0..10)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..20 {
                    store.connections().add(&format!("req-{}-{}", t, i)).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.connections().len().unwrap(), 200);
}

#[test]
fn test_staging_while_recording_keeps_every_event() {
    let dir = TempDir::new().unwrap();
    let (_db, store) = open_store(&dir.path().join("beacon.db"));
    let store = Arc::new(store);

    let recorder = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for i in 0..100 {
                let e = EventRecord::new(format!("e{}", i), store.now());
                store.events().add_event(&e).unwrap();
            }
        })
    };

    let mut staged = 0;
    while !recorder.is_finished() {
        staged += store.stage_events(Some(7), |b| b.to_string()).unwrap();
    }
    recorder.join().unwrap();
    staged += store.stage_events(None, |b| b.to_string()).unwrap();

    assert_eq!(staged, 100);
    assert!(store.events().is_empty().unwrap());

    let delivered: usize = store
        .connections()
        .list()
        .unwrap()
        .iter()
        .map(|r| serde_json::from_str::<Vec<EventRecord>>(r).unwrap().len())
        .sum();
    assert_eq!(delivered, 100);
}

// ============================================
// Flush lifecycle
// ============================================

#[test]
fn test_transport_acknowledges_requests_in_order() {
    let dir = TempDir::new().unwrap();
    let (_db, store) = open_store(&dir.path().join("beacon.db"));

    store.connections().add("batch").unwrap();
    store.connections().add("session_end").unwrap();
    store.connections().add("batch").unwrap();

    let mut sent = Vec::new();
    while let Some(request) = store.connections().front().unwrap() {
        sent.push(request.clone());
        assert!(store.connections().remove(&request).unwrap());
    }

    assert_eq!(sent, vec!["batch", "session_end", "batch"]);
    assert!(store.connections().is_empty().unwrap());
}
