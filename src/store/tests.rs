use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use super::*;
use crate::clock::{Clock, ManualClock};

fn store_with_clock(capacity: u64) -> (MemoryStore, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(1_000_000));
    let store = MemoryStore::with_capacity("test", capacity).clock(clock.clone());
    (store, clock)
}

#[test]
fn test_memory_store_put_and_get() {
    let (store, _) = store_with_clock(100);

    store.put("a", Bytes::from_static(b"1"), None).unwrap();

    let entry = store.get("a").unwrap().expect("entry should exist");
    assert_eq!(entry.value, Bytes::from_static(b"1"));
    assert!(entry.expire_at.is_none());
    assert_eq!(store.size(), 1);
}

#[test]
fn test_memory_store_missing_key() {
    let (store, _) = store_with_clock(100);
    assert!(store.get("nope").unwrap().is_none());
    assert_eq!(store.statistics().misses, 1);
}

#[test]
fn test_expired_entry_is_absent_before_purge() {
    let (store, clock) = store_with_clock(100);
    let expire_at = clock.now_millis() + 500;

    store.put("a", Bytes::from_static(b"1"), Some(expire_at)).unwrap();
    assert!(store.get("a").unwrap().is_some());

    clock.advance(Duration::from_millis(500));
    assert!(store.get("a").unwrap().is_none());
    assert!(store.remove("a").unwrap().is_none());
}

#[test]
fn test_default_ttl_applies_without_explicit_expiry() {
    let (store, clock) = store_with_clock(100);
    let store = store.default_ttl(Duration::from_secs(1));

    store.put("a", Bytes::from_static(b"1"), None).unwrap();
    let entry = store.get("a").unwrap().unwrap();
    assert_eq!(entry.expire_at, Some(clock.now_millis() + 1_000));

    clock.advance(Duration::from_secs(2));
    assert!(store.get("a").unwrap().is_none());
}

#[test]
fn test_remove_returns_value() {
    let (store, _) = store_with_clock(100);
    store.put("a", Bytes::from_static(b"1"), None).unwrap();

    assert_eq!(store.remove("a").unwrap(), Some(Bytes::from_static(b"1")));
    assert!(store.get("a").unwrap().is_none());
}

#[test]
fn test_clear_empties_store() {
    let (store, _) = store_with_clock(100);
    for i in 0..5 {
        store
            .put(&format!("k{i}"), Bytes::from(vec![i as u8]), None)
            .unwrap();
    }
    assert_eq!(store.size(), 5);

    store.clear().unwrap();
    assert_eq!(store.size(), 0);
    assert!(store.entries().unwrap().is_empty());
}

#[test]
fn test_capacity_is_enforced() {
    let (store, _) = store_with_clock(2);
    store.put("a", Bytes::from_static(b"1"), None).unwrap();
    store.put("b", Bytes::from_static(b"2"), None).unwrap();
    store.put("c", Bytes::from_static(b"3"), None).unwrap();

    assert!(store.size() <= 2);
}

#[test]
fn test_entries_skips_expired() {
    let (store, clock) = store_with_clock(100);
    let now = clock.now_millis();
    store.put("live", Bytes::from_static(b"1"), None).unwrap();
    store
        .put("dead", Bytes::from_static(b"2"), Some(now + 10))
        .unwrap();
    clock.advance(Duration::from_millis(10));

    let entries = store.entries().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].0, "live");

    assert_eq!(store.purge_expired(), 1);
}

#[test]
fn test_statistics_memory_usage() {
    let (store, _) = store_with_clock(100);
    store.put("ab", Bytes::from_static(b"1234"), None).unwrap();

    let stats = store.statistics();
    assert_eq!(stats.entries, 1);
    assert_eq!(stats.capacity, Some(100));
    assert_eq!(stats.memory_usage, 6);
}

#[test]
fn test_flaky_store_fails_after_budget() {
    let store = FlakyStore::new(MemoryStore::new("flaky"));
    store.put("a", Bytes::from_static(b"1"), None).unwrap();
    store.fail_gets_after(1);

    assert!(store.get("a").unwrap().is_some());
    assert!(matches!(store.get("a"), Err(StoreError::Backend(_))));
    assert_eq!(store.get_calls(), 2);

    store.set_unavailable(true);
    assert!(matches!(
        store.put("b", Bytes::from_static(b"2"), None),
        Err(StoreError::Unavailable { .. })
    ));
}
