//! Tests for [`BoundedMap`].

use super::*;

/// Basic insert and lookup under capacity.
#[test]
fn test_insert_and_get() {
    let mut map = BoundedMap::new(4);
    assert!(map.insert("a", 1).is_none());
    assert_eq!(map.get(&"a"), Some(&1));
    assert_eq!(map.len(), 1);
}

/// Inserting past capacity evicts the oldest-inserted entry.
#[test]
fn test_fifo_eviction_at_capacity() {
    let mut map = BoundedMap::new(3);
    map.insert("first", 1);
    map.insert("second", 2);
    map.insert("third", 3);

    let evicted = map.insert("fourth", 4);

    assert_eq!(evicted, Some(("first", 1)));
    assert_eq!(map.len(), 3);
    assert!(!map.contains_key(&"first"));
    assert!(map.contains_key(&"fourth"));
}

/// Updating an existing key does not evict and does not refresh its
/// insertion position.
#[test]
fn test_update_keeps_insertion_position() {
    let mut map = BoundedMap::new(2);
    map.insert("old", 1);
    map.insert("newer", 2);

    // Update "old"; it stays at the front of the eviction queue.
    assert!(map.insert("old", 10).is_none());
    assert_eq!(map.get(&"old"), Some(&10));

    let evicted = map.insert("newest", 3);
    assert_eq!(evicted, Some(("old", 10)));
}

/// Removing a key frees its slot and its position in the eviction queue.
#[test]
fn test_remove_frees_slot() {
    let mut map = BoundedMap::new(2);
    map.insert("a", 1);
    map.insert("b", 2);

    assert_eq!(map.remove(&"a"), Some(1));
    assert_eq!(map.len(), 1);

    // The freed slot is usable without evicting "b".
    assert!(map.insert("c", 3).is_none());
    assert!(map.contains_key(&"b"));
}

/// Evictions proceed in strict insertion order under sustained pressure.
#[test]
fn test_sustained_pressure_evicts_in_order() {
    let mut map = BoundedMap::new(2);
    map.insert(0, "zero");
    map.insert(1, "one");

    for i in 2..10 {
        let evicted = map.insert(i, "filler").unwrap();
        assert_eq!(evicted.0, i - 2, "eviction must follow insertion order");
    }
    assert_eq!(map.len(), 2);
}

/// Zero capacity is a configuration bug.
#[test]
#[should_panic(expected = "capacity must be non-zero")]
fn test_zero_capacity_panics() {
    let _ = BoundedMap::<u32, u32>::new(0);
}
