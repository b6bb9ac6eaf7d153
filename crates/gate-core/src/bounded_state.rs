//! Bounded in-memory state with FIFO eviction.
//!
//! Every unbounded map keyed by attacker-influenced input is a memory
//! exhaustion vector, so all per-delivery and per-commit state in this crate
//! lives in a [`BoundedMap`]. When the map is full, inserting a new key
//! evicts the oldest-inserted entry. Updating an existing key does not
//! refresh its insertion position; eviction order is strictly by first
//! insertion.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use tracing::debug;

/// A map with a hard capacity and first-in-first-out eviction.
///
/// Not thread-safe on its own; callers wrap it in the lock that fits their
/// access pattern.
pub struct BoundedMap<K, V> {
    capacity: usize,
    entries: HashMap<K, V>,
    insertion_order: VecDeque<K>,
}

impl<K, V> BoundedMap<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
{
    /// Create a map holding at most `capacity` entries.
    ///
    /// # Panics
    ///
    /// Panics when `capacity` is zero; a zero-capacity map can hold nothing
    /// and indicates a configuration bug.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "BoundedMap capacity must be non-zero");
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity),
            insertion_order: VecDeque::with_capacity(capacity),
        }
    }

    /// Insert or update an entry.
    ///
    /// Inserting a new key at capacity evicts the oldest entry first and
    /// returns the evicted pair. Updating an existing key replaces the value
    /// in place, keeps the original insertion position, and returns `None`.
    pub fn insert(&mut self, key: K, value: V) -> Option<(K, V)> {
        if self.entries.contains_key(&key) {
            self.entries.insert(key, value);
            return None;
        }

        let evicted = if self.entries.len() >= self.capacity {
            self.evict_oldest()
        } else {
            None
        };

        self.insertion_order.push_back(key.clone());
        self.entries.insert(key, value);
        evicted
    }

    fn evict_oldest(&mut self) -> Option<(K, V)> {
        let oldest = self.insertion_order.pop_front()?;
        let value = self.entries.remove(&oldest)?;
        debug!(key = ?oldest, "evicted oldest entry from bounded map");
        Some((oldest, value))
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.entries.get_mut(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Remove an entry by key.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let value = self.entries.remove(key)?;
        self.insertion_order.retain(|k| k != key);
        Some(value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterate over entries in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter()
    }
}

impl<K, V> std::fmt::Debug for BoundedMap<K, V>
where
    K: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedMap")
            .field("capacity", &self.capacity)
            .field("len", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
#[path = "bounded_state_tests.rs"]
mod tests;
