//! A thread-safe `String`-keyed dictionary with an O(1) atomic length
//! counter, used as the backing store for both the per-database data map
//! and the per-database ttl map.
//!
//! Multi-key commands in `memkv-db` hold their own segmented locks spanning
//! many calls into this dictionary, so a single global mutex here would
//! defeat that design; a sharded concurrent map (`dashmap`) lets disjoint
//! keys proceed without contending on each other.

use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use rand::rng;
use rand::seq::{IndexedRandom, SliceRandom};

/// Thread-safe `String -> V` map with weakly-consistent iteration.
#[derive(Debug, Default)]
pub struct Dictionary<V> {
    map: DashMap<String, V>,
    len: AtomicUsize,
}

impl<V: Clone> Dictionary<V> {
    /// Creates an empty dictionary.
    pub fn new() -> Self {
        Self {
            map: DashMap::new(),
            len: AtomicUsize::new(0),
        }
    }

    /// Looks up `key`, returning a clone of the stored value if present.
    pub fn get(&self, key: &str) -> Option<V> {
        self.map.get(key).map(|entry| entry.value().clone())
    }

    /// Inserts or overwrites `key`. Returns `1` if this created a new entry,
    /// `0` if it overwrote an existing one.
    ///
    /// The overwrite path deliberately does not touch the atomic counter:
    /// the key was already counted, so incrementing again would
    /// double-count it.
    pub fn put(&self, key: String, value: V) -> i32 {
        match self.map.insert(key, value) {
            Some(_) => 0,
            None => {
                self.len.fetch_add(1, Ordering::SeqCst);
                1
            }
        }
    }

    /// Inserts `value` only if `key` is absent. Returns `1` if inserted,
    /// `0` if `key` was already present (left untouched).
    pub fn put_if_absent(&self, key: String, value: V) -> i32 {
        match self.map.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(_) => 0,
            dashmap::mapref::entry::Entry::Vacant(e) => {
                e.insert(value);
                self.len.fetch_add(1, Ordering::SeqCst);
                1
            }
        }
    }

    /// Overwrites `value` only if `key` is already present. Returns `1` if
    /// overwritten, `0` if `key` was absent (left untouched).
    pub fn put_if_exists(&self, key: &str, value: V) -> i32 {
        match self.map.get_mut(key) {
            Some(mut entry) => {
                *entry.value_mut() = value;
                1
            }
            None => 0,
        }
    }

    /// Removes `key`. Returns `1` if it was present, `0` otherwise.
    pub fn remove(&self, key: &str) -> i32 {
        match self.map.remove(key) {
            Some(_) => {
                self.len.fetch_sub(1, Ordering::SeqCst);
                1
            }
            None => 0,
        }
    }

    /// Current entry count. O(1); does not block concurrent writers.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::SeqCst)
    }

    /// True if the dictionary holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Visits every entry with `visitor`, stopping early if it returns
    /// `false`. Iteration is weakly consistent: it may observe keys
    /// inserted by concurrent writers during the walk.
    pub fn for_each<F>(&self, mut visitor: F)
    where
        F: FnMut(&str, &V) -> bool,
    {
        for entry in self.map.iter() {
            if !visitor(entry.key(), entry.value()) {
                break;
            }
        }
    }

    /// Returns `n` keys sampled independently (duplicates allowed).
    pub fn random_keys(&self, n: usize) -> Vec<String> {
        if n == 0 {
            return Vec::new();
        }
        let keys: Vec<String> = self.map.iter().map(|e| e.key().clone()).collect();
        if keys.is_empty() {
            return Vec::new();
        }
        let mut rng = rng();
        (0..n)
            .map(|_| keys.choose(&mut rng).expect("keys is non-empty").clone())
            .collect()
    }

    /// Returns up to `min(n, len())` distinct keys.
    pub fn random_distinct_keys(&self, n: usize) -> Vec<String> {
        if n == 0 {
            return Vec::new();
        }
        let mut keys: Vec<String> = self.map.iter().map(|e| e.key().clone()).collect();
        let mut rng = rng();
        keys.shuffle(&mut rng);
        keys.truncate(n);
        keys
    }

    /// Resets the dictionary to empty.
    pub fn clear(&self) {
        self.map.clear();
        self.len.store(0, Ordering::SeqCst);
    }
}
