//! Tier-1 session cache.
//!
//! A bounded map from cache key to translated text with
//! least-recently-read eviction. Recency uses a logical clock bumped on
//! every read and write, so eviction order is deterministic within a
//! session.

use ahash::AHashMap;

/// In-memory LRU cache for the current translation session.
#[derive(Debug)]
pub struct SessionCache {
    entries: AHashMap<String, String>,
    access: AHashMap<String, u64>,
    clock: u64,
    capacity: usize,
}

impl SessionCache {
    pub fn new(capacity: usize) -> Self {
        SessionCache {
            entries: AHashMap::new(),
            access: AHashMap::new(),
            clock: 0,
            capacity: capacity.max(1),
        }
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

    /// Fetch a cached translation, refreshing its recency.
    pub fn get(&mut self, key: &str) -> Option<String> {
        if let Some(value) = self.entries.get(key) {
            let value = value.clone();
            self.clock += 1;
            self.access.insert(key.to_string(), self.clock);
            Some(value)
        } else {
            None
        }
    }

    /// Insert a translation, evicting the least-recently-read entry when full.
    pub fn insert(&mut self, key: String, value: String) {
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            self.evict_oldest();
        }
        self.clock += 1;
        self.access.insert(key.clone(), self.clock);
        self.entries.insert(key, value);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.access.clear();
        self.clock = 0;
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .access
            .iter()
            .min_by_key(|&(_, stamp)| *stamp)
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            self.entries.remove(&key);
            self.access.remove(&key);
        }
    }
}
