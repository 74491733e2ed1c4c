use std::{
    collections::HashMap,
    hash::{DefaultHasher, Hash, Hasher},
    path::Path
};

/// Size-bounded cache for search results.
///
/// Owned by one engine instance and mutated through `&mut self`. It is not
/// safe to share between threads; use one engine per request or wrap it in
/// a lock.
#[derive(Debug)]
pub struct SearchCache<V> {
    cache:    HashMap<u64, V>,
    max_size: usize,
    hits:     u64,
    misses:   u64
}

impl<V: Clone> SearchCache<V> {
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            cache:  HashMap::with_capacity(max_size.min(1024)),
            max_size,
            hits:   0,
            misses: 0
        }
    }

    /// Key for a `(pattern, extension, root)` triple
    pub fn key(pattern: &str, file_ext: &str, root: &Path) -> u64 {
        let mut hasher = DefaultHasher::new();
        pattern.hash(&mut hasher);
        file_ext.hash(&mut hasher);
        root.hash(&mut hasher);
        hasher.finish()
    }

    /// Look up a key, counting the hit or miss
    pub fn get(&mut self, key: u64) -> Option<V> {
        match self.cache.get(&key) {
            Some(value) => {
                self.hits += 1;
                Some(value.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, key: u64, value: V) {
        // Simple eviction: clear half when full
        if self.cache.len() >= self.max_size {
            let keys: Vec<_> = self
                .cache
                .keys()
                .take((self.max_size / 2).max(1))
                .copied()
                .collect();
            for key in keys {
                self.cache.remove(&key);
            }
        }
        self.cache.insert(key, value);
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }
}
