use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

/// A map that remembers how recently each key was used.
///
/// Every `get` or `put` stamps the entry with a fresh, monotonically
/// increasing timestamp. The entries can then be walked from least to most
/// recently used with [`LruCache::iter_lru`]. The cache never evicts on its
/// own: the owner decides which entry to remove, e.g. the oldest clean one.
#[derive(Debug)]
pub struct LruCache<K, V> {
    /// Value and last-access timestamp for each key
    entries: HashMap<K, (V, u64)>,
    /// Keys ordered by last-access timestamp (oldest first)
    recency: BTreeMap<u64, K>,
    /// Next timestamp to hand out
    clock: u64,
}

impl<K: Eq + Hash + Clone, V> LruCache<K, V> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            recency: BTreeMap::new(),
            clock: 0,
        }
    }

    fn tick(&mut self) -> u64 {
        let ts = self.clock;
        self.clock += 1;
        ts
    }

    /// Returns the value for `key` and marks it most recently used.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let ts = self.tick();
        let (_, stamp) = self.entries.get_mut(key)?;
        self.recency.remove(stamp);
        *stamp = ts;
        self.recency.insert(ts, key.clone());
        self.entries.get(key).map(|(v, _)| v)
    }

    /// Returns the value for `key` without touching its recency.
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.entries.get(key).map(|(v, _)| v)
    }

    /// Inserts or replaces `key`, making it most recently used.
    /// Returns the replaced value, if any.
    pub fn put(&mut self, key: K, value: V) -> Option<V> {
        let ts = self.tick();
        let old = self.entries.insert(key.clone(), (value, ts));
        if let Some((_, stamp)) = &old {
            self.recency.remove(stamp);
        }
        self.recency.insert(ts, key);
        old.map(|(v, _)| v)
    }

    /// Removes `key` and returns its value.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let (value, stamp) = self.entries.remove(key)?;
        self.recency.remove(&stamp);
        Some(value)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries from least to most recently used.
    pub fn iter_lru(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
        self.recency.values().filter_map(move |key| {
            self.entries.get(key).map(|(value, _)| (key, value))
        })
    }

    /// Returns the keys from least to most recently used.
    pub fn keys_lru(&self) -> Vec<K> {
        self.recency.values().cloned().collect()
    }
}

impl<K: Eq + Hash + Clone, V> Default for LruCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
