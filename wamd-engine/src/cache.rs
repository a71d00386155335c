// SPDX-License-Identifier: MIT OR Apache-2.0

//! Time-bounded cache with insert-restarts-TTL semantics.
//!
//! Expiry is pull-based: owners periodically call [`TtlCache::take_expired`]
//! and decide what an expiration means. Manual removal never shows up there,
//! so eviction listeners only ever see genuine timeouts.
use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use tokio::time::Instant;

struct Entry<V> {
    value: V,
    deadline: Instant,
}

pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: HashMap<K, Entry<V>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    /// Inserts or refreshes an entry; either way the TTL restarts.
    pub fn insert(&mut self, key: K, value: V) {
        self.entries.insert(
            key,
            Entry {
                value,
                deadline: Instant::now() + self.ttl,
            },
        );
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        let entry = self.entries.get(key)?;
        (entry.deadline > Instant::now()).then_some(&entry.value)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Removes an entry without it ever appearing as expired.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|entry| entry.value)
    }

    /// Drains every entry whose deadline has passed.
    pub fn take_expired(&mut self) -> Vec<(K, V)> {
        let now = Instant::now();
        let expired: Vec<K> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.deadline <= now)
            .map(|(key, _)| key.clone())
            .collect();
        expired
            .into_iter()
            .filter_map(|key| self.entries.remove(&key).map(|entry| (key, entry.value)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::TtlCache;

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let mut cache = TtlCache::new(Duration::from_secs(60));
        cache.insert("key", 1);
        assert!(cache.contains(&"key"));

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(cache.contains(&"key"));
        assert!(cache.take_expired().is_empty());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(!cache.contains(&"key"));
        assert_eq!(cache.take_expired(), vec![("key", 1)]);
        assert!(cache.take_expired().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn insert_restarts_ttl() {
        let mut cache = TtlCache::new(Duration::from_secs(60));
        cache.insert("key", 1);

        tokio::time::advance(Duration::from_secs(45)).await;
        cache.insert("key", 2);

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(cache.get(&"key"), Some(&2));
        assert!(cache.take_expired().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn manual_removal_never_expires() {
        let mut cache = TtlCache::new(Duration::from_secs(60));
        cache.insert("key", 1);
        assert_eq!(cache.remove(&"key"), Some(1));

        tokio::time::advance(Duration::from_secs(120)).await;
        assert!(cache.take_expired().is_empty());
    }
}
