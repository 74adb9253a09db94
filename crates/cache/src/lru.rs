use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

use crate::{Cache, CacheError};

struct Node {
    key: String,
    value: Vec<u8>,
    expires_at: Instant,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Recency list stored in a slab. `head` is the most recently used entry,
/// `tail` the eviction candidate.
#[derive(Default)]
struct Entries {
    slots: Vec<Option<Node>>,
    free: Vec<usize>,
    index: HashMap<String, usize>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl Entries {
    fn node(&self, idx: usize) -> &Node {
        self.slots[idx].as_ref().expect("linked slot is occupied")
    }

    fn node_mut(&mut self, idx: usize) -> &mut Node {
        self.slots[idx].as_mut().expect("linked slot is occupied")
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = {
            let node = self.node(idx);
            (node.prev, node.next)
        };

        match prev {
            Some(p) => self.node_mut(p).next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.node_mut(n).prev = prev,
            None => self.tail = prev,
        }

        let node = self.node_mut(idx);
        node.prev = None;
        node.next = None;
    }

    fn push_front(&mut self, idx: usize) {
        let old_head = self.head;
        {
            let node = self.node_mut(idx);
            node.prev = None;
            node.next = old_head;
        }
        if let Some(h) = old_head {
            self.node_mut(h).prev = Some(idx);
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }

    fn touch(&mut self, idx: usize) {
        if self.head != Some(idx) {
            self.unlink(idx);
            self.push_front(idx);
        }
    }

    fn insert(&mut self, node: Node) -> usize {
        let key = node.key.clone();
        let idx = match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(node);
                idx
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        };
        self.index.insert(key, idx);
        self.push_front(idx);
        idx
    }

    fn remove(&mut self, idx: usize) -> Option<Node> {
        self.slots.get(idx)?.as_ref()?;
        self.unlink(idx);
        let node = self.slots[idx].take()?;
        self.index.remove(&node.key);
        self.free.push(idx);
        Some(node)
    }

    fn len(&self) -> usize {
        self.index.len()
    }
}

/// Capacity-bounded LRU cache whose entries expire `ttl` after their last write.
///
/// Expired entries are dropped lazily on `get` and in bulk by
/// [`TtlLruCache::remove_expired`], which the janitor calls periodically.
pub struct TtlLruCache {
    capacity: usize,
    ttl: Duration,
    entries: Mutex<Entries>,
}

impl TtlLruCache {
    pub fn new(capacity: usize, ttl: Duration) -> Result<Self, CacheError> {
        if capacity == 0 {
            return Err(CacheError::ZeroCapacity);
        }
        if ttl.is_zero() {
            return Err(CacheError::ZeroTtl);
        }

        Ok(Self {
            capacity,
            ttl,
            entries: Mutex::new(Entries::default()),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    // Every mutation leaves the list linked, so a poisoned guard is still usable.
    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remove every entry whose expiration has passed. Returns how many were
    /// removed.
    pub fn remove_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.lock();

        let expired: Vec<usize> = entries
            .slots
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| match slot {
                Some(node) if node.expires_at <= now => Some(idx),
                _ => None,
            })
            .collect();

        for idx in &expired {
            entries.remove(*idx);
        }
        expired.len()
    }
}

impl Cache for TtlLruCache {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        let now = Instant::now();
        let mut entries = self.lock();
        let idx = *entries.index.get(key)?;

        if entries.node(idx).expires_at <= now {
            entries.remove(idx);
            return None;
        }

        entries.touch(idx);
        Some(entries.node(idx).value.clone())
    }

    fn set(&self, key: String, value: Vec<u8>) {
        let expires_at = Instant::now() + self.ttl;
        let mut entries = self.lock();

        if let Some(&idx) = entries.index.get(&key) {
            let node = entries.node_mut(idx);
            node.value = value;
            node.expires_at = expires_at;
            entries.touch(idx);
            return;
        }

        entries.insert(Node {
            key,
            value,
            expires_at,
            prev: None,
            next: None,
        });

        if entries.len() > self.capacity {
            if let Some(tail) = entries.tail {
                if let Some(evicted) = entries.remove(tail) {
                    tracing::trace!(key = %evicted.key, "Evicted least recently used cache entry");
                }
            }
        }
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    fn cache(capacity: usize, ttl_ms: u64) -> TtlLruCache {
        TtlLruCache::new(capacity, Duration::from_millis(ttl_ms)).unwrap()
    }

    #[test]
    fn test_rejects_zero_capacity_and_ttl() {
        assert_eq!(
            TtlLruCache::new(0, Duration::from_secs(1)).err(),
            Some(CacheError::ZeroCapacity)
        );
        assert_eq!(
            TtlLruCache::new(10, Duration::ZERO).err(),
            Some(CacheError::ZeroTtl)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_evicts_least_recently_used() {
        let cache = cache(2, 60_000);
        cache.set("a".into(), b"1".to_vec());
        cache.set("b".into(), b"2".to_vec());
        cache.set("c".into(), b"3".to_vec());

        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(b"2".to_vec()));
        assert_eq!(cache.get("c"), Some(b"3".to_vec()));
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_marks_entry_recently_used() {
        let cache = cache(2, 60_000);
        cache.set("a".into(), b"1".to_vec());
        cache.set("b".into(), b"2".to_vec());
        assert!(cache.get("a").is_some());
        cache.set("c".into(), b"3".to_vec());

        assert_eq!(cache.get("b"), None);
        assert!(cache.get("a").is_some());
        assert!(cache.get("c").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let cache = cache(10, 50);
        cache.set("a".into(), b"1".to_vec());

        sleep(Duration::from_millis(60)).await;

        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_refreshes_expiration() {
        let cache = cache(10, 50);
        cache.set("a".into(), b"v1".to_vec());
        sleep(Duration::from_millis(30)).await;
        cache.set("a".into(), b"v2".to_vec());
        sleep(Duration::from_millis(30)).await;

        assert_eq!(cache.get("a"), Some(b"v2".to_vec()));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_does_not_refresh_expiration() {
        let cache = cache(10, 50);
        cache.set("a".into(), b"1".to_vec());
        sleep(Duration::from_millis(30)).await;
        assert!(cache.get("a").is_some());
        sleep(Duration::from_millis(30)).await;

        assert_eq!(cache.get("a"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_expired_sweeps_every_entry() {
        let cache = cache(10, 50);
        cache.set("old-1".into(), b"1".to_vec());
        cache.set("old-2".into(), b"2".to_vec());
        sleep(Duration::from_millis(30)).await;
        cache.set("fresh".into(), b"3".to_vec());
        // Touching an old entry moves it ahead of the fresh one in recency order.
        assert!(cache.get("old-1").is_some());
        sleep(Duration::from_millis(30)).await;

        assert_eq!(cache.remove_expired(), 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("fresh").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slots_are_reused_after_removal() {
        let cache = cache(1, 60_000);
        for i in 0..100 {
            cache.set(format!("key-{i}"), vec![i as u8]);
        }

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.lock().slots.len(), 2);
        assert_eq!(cache.get("key-99"), Some(vec![99]));
    }

    #[test]
    fn test_shared_across_threads() {
        let cache = std::sync::Arc::new(cache(1000, 60_000));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        cache.set(format!("{t}-{i}"), vec![t as u8]);
                        cache.get(&format!("{t}-{i}"));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.len(), 400);
    }
}
