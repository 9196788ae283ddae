//! Poll answer cache with per-key single resolution and LRU eviction

use crate::models::{PollKey, ResolvedAnswer};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub len: usize,
}

struct Slot {
    cell: Arc<OnceCell<ResolvedAnswer>>,
    stamp: u64,
}

#[derive(Default)]
struct Entries {
    slots: HashMap<PollKey, Slot>,
    /// Recency order, oldest first
    order: BTreeMap<u64, PollKey>,
    clock: u64,
}

impl Entries {
    fn touch(&mut self, key: PollKey) -> Arc<OnceCell<ResolvedAnswer>> {
        self.clock += 1;
        let stamp = self.clock;
        match self.slots.get_mut(&key) {
            Some(slot) => {
                self.order.remove(&slot.stamp);
                slot.stamp = stamp;
                self.order.insert(stamp, key);
                slot.cell.clone()
            }
            None => {
                let cell = Arc::new(OnceCell::new());
                self.slots.insert(
                    key,
                    Slot {
                        cell: cell.clone(),
                        stamp,
                    },
                );
                self.order.insert(stamp, key);
                cell
            }
        }
    }

    /// Drop least recently used resolved entries until within `capacity`.
    /// Entries still being resolved are skipped so their waiters share one result.
    fn evict(&mut self, capacity: usize) -> u64 {
        let mut evicted = 0;
        while self.slots.len() > capacity {
            let victim = self
                .order
                .iter()
                .find(|(_, key)| {
                    self.slots
                        .get(key)
                        .map(|slot| slot.cell.initialized())
                        .unwrap_or(true)
                })
                .map(|(stamp, key)| (*stamp, *key));
            let Some((stamp, key)) = victim else { break };
            self.order.remove(&stamp);
            self.slots.remove(&key);
            evicted += 1;
        }
        evicted
    }
}

/// Shared memo of resolved answers keyed by poll identity.
///
/// The map lock is held only to find or create a key's cell; resolution runs
/// outside it, so unrelated polls never wait on each other while concurrent
/// callers for the same key await a single resolver call.
pub struct PollCache {
    entries: Mutex<Entries>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl PollCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(Entries::default()),
            capacity: capacity.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Return the cached answer for `key`, running `resolver` only if no
    /// caller has resolved it yet.
    pub async fn get_or_resolve<F, Fut>(&self, key: PollKey, resolver: F) -> ResolvedAnswer
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ResolvedAnswer>,
    {
        let cell = self.entries.lock().touch(key);

        let mut ran = false;
        let answer = *cell
            .get_or_init(|| {
                ran = true;
                resolver()
            })
            .await;

        if ran {
            self.misses.fetch_add(1, Ordering::Relaxed);
            let evicted = self.entries.lock().evict(self.capacity);
            if evicted > 0 {
                self.evictions.fetch_add(evicted, Ordering::Relaxed);
                tracing::debug!(evicted, "Evicted old poll answers");
            }
        } else {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(%key, "Poll answer served from cache");
        }
        answer
    }

    /// Cached answer for `key`, if resolved. Does not count as a use.
    pub fn get(&self, key: &PollKey) -> Option<ResolvedAnswer> {
        self.entries
            .lock()
            .slots
            .get(key)
            .and_then(|slot| slot.cell.get().copied())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            len: self.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn key(message_id: i64) -> PollKey {
        PollKey {
            chat_id: -100,
            message_id,
        }
    }

    fn answer(option_index: usize) -> ResolvedAnswer {
        ResolvedAnswer {
            option_index,
            duration: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn test_second_resolver_not_invoked() {
        let cache = PollCache::new(8);
        let first = cache.get_or_resolve(key(1), || async { answer(2) }).await;
        let second = cache
            .get_or_resolve(key(1), || async { answer(7) })
            .await;
        assert_eq!(first, second);
        assert_eq!(cache.get(&key(1)), Some(answer(2)));

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.len), (1, 1, 1));
    }

    #[tokio::test]
    async fn test_lru_eviction() {
        let cache = PollCache::new(2);
        cache.get_or_resolve(key(1), || async { answer(0) }).await;
        cache.get_or_resolve(key(2), || async { answer(1) }).await;
        // Touch 1 so 2 becomes the oldest
        cache.get_or_resolve(key(1), || async { answer(9) }).await;
        cache.get_or_resolve(key(3), || async { answer(2) }).await;

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&key(1)).is_some());
        assert!(cache.get(&key(2)).is_none());
        assert!(cache.get(&key(3)).is_some());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_get_unknown_key() {
        let cache = PollCache::new(4);
        assert!(cache.get(&key(42)).is_none());
        assert!(cache.is_empty());
    }
}
