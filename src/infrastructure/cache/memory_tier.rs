use crate::domain::entities::CachedResponse;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};

/// Hot in-process copy of recently used cached responses.
pub struct MemoryTier {
    entries: Mutex<LruCache<(String, String), CachedResponse>>,
}

impl MemoryTier {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<(String, String), CachedResponse>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, cache_name: &str, key: &str) -> Option<CachedResponse> {
        self.lock()
            .get(&(cache_name.to_string(), key.to_string()))
            .cloned()
    }

    pub fn put(&self, entry: CachedResponse) {
        let slot = (entry.cache_name.clone(), entry.key.clone());
        self.lock().put(slot, entry);
    }

    pub fn remove_cache(&self, cache_name: &str) -> usize {
        let mut entries = self.lock();
        let doomed: Vec<(String, String)> = entries
            .iter()
            .filter(|((name, _), _)| name == cache_name)
            .map(|(slot, _)| slot.clone())
            .collect();
        for slot in &doomed {
            entries.pop(slot);
        }
        doomed.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
