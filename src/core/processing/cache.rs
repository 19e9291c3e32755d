//! Keyed memoization with at-most-once computation per key, safe under
//! concurrent callers. A second caller asking for a key that is being computed
//! blocks until the first one finishes and then shares its result.
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use once_cell::sync::OnceCell;

use crate::error::{Error, Result};

pub struct KeyedCache<K, V> {
    slots: Mutex<HashMap<K, Arc<OnceCell<V>>>>,
}

impl<K, V> Default for KeyedCache<K, V> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> KeyedCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &K) -> Result<Arc<OnceCell<V>>> {
        let mut slots = self
            .slots
            .lock()
            .map_err(|_| Error::Processing("cache lock poisoned".to_string()))?;
        Ok(slots.entry(key.clone()).or_default().clone())
    }

    /// Return the cached value of `key`, running `init` if no value exists yet.
    /// A failed `init` leaves the slot empty so a later call can retry.
    pub fn get_or_try_init<F>(&self, key: &K, init: F) -> Result<V>
    where
        F: FnOnce() -> Result<V>,
    {
        // The map lock is released before `init` runs; only the per-key cell blocks.
        let cell = self.slot(key)?;
        cell.get_or_try_init(init).cloned()
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let slots = self.slots.lock().ok()?;
        slots.get(key).and_then(|c| c.get().cloned())
    }

    pub fn contains(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .map(|s| s.values().filter(|c| c.get().is_some()).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn computes_once_per_key() {
        let cache: KeyedCache<&str, u32> = KeyedCache::new();
        let calls = AtomicUsize::new(0);
        for _ in 0..3 {
            let v = cache
                .get_or_try_init(&"a", || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(42)
                })
                .unwrap();
            assert_eq!(v, 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn failed_init_is_retried() {
        let cache: KeyedCache<u8, u8> = KeyedCache::new();
        assert!(
            cache
                .get_or_try_init(&1, || Err(Error::Processing("boom".into())))
                .is_err()
        );
        assert!(!cache.contains(&1));
        assert_eq!(cache.get_or_try_init(&1, || Ok(7)).unwrap(), 7);
    }

    #[test]
    fn concurrent_callers_share_one_computation() {
        let cache = Arc::new(KeyedCache::<u8, u64>::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let calls = Arc::clone(&calls);
                thread::spawn(move || {
                    cache
                        .get_or_try_init(&0, || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(std::time::Duration::from_millis(20));
                            Ok(99)
                        })
                        .unwrap()
                })
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), 99);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
