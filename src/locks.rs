//! Per-user lock registry.
//!
//! The tabular store has no transactions, so every read-modify-write for a
//! given handle must be serialized in-process. One async mutex is created
//! lazily per handle and kept for the process lifetime; cardinality is
//! bounded by the number of distinct users seen. Unrelated users proceed
//! concurrently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::Mutex;

/// Registry handing out one mutual-exclusion handle per user key.
pub struct LockRegistry {
    /// Guards the map itself, not the per-user critical sections.
    registry: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
    /// Shared lock used when no key is known.
    fallback: Arc<Mutex<()>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self {
            registry: StdMutex::new(HashMap::new()),
            fallback: Arc::new(Mutex::new(())),
        }
    }

    /// Return the lock for `key`, creating it on first request.
    ///
    /// An empty key maps to the shared fallback lock.
    pub fn acquire(&self, key: &str) -> Arc<Mutex<()>> {
        if key.is_empty() {
            return Arc::clone(&self.fallback);
        }

        let mut registry = self.registry.lock().expect("lock registry poisoned");
        Arc::clone(
            registry
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    /// Number of distinct user locks created so far.
    pub fn len(&self) -> usize {
        self.registry.lock().expect("lock registry poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for LockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_key_same_lock() {
        let registry = LockRegistry::new();
        let a = registry.acquire("alice");
        let b = registry.acquire("alice");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn distinct_keys_distinct_locks() {
        let registry = LockRegistry::new();
        let a = registry.acquire("alice");
        let b = registry.acquire("bob");
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn empty_key_uses_fallback() {
        let registry = LockRegistry::new();
        let a = registry.acquire("");
        let b = registry.acquire("");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 0);
    }

    #[tokio::test]
    async fn concurrent_acquire_creates_one_lock() {
        let registry = Arc::new(LockRegistry::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move { registry.acquire("alice") }));
        }
        let mut locks = Vec::new();
        for h in handles {
            locks.push(h.await.unwrap());
        }
        assert!(locks.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(registry.len(), 1);
    }
}
