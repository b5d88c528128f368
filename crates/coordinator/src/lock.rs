use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::OwnedMutexGuard;

type KeyLock = Arc<tokio::sync::Mutex<()>>;

/// One async mutex per key, created on first use and dropped again when the
/// last holder or waiter releases it.
///
/// Serializes read-then-write sequences (latest-state lookups followed by an
/// append) for a single equipment without blocking other equipment. Keys come
/// from request paths, so idle entries must not accumulate.
#[derive(Debug, Default)]
pub(crate) struct KeyedLocks {
    locks: Mutex<HashMap<String, KeyLock>>,
}

/// Held for the duration of one keyed critical section.
pub(crate) struct KeyedGuard<'a> {
    owner: &'a KeyedLocks,
    key: String,
    lock: KeyLock,
    guard: Option<OwnedMutexGuard<()>>,
}

impl KeyedLocks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn lock(&self, key: &str) -> KeyedGuard<'_> {
        let lock = {
            let mut map = self.map();
            if !map.contains_key(key) {
                // Entries left behind by callers cancelled while waiting.
                map.retain(|_, l| Arc::strong_count(l) > 1);
            }
            Arc::clone(map.entry(key.to_string()).or_default())
        };
        let guard = Arc::clone(&lock).lock_owned().await;
        KeyedGuard {
            owner: self,
            key: key.to_string(),
            lock,
            guard: Some(guard),
        }
    }

    fn map(&self) -> MutexGuard<'_, HashMap<String, KeyLock>> {
        self.locks.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.map().len()
    }
}

impl Drop for KeyedGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        // Clones are only made under the map lock, so the count is stable
        // here: one for the map, one for this guard.
        let mut map = self.owner.map();
        let idle = Arc::strong_count(&self.lock) == 2;
        if idle && map.get(&self.key).is_some_and(|l| Arc::ptr_eq(l, &self.lock)) {
            map.remove(&self.key);
        }
    }
}
