use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Async mutual exclusion per string key.
///
/// Entries are weak, so a key's mutex lives only while someone holds or
/// waits on it.
#[derive(Default)]
pub struct KeyedLocks {
    locks: Mutex<HashMap<String, Weak<Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.retain(|_, weak| weak.strong_count() > 0);

            match locks.get(key).and_then(Weak::upgrade) {
                Some(lock) => lock,
                None => {
                    let lock = Arc::new(Mutex::new(()));
                    locks.insert(key.to_string(), Arc::downgrade(&lock));
                    lock
                }
            }
        };

        lock.lock_owned().await
    }

    /// Number of keys with a live lock
    pub async fn len(&self) -> usize {
        self.locks
            .lock()
            .await
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Per-contact mutual exclusion for the thread reuse/creation section
#[derive(Default)]
pub struct ContactLocks {
    inner: KeyedLocks,
}

/// Proof that the caller holds the lock of one contact
pub struct ContactGuard {
    contact_id: String,
    _guard: OwnedMutexGuard<()>,
}

impl ContactGuard {
    pub fn contact_id(&self) -> &str {
        &self.contact_id
    }
}

impl ContactLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, contact_id: &str) -> ContactGuard {
        ContactGuard {
            contact_id: contact_id.to_string(),
            _guard: self.inner.acquire(contact_id).await,
        }
    }

    /// Number of contacts with a live lock
    pub async fn len(&self) -> usize {
        self.inner.len().await
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.is_empty().await
    }
}
