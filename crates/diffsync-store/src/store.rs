//! In-memory indexed store with per-key exclusive lock scopes.
//!
//! Single operations are atomic on their own. Multi-step
//! read-modify-write sequences (synchronization rounds, change-log
//! appends) take a [`KeyLock`] for the whole sequence; waiting for a
//! held key is bounded and fails with [`StoreError::LockTimeout`]
//! instead of stalling indefinitely.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use thiserror::Error;

use crate::key::Key;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("timed out waiting for exclusive access to {0}")]
    LockTimeout(String),
}

#[derive(Default)]
pub struct Store {
    data: Mutex<BTreeMap<Key, Vec<u8>>>,
    held: Mutex<HashSet<Key>>,
    released: Condvar,
}

impl Store {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn get(&self, key: &Key) -> Option<Vec<u8>> {
        self.data.lock().get(key).cloned()
    }

    pub fn put(&self, key: Key, value: Vec<u8>) {
        self.data.lock().insert(key, value);
    }

    pub fn delete(&self, key: &Key) {
        self.data.lock().remove(key);
    }

    pub fn exists(&self, key: &Key) -> bool {
        self.data.lock().contains_key(key)
    }

    /// Iterates the key index and returns every key matching the
    /// predicate, in key order.
    pub fn scan<F>(&self, pred: F) -> Vec<Key>
    where
        F: Fn(&Key) -> bool,
    {
        self.data.lock().keys().filter(|k| pred(k)).cloned().collect()
    }

    /// Acquires the exclusive scope for `key`, waiting at most `timeout`
    /// for another holder to release it. The scope is released when the
    /// returned guard drops.
    pub fn lock(&self, key: &Key, timeout: Duration) -> Result<KeyLock<'_>, StoreError> {
        let deadline = Instant::now() + timeout;
        let mut held = self.held.lock();
        while held.contains(key) {
            if self.released.wait_until(&mut held, deadline).timed_out() {
                return Err(StoreError::LockTimeout(key.to_string()));
            }
        }
        held.insert(key.clone());
        Ok(KeyLock {
            store: self,
            key: key.clone(),
        })
    }

    fn unlock(&self, key: &Key) {
        self.held.lock().remove(key);
        self.released.notify_all();
    }
}

/// RAII guard for one key's exclusive scope.
pub struct KeyLock<'a> {
    store: &'a Store,
    key: Key,
}

impl KeyLock<'_> {
    pub fn key(&self) -> &Key {
        &self.key
    }
}

impl fmt::Debug for KeyLock<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyLock")
            .field("key", &format_args!("{}", self.key))
            .finish()
    }
}

impl Drop for KeyLock<'_> {
    fn drop(&mut self) {
        self.store.unlock(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{DocId, UserId};

    fn text_key(name: &str) -> Key {
        Key::ServerText {
            doc: DocId::from_filename(name).unwrap(),
        }
    }

    #[test]
    fn put_get_delete_exists() {
        let store = Store::new();
        let key = text_key("a.txt");
        assert!(!store.exists(&key));
        assert_eq!(store.get(&key), None);

        store.put(key.clone(), b"hello".to_vec());
        assert!(store.exists(&key));
        assert_eq!(store.get(&key), Some(b"hello".to_vec()));

        store.put(key.clone(), b"world".to_vec());
        assert_eq!(store.get(&key), Some(b"world".to_vec()));

        store.delete(&key);
        assert!(!store.exists(&key));
    }

    #[test]
    fn scan_filters_by_kind_and_user() {
        let store = Store::new();
        let doc = DocId::from_filename("a.txt").unwrap();
        let alice = UserId::new("alice").unwrap();
        let bob = UserId::new("bob").unwrap();
        store.put(
            Key::Registration { doc: doc.clone(), user: alice.clone() },
            Vec::new(),
        );
        store.put(
            Key::Registration { doc: doc.clone(), user: bob.clone() },
            Vec::new(),
        );
        store.put(Key::Heartbeat { user: alice.clone() }, b"1".to_vec());

        let registrations = store.scan(|k| matches!(k, Key::Registration { .. }));
        assert_eq!(registrations.len(), 2);

        let for_alice = store.scan(|k| k.user() == Some(&alice));
        assert_eq!(for_alice.len(), 2);
    }

    #[test]
    fn lock_is_exclusive_and_times_out() {
        let store = Store::new();
        let key = text_key("a.txt");
        let guard = store.lock(&key, Duration::from_millis(50)).unwrap();
        let err = store.lock(&key, Duration::from_millis(50)).unwrap_err();
        assert!(matches!(err, StoreError::LockTimeout(_)));
        assert!(err.to_string().contains("text:a.txt"));
        assert!(format!("{guard:?}").contains("text:a.txt"));
        drop(guard);
        assert!(store.lock(&key, Duration::from_millis(50)).is_ok());
    }

    #[test]
    fn lock_wakes_waiter_on_release() {
        let store = Store::new();
        let key = text_key("a.txt");
        let guard = store.lock(&key, Duration::from_millis(50)).unwrap();

        let store2 = Arc::clone(&store);
        let key2 = key.clone();
        let waiter = std::thread::spawn(move || {
            store2.lock(&key2, Duration::from_secs(2)).is_ok()
        });
        std::thread::sleep(Duration::from_millis(20));
        drop(guard);
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn distinct_keys_lock_independently() {
        let store = Store::new();
        let _a = store.lock(&text_key("a.txt"), Duration::from_millis(50)).unwrap();
        let _b = store.lock(&text_key("b.txt"), Duration::from_millis(50)).unwrap();
    }
}
