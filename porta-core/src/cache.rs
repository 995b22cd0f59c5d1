//! Generic bounded cache with composable eviction policies.
//!
//! One concrete [`Cache`] type applies an ordered list of [`Policy`]
//! objects: [`Mru`] keeps the recency list in least-recently-used order,
//! [`SlotLimit`] evicts from the cold end past a maximum size, [`Ttl`]
//! expires entries by age on lookup. Policy order matters (slot-limit
//! eviction must observe post-reorder state so the coldest key is the one
//! evicted), so composition is an explicit constructor argument.
//!
//! All public operations serialize through the instance's single mutex.
//! Eviction and expiry go through a private non-locking removal primitive
//! shared with `delete`; nothing in here takes the lock twice.

use std::collections::VecDeque;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;
use tracing::trace;

use crate::errors::DbError;

/// Recency and age bookkeeping, shared with policies.
///
/// `recency` holds every cached key exactly once, most recent first.
pub struct Book<K> {
    recency: VecDeque<K>,
    stamps: FxHashMap<K, Instant>,
}

impl<K: Eq + Hash + Clone> Book<K> {
    fn new() -> Self {
        Self {
            recency: VecDeque::new(),
            stamps: FxHashMap::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.recency.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recency.is_empty()
    }

    /// The key at the least-recently-used end, if any.
    pub fn coldest(&self) -> Option<&K> {
        self.recency.back()
    }

    /// Age of an entry, if stamped.
    pub fn age(&self, key: &K) -> Option<Duration> {
        self.stamps.get(key).map(|t| t.elapsed())
    }

    /// Move `key` to the most-recent position if it is not already there.
    pub fn touch(&mut self, key: &K) {
        if self.recency.front() == Some(key) {
            return;
        }
        if let Some(pos) = self.recency.iter().position(|k| k == key) {
            let k = self.recency.remove(pos).unwrap();
            self.recency.push_front(k);
        }
    }

    fn insert(&mut self, key: K) {
        self.stamps.insert(key.clone(), Instant::now());
        self.recency.push_front(key);
    }

    fn restamp(&mut self, key: &K) {
        self.stamps.insert(key.clone(), Instant::now());
    }

    fn remove(&mut self, key: &K) {
        self.stamps.remove(key);
        if let Some(pos) = self.recency.iter().position(|k| k == key) {
            self.recency.remove(pos);
        }
    }
}

/// One composable cache behavior. Default methods are no-ops so a policy
/// only implements the hooks it cares about.
pub trait Policy<K>: Send + Sync {
    /// Called after a key was stored (new or overwritten).
    fn on_insert(&self, _book: &mut Book<K>, _key: &K) {}

    /// Called after a successful lookup.
    fn on_access(&self, _book: &mut Book<K>, _key: &K) {}

    /// True if the entry must be discarded instead of returned.
    fn expired(&self, _book: &Book<K>, _key: &K) -> bool {
        false
    }

    /// A key that must be evicted to restore this policy's bound, if any.
    fn overflow(&self, _book: &Book<K>) -> Option<K> {
        None
    }
}

/// Keeps `recency` in true LRU order by moving touched keys to the front.
pub struct Mru;

impl<K: Eq + Hash + Clone> Policy<K> for Mru {
    fn on_insert(&self, book: &mut Book<K>, key: &K) {
        book.touch(key);
    }

    fn on_access(&self, book: &mut Book<K>, key: &K) {
        book.touch(key);
    }
}

/// Bounds the entry count; past `size`, the coldest key is evicted.
pub struct SlotLimit {
    pub size: usize,
}

impl<K: Eq + Hash + Clone> Policy<K> for SlotLimit {
    fn overflow(&self, book: &Book<K>) -> Option<K> {
        if book.len() > self.size {
            book.coldest().cloned()
        } else {
            None
        }
    }
}

/// Expires entries older than `timeout` at lookup time.
pub struct Ttl {
    pub timeout: Duration,
}

impl<K: Eq + Hash + Clone> Policy<K> for Ttl {
    fn expired(&self, book: &Book<K>, key: &K) -> bool {
        match book.age(key) {
            Some(age) => age >= self.timeout,
            None => false,
        }
    }
}

struct Inner<K, V> {
    entries: FxHashMap<K, V>,
    book: Book<K>,
    policies: Vec<Box<dyn Policy<K>>>,
}

/// Thread-safe associative cache with composable eviction policies.
///
/// Lookup or deletion of an absent key is a caller error and fails with
/// [`ErrorKind::NotFound`](crate::errors::ErrorKind::NotFound); values are
/// returned by clone, so cache cheap-to-clone values (`Arc` payloads).
pub struct Cache<K, V> {
    inner: Mutex<Inner<K, V>>,
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    /// A cache applying `policies` in the given order.
    pub fn new(policies: Vec<Box<dyn Policy<K>>>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: FxHashMap::default(),
                book: Book::new(),
                policies,
            }),
        }
    }

    /// {Mru, SlotLimit}: the composition used for statement-translation
    /// caches.
    pub fn lru(size: usize) -> Self {
        Self::new(vec![Box::new(Mru), Box::new(SlotLimit { size })])
    }

    /// {Mru, SlotLimit, Ttl}: the composition used for shared
    /// cross-request caches such as per-session command lists.
    pub fn lru_ttl(size: usize, timeout: Duration) -> Self {
        Self::new(vec![
            Box::new(Mru),
            Box::new(SlotLimit { size }),
            Box::new(Ttl { timeout }),
        ])
    }

    /// Look up `key`. Expired entries are removed and reported absent.
    pub fn get(&self, key: &K) -> Result<V, DbError> {
        let mut guard = self.inner.lock().expect("cache mutex poisoned");
        let inner = &mut *guard;
        if !inner.entries.contains_key(key) {
            return Err(DbError::not_found(format!("cache key {key:?} not present")));
        }
        if inner.policies.iter().any(|p| p.expired(&inner.book, key)) {
            trace!(key = ?key, "cache entry expired");
            Self::remove_unlocked(inner, key);
            debug_assert!(Self::consistent(inner));
            return Err(DbError::not_found(format!("cache key {key:?} expired")));
        }
        for policy in &inner.policies {
            policy.on_access(&mut inner.book, key);
        }
        let value = inner.entries.get(key).cloned();
        debug_assert!(Self::consistent(inner));
        Ok(value.expect("entry vanished under lock"))
    }

    /// Store `key` → `value`, then let each policy evict in order.
    pub fn set(&self, key: K, value: V) {
        let mut guard = self.inner.lock().expect("cache mutex poisoned");
        let inner = &mut *guard;
        let fresh = inner.entries.insert(key.clone(), value).is_none();
        if fresh {
            inner.book.insert(key.clone());
        } else {
            inner.book.restamp(&key);
        }
        for policy in &inner.policies {
            policy.on_insert(&mut inner.book, &key);
        }
        // Eviction must run after the reorder hooks so the coldest key is
        // the one that goes.
        for i in 0..inner.policies.len() {
            loop {
                let victim = inner.policies[i].overflow(&inner.book);
                let Some(victim) = victim else { break };
                trace!(key = ?victim, "cache eviction");
                Self::remove_unlocked(inner, &victim);
            }
        }
        debug_assert!(Self::consistent(inner));
    }

    /// Remove `key`; absent keys are a caller error.
    pub fn delete(&self, key: &K) -> Result<(), DbError> {
        let mut guard = self.inner.lock().expect("cache mutex poisoned");
        let inner = &mut *guard;
        if !inner.entries.contains_key(key) {
            return Err(DbError::not_found(format!("cache key {key:?} not present")));
        }
        Self::remove_unlocked(inner, key);
        debug_assert!(Self::consistent(inner));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("cache mutex poisoned").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if `entries` and `recency` agree key-for-key. Exposed for
    /// stress tests; always true unless there is a bug in here.
    pub fn is_consistent(&self) -> bool {
        let guard = self.inner.lock().expect("cache mutex poisoned");
        Self::consistent(&guard)
    }

    /// Removal core used by `delete`, eviction, and expiry. The caller
    /// already holds the mutex.
    fn remove_unlocked(inner: &mut Inner<K, V>, key: &K) {
        inner.entries.remove(key);
        inner.book.remove(key);
    }

    fn consistent(inner: &Inner<K, V>) -> bool {
        if inner.entries.len() != inner.book.recency.len() {
            return false;
        }
        inner.book.recency.iter().all(|k| inner.entries.contains_key(k))
            && inner.book.recency.len() == inner.book.stamps.len()
    }
}
