//! Expiring key-value store: per-entry TTL with lazy expiry and a periodic sweep.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

struct Slot<V> {
    value: V,
    expires_at: Instant,
    seq: u64,
}

impl<V> Slot<V> {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

struct Inner<K, V> {
    entries: HashMap<K, Slot<V>>,
    /// Insertion sequence → key. Re-putting a key moves it to the end.
    order: BTreeMap<u64, K>,
    next_seq: u64,
}

impl<K: Eq + Hash + Clone, V> Inner<K, V> {
    fn remove(&mut self, key: &K) -> Option<Slot<V>> {
        let slot = self.entries.remove(key)?;
        self.order.remove(&slot.seq);
        Some(slot)
    }

    fn insert(&mut self, key: K, value: V, ttl: Duration, now: Instant) {
        self.remove(&key);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.order.insert(seq, key.clone());
        self.entries.insert(
            key,
            Slot {
                value,
                expires_at: now + ttl,
                seq,
            },
        );
    }
}

/// A map whose entries vanish `ttl` after their last `put`.
///
/// Expired entries are never returned, whether or not the background sweep
/// has physically removed them yet. All operations hold the lock only for the
/// in-memory bookkeeping; nothing here awaits.
pub struct ExpiringStore<K, V> {
    name: &'static str,
    inner: RwLock<Inner<K, V>>,
}

impl<K, V> ExpiringStore<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create an empty store. `name` only shows up in logs.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            inner: RwLock::new(Inner {
                entries: HashMap::new(),
                order: BTreeMap::new(),
                next_seq: 0,
            }),
        }
    }

    /// Insert or overwrite `key`, resetting its expiry to `now + ttl`.
    pub fn put(&self, key: K, value: V, ttl: Duration) {
        let now = Instant::now();
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.insert(key, value, ttl, now);
    }

    /// Atomically insert `value` when `accept` approves the current live value.
    ///
    /// `accept` sees `None` when the key is absent or expired. Returns whether
    /// the value was written.
    pub fn put_if<F>(&self, key: K, value: V, ttl: Duration, accept: F) -> bool
    where
        F: FnOnce(Option<&V>) -> bool,
    {
        let now = Instant::now();
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let current = inner
            .entries
            .get(&key)
            .filter(|slot| slot.is_live(now))
            .map(|slot| &slot.value);
        if !accept(current) {
            return false;
        }
        inner.insert(key, value, ttl, now);
        true
    }

    /// Get a live value.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .entries
            .get(key)
            .filter(|slot| slot.is_live(now))
            .map(|slot| slot.value.clone())
    }

    /// Remove and return a live value in one step.
    pub fn take(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner
            .remove(key)
            .filter(|slot| slot.is_live(now))
            .map(|slot| slot.value)
    }

    /// Remove and return a live value only when `matches` approves it.
    pub fn take_if<F>(&self, key: &K, matches: F) -> Option<V>
    where
        F: FnOnce(&V) -> bool,
    {
        let now = Instant::now();
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let hit = inner
            .entries
            .get(key)
            .is_some_and(|slot| slot.is_live(now) && matches(&slot.value));
        if !hit {
            return None;
        }
        inner.remove(key).map(|slot| slot.value)
    }

    /// Remove `key`. Returns whether a live entry was removed.
    pub fn delete(&self, key: &K) -> bool {
        self.take(key).is_some()
    }

    /// Keys of live entries, oldest insertion first.
    pub fn keys(&self) -> Vec<K> {
        let now = Instant::now();
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .order
            .values()
            .filter(|key| inner.entries.get(*key).is_some_and(|s| s.is_live(now)))
            .cloned()
            .collect()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.entries.values().filter(|s| s.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Physically drop expired entries. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let expired: Vec<K> = inner
            .entries
            .iter()
            .filter(|(_, slot)| !slot.is_live(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            inner.remove(key);
        }
        if !expired.is_empty() {
            debug!(store = self.name, count = expired.len(), "Purged expired entries");
        }
        expired.len()
    }
}

/// Anything the periodic sweep can purge.
pub trait Sweep: Send + Sync {
    fn sweep(&self) -> usize;
}

impl<K, V> Sweep for ExpiringStore<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    fn sweep(&self) -> usize {
        self.purge_expired()
    }
}

/// Spawn a background task that purges expired entries every `period`.
pub fn spawn_sweep_task(
    targets: Vec<Arc<dyn Sweep>>,
    period: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            for target in &targets {
                target.sweep();
            }
        }
    })
}
