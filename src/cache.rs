//! Expiring cache owned by whoever needs it, never a process global.

use crate::clock;

use chrono::{DateTime, TimeDelta, Utc};
use std::{collections, fmt, hash, sync};

/// Map whose entries expire `ttl` after insertion, as measured by an injected clock.
pub struct TtlCache<K, V> {
    clock: sync::Arc<dyn clock::Clock>,
    entries: sync::RwLock<collections::HashMap<K, (V, DateTime<Utc>)>>,
    ttl: TimeDelta,
}

impl<K, V> fmt::Debug for TtlCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries_len = self.entries.read().map(|entries| entries.len()).unwrap_or(0);
        f.debug_struct("TtlCache")
            .field("entries_len", &entries_len)
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl<K: Eq + hash::Hash, V: Clone> TtlCache<K, V> {
    /// Empty cache.
    pub fn new(clock: sync::Arc<dyn clock::Clock>, ttl: TimeDelta) -> Self {
        Self {
            clock,
            entries: sync::RwLock::new(collections::HashMap::new()),
            ttl,
        }
    }

    /// The live value for `key`, if any.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let entries = self
            .entries
            .read()
            .unwrap_or_else(sync::PoisonError::into_inner);
        entries
            .get(key)
            .filter(|(_, expires_at)| now < *expires_at)
            .map(|(value, _)| value.clone())
    }

    /// Stores `value`, replacing any previous entry.
    pub fn insert(&self, key: K, value: V) {
        let expires_at = self
            .clock
            .now()
            .checked_add_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.entries
            .write()
            .unwrap_or_else(sync::PoisonError::into_inner)
            .insert(key, (value, expires_at));
    }

    /// Drops the entry for `key`.
    pub fn invalidate(&self, key: &K) {
        self.entries
            .write()
            .unwrap_or_else(sync::PoisonError::into_inner)
            .remove(key);
    }

    /// Drops every expired entry.
    pub fn purge_expired(&self) {
        let now = self.clock.now();
        self.entries
            .write()
            .unwrap_or_else(sync::PoisonError::into_inner)
            .retain(|_, (_, expires_at)| now < *expires_at);
    }

    /// Number of stored entries, expired ones included until purged.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(sync::PoisonError::into_inner)
            .len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
