//! Keyed append-only logs whose entries expire after a fixed time-to-live.
//!
//! Used for chat transcripts: each companion id maps to its messages in
//! arrival order, and messages older than the retention window are dropped
//! by [`TtlStore::evict_expired`]. Reads already hide expired entries.

use std::collections::HashMap;
use std::hash::Hash;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct Stamped<V> {
    at: DateTime<Utc>,
    value: V,
}

/// A map from keys to time-stamped entry lists with a shared TTL.
#[derive(Debug)]
pub struct TtlStore<K, V> {
    ttl: TimeDelta,
    entries: RwLock<HashMap<K, Vec<Stamped<V>>>>,
}

impl<K: Eq + Hash, V: Clone> TtlStore<K, V> {
    /// Create an empty store whose entries live for `ttl`.
    pub fn new(ttl: TimeDelta) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Entry lifetime.
    pub const fn ttl(&self) -> TimeDelta {
        self.ttl
    }

    fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Append `value` under `key`, stamped with `at`.
    pub async fn push(&self, key: K, value: V, at: DateTime<Utc>) {
        let mut entries = self.entries.write().await;
        entries.entry(key).or_default().push(Stamped { at, value });
    }

    /// The most recent `limit` live entries under `key`, oldest first.
    pub async fn recent(&self, key: &K, limit: usize, now: DateTime<Utc>) -> Vec<V> {
        let cutoff = self.cutoff(now);
        let entries = self.entries.read().await;
        let Some(list) = entries.get(key) else {
            return Vec::new();
        };
        let live: Vec<&Stamped<V>> = list.iter().filter(|e| e.at > cutoff).collect();
        let skip = live.len().saturating_sub(limit);
        live.into_iter()
            .skip(skip)
            .map(|e| e.value.clone())
            .collect()
    }

    /// Drop every entry older than the TTL. Returns how many were dropped.
    pub async fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let cutoff = self.cutoff(now);
        let mut entries = self.entries.write().await;
        let mut evicted = 0_usize;
        for list in entries.values_mut() {
            let before = list.len();
            list.retain(|e| e.at > cutoff);
            evicted = evicted.saturating_add(before.saturating_sub(list.len()));
        }
        entries.retain(|_, list| !list.is_empty());
        evicted
    }

    /// Number of keys with at least one stored entry.
    pub async fn key_count(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(hours: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap_or_default() + TimeDelta::hours(hours)
    }

    #[tokio::test]
    async fn recent_returns_tail_in_order() {
        let store = TtlStore::new(TimeDelta::days(7));
        for i in 0..5 {
            store.push("a", i, at(i)).await;
        }
        assert_eq!(store.recent(&"a", 3, at(5)).await, vec![2, 3, 4]);
        assert_eq!(store.recent(&"a", 50, at(5)).await, vec![0, 1, 2, 3, 4]);
        assert!(store.recent(&"b", 3, at(5)).await.is_empty());
    }

    #[tokio::test]
    async fn expired_entries_are_hidden_and_evicted() {
        let store = TtlStore::new(TimeDelta::hours(24));
        store.push(1_u8, "old", at(0)).await;
        store.push(1_u8, "new", at(20)).await;
        store.push(2_u8, "gone", at(1)).await;

        let now = at(30);
        assert_eq!(store.recent(&1, 10, now).await, vec!["new"]);
        assert_eq!(store.evict_expired(now).await, 2);
        assert_eq!(store.key_count().await, 1);
    }
}
