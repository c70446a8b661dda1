/*============================================================
  Synavera Project: Syn-Fame
  Module: synfame_core::cache
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1
  ------------------------------------------------------------
  Purpose:
    Expiring key/value cache owned by whoever constructs it;
    holds previously fetched version lists and the app ID to
    name map.

  Security / Safety Notes:
    In-memory only; nothing is written to disk.

  Dependencies:
    chrono for expirations, serde_json for stored values.

  Operational Scope:
    Passed by reference into the registry client.

  Revision History:
    2025-11-12 COD  Authored explicit cache object.
============================================================*/

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

/// Lifetime applied when `put` is called without an expiration.
pub const DEFAULT_TTL_DAYS: i64 = 5;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    expires_at: Option<DateTime<Utc>>,
}

/// Expiring key/value store.
#[derive(Debug, Clone, Default)]
pub struct ExpiringCache {
    entries: HashMap<String, CacheEntry>,
}

impl ExpiringCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the cache; seeded entries never expire.
    pub fn init<I>(&mut self, initial: I)
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        for (key, value) in initial {
            self.entries.insert(
                key,
                CacheEntry {
                    value,
                    expires_at: None,
                },
            );
        }
    }

    /// Fetch an unexpired value. Expired entries are evicted.
    pub fn get(&mut self, key: &str) -> Option<Value> {
        self.get_at(key, Utc::now())
    }

    fn get_at(&mut self, key: &str, now: DateTime<Utc>) -> Option<Value> {
        let expired = match self.entries.get(key) {
            None => return None,
            Some(entry) => entry.expires_at.is_some_and(|at| at <= now),
        };
        if expired {
            self.entries.remove(key);
            return None;
        }
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    /// Store a value; defaults to expiring after five days.
    pub fn put(&mut self, key: impl Into<String>, value: Value, expires_at: Option<DateTime<Utc>>) {
        let expires_at =
            expires_at.unwrap_or_else(|| Utc::now() + Duration::days(DEFAULT_TTL_DAYS));
        self.entries.insert(
            key.into(),
            CacheEntry {
                value,
                expires_at: Some(expires_at),
            },
        );
    }

    /// Drop one entry, returning whether it existed.
    pub fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn expired_entries_are_evicted_on_read() {
        let mut cache = ExpiringCache::new();
        let past = Utc::now() - Duration::seconds(1);
        cache.put("stale", json!([1, 2]), Some(past));
        cache.put("fresh", json!("ok"), None);
        assert_eq!(cache.get("stale"), None);
        assert_eq!(cache.get("fresh"), Some(json!("ok")));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn default_ttl_runs_five_days() {
        let mut cache = ExpiringCache::new();
        cache.put("k", json!(1), None);
        let four_days = Utc::now() + Duration::days(4);
        let six_days = Utc::now() + Duration::days(6);
        assert_eq!(cache.get_at("k", four_days), Some(json!(1)));
        assert_eq!(cache.get_at("k", six_days), None);
    }

    #[test]
    fn seeded_entries_survive_until_cleared() {
        let mut cache = ExpiringCache::new();
        cache.init([("names".to_string(), json!({"a": "Base"}))]);
        let far = Utc::now() + Duration::days(10_000);
        assert_eq!(cache.get_at("names", far), Some(json!({"a": "Base"})));
        cache.clear();
        assert!(cache.is_empty());
    }
}
