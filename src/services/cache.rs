//! Read-through cache for reference data (rooms, combos, menu items).
//!
//! Booking and payment state must never go through this cache.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub trait ReferenceCache: Send + Sync {
    fn get(&self, key: &str) -> Option<serde_json::Value>;
    fn set(&self, key: &str, value: serde_json::Value, tags: &[&str]);
    /// Drop every entry stored under `tag`. Returns how many were dropped.
    fn invalidate_tag(&self, tag: &str) -> usize;
}

struct Entry {
    value: serde_json::Value,
    tags: Vec<String>,
    expires_at: Instant,
}

pub struct InMemoryCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry>>,
}

impl InMemoryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl ReferenceCache for InMemoryCache {
    fn get(&self, key: &str) -> Option<serde_json::Value> {
        let mut entries = self.entries.lock().ok()?;
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn set(&self, key: &str, value: serde_json::Value, tags: &[&str]) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(
                key.to_string(),
                Entry {
                    value,
                    tags: tags.iter().map(|t| t.to_string()).collect(),
                    expires_at: Instant::now() + self.ttl,
                },
            );
        }
    }

    fn invalidate_tag(&self, tag: &str) -> usize {
        let Ok(mut entries) = self.entries.lock() else {
            return 0;
        };
        let before = entries.len();
        entries.retain(|_, entry| !entry.tags.iter().any(|t| t == tag));
        before - entries.len()
    }
}

/// Cache that never stores anything; every read goes to the database.
pub struct NoopCache;

impl ReferenceCache for NoopCache {
    fn get(&self, _key: &str) -> Option<serde_json::Value> {
        None
    }

    fn set(&self, _key: &str, _value: serde_json::Value, _tags: &[&str]) {}

    fn invalidate_tag(&self, _tag: &str) -> usize {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_after_set() {
        let cache = InMemoryCache::new(Duration::from_secs(60));
        cache.set("resource:r1", json!({"id": "r1"}), &["resources"]);
        assert_eq!(cache.get("resource:r1"), Some(json!({"id": "r1"})));
        assert_eq!(cache.get("resource:r2"), None);
    }

    #[test]
    fn test_expired_entry_is_a_miss() {
        let cache = InMemoryCache::new(Duration::ZERO);
        cache.set("k", json!(1), &[]);
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn test_invalidate_by_tag() {
        let cache = InMemoryCache::new(Duration::from_secs(60));
        cache.set("resource:r1", json!(1), &["resources", "location:l1"]);
        cache.set("resource:r2", json!(2), &["resources", "location:l2"]);
        cache.set("combo:c1", json!(3), &["combos"]);

        assert_eq!(cache.invalidate_tag("location:l1"), 1);
        assert_eq!(cache.get("resource:r1"), None);
        assert!(cache.get("resource:r2").is_some());

        assert_eq!(cache.invalidate_tag("resources"), 1);
        assert!(cache.get("combo:c1").is_some());
    }

    #[test]
    fn test_noop_cache_never_hits() {
        let cache = NoopCache;
        cache.set("k", json!(1), &["t"]);
        assert_eq!(cache.get("k"), None);
    }
}
