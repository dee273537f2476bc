use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// Something that happened to forum content, used to decide which cached
/// snapshots went stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEvent {
    NewThread,
    NewPost,
    PostDelete,
}

impl CacheEvent {
    fn stale_keys(self) -> &'static [&'static str] {
        match self {
            CacheEvent::NewPost => &["forum.postscount", "user.postscount", "forum.latestposts"],
            CacheEvent::NewThread => &[
                "forum.threadscount",
                "forum.postscount",
                "user.threadscount",
                "user.postscount",
                "forum.latestposts",
            ],
            CacheEvent::PostDelete => &[
                "forum.threadscount",
                "forum.postscount",
                "user.threadscount",
                "user.postscount",
                "forum.latestposts",
                "user.subscriptions",
            ],
        }
    }
}

/// In-process cache addressed either by key or by `key -> element`.
///
/// Values are JSON so any serializable snapshot can be stored. Entries may
/// carry an expiry; expired entries behave as missing.
pub struct Cache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl Default for Cache {
    fn default() -> Self {
        Self::new()
    }
}

impl Cache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        let now = Instant::now();
        let mut entries = self.lock();
        let live = entries.get(key)?.is_live(now);
        if live {
            entries.get(key).map(|entry| entry.value.clone())
        } else {
            entries.remove(key);
            None
        }
    }

    pub fn set(&self, key: &str, value: Value) {
        self.insert(key, value, None);
    }

    pub fn set_with_ttl(&self, key: &str, value: Value, ttl: Duration) {
        self.insert(key, value, Some(Instant::now() + ttl));
    }

    fn insert(&self, key: &str, value: Value, expires_at: Option<Instant>) {
        let mut entries = self.lock();
        clear_stale(&mut entries);
        entries.insert(key.to_string(), Entry { value, expires_at });
    }

    pub fn delete(&self, key: &str) {
        self.lock().remove(key);
    }

    pub fn get_element(&self, key: &str, element: &str) -> Option<Value> {
        self.get(key)?.get(element).cloned()
    }

    /// Sets one element of a keyed map, keeping the expiry of the map.
    pub fn set_element(&self, key: &str, element: &str, value: Value) {
        let now = Instant::now();
        let mut entries = self.lock();
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| Entry {
                value: Value::Object(Map::new()),
                expires_at: None,
            });
        if !entry.is_live(now) || !entry.value.is_object() {
            entry.value = Value::Object(Map::new());
            entry.expires_at = None;
        }
        if let Value::Object(map) = &mut entry.value {
            map.insert(element.to_string(), value);
        }
    }

    pub fn delete_element(&self, key: &str, element: &str) {
        if let Some(Entry {
            value: Value::Object(map),
            ..
        }) = self.lock().get_mut(key)
        {
            map.remove(element);
        }
    }

    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key)
            .and_then(|value| serde_json::from_value(value).ok())
    }

    pub fn get_element_as<T: DeserializeOwned>(&self, key: &str, element: &str) -> Option<T> {
        self.get_element(key, element)
            .and_then(|value| serde_json::from_value(value).ok())
    }

    pub fn set_element_from<T: Serialize>(&self, key: &str, element: &str, value: &T) {
        match serde_json::to_value(value) {
            Ok(value) => self.set_element(key, element, value),
            Err(e) => tracing::warn!("Skipping cache write for {}.{}: {}", key, element, e),
        }
    }

    /// Drops every snapshot the event made stale.
    pub fn clear_after(&self, event: CacheEvent) {
        let mut entries = self.lock();
        for key in event.stale_keys() {
            entries.remove(*key);
        }
    }
}

fn clear_stale(entries: &mut HashMap<String, Entry>) {
    let now = Instant::now();
    entries.retain(|_, entry| entry.is_live(now));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_and_get_roundtrip() {
        let cache = Cache::new();
        cache.set("forum.postscount", json!(12));
        assert_eq!(cache.get("forum.postscount"), Some(json!(12)));
        assert_eq!(cache.get_as::<i64>("forum.postscount"), Some(12));
    }

    #[test]
    fn expired_entries_are_missing() {
        let cache = Cache::new();
        cache.set_with_ttl("user.votes.1", json!({"count": 1}), Duration::from_secs(0));
        assert!(cache.get("user.votes.1").is_none());
    }

    #[test]
    fn elements_are_addressed_inside_a_key() {
        let cache = Cache::new();
        cache.set_element("user.newmessages", "3", json!(2));
        cache.set_element("user.newmessages", "4", json!(5));
        assert_eq!(cache.get_element_as::<i64>("user.newmessages", "3"), Some(2));

        cache.delete_element("user.newmessages", "3");
        assert!(cache.get_element("user.newmessages", "3").is_none());
        assert_eq!(cache.get_element_as::<i64>("user.newmessages", "4"), Some(5));
    }

    #[test]
    fn set_element_keeps_expiry_of_the_map() {
        let cache = Cache::new();
        cache.set_with_ttl(
            "user.votes.7",
            json!({"count": 1}),
            Duration::from_secs(3600),
        );
        cache.set_element("user.votes.7", "count", json!(2));
        assert_eq!(cache.get_element_as::<i64>("user.votes.7", "count"), Some(2));
    }

    #[test]
    fn set_element_replaces_non_map_values() {
        let cache = Cache::new();
        cache.set("forum.latestposts", json!("stale"));
        cache.set_element("forum.latestposts", "guest", json!([]));
        assert_eq!(cache.get_element("forum.latestposts", "guest"), Some(json!([])));
    }

    #[test]
    fn clear_after_new_post_drops_latest_posts() {
        let cache = Cache::new();
        cache.set_element("forum.latestposts", "guest", json!([1]));
        cache.set_element("user.subscriptions", "1", json!(3));

        cache.clear_after(CacheEvent::NewPost);

        assert!(cache.get("forum.latestposts").is_none());
        assert!(cache.get("user.subscriptions").is_some());
    }

    #[test]
    fn clear_after_delete_drops_subscription_counts() {
        let cache = Cache::new();
        cache.set_element("user.subscriptions", "1", json!(3));
        cache.clear_after(CacheEvent::PostDelete);
        assert!(cache.get("user.subscriptions").is_none());
    }
}
