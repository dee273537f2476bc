use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Idle time after which a client's server-side session data is dropped.
const SESSION_IDLE_SECS: u64 = 6 * 3600;

/// Cookie carrying the server-side session id.
pub const SESSION_COOKIE: &str = "agora_sid";

struct ClientSession {
    touched: Instant,
    values: HashMap<String, Value>,
}

/// Per-client key/value storage that lives for the duration of a browser
/// session. Holds wizard progress and message spam windows.
///
/// The store sits behind an async mutex in `AppState`; callers that hold
/// the guard across a whole operation serialize that operation per process.
#[derive(Default)]
pub struct SessionStore {
    sessions: HashMap<String, ClientSession>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generate_id() -> String {
        uuid::Uuid::now_v7().to_string()
    }

    pub fn has(&self, sid: &str, key: &str) -> bool {
        self.sessions
            .get(sid)
            .is_some_and(|s| s.values.contains_key(key))
    }

    pub fn get(&self, sid: &str, key: &str) -> Option<&Value> {
        self.sessions.get(sid)?.values.get(key)
    }

    pub fn get_as<T: DeserializeOwned>(&self, sid: &str, key: &str) -> Option<T> {
        self.get(sid, key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    pub fn set(&mut self, sid: &str, key: &str, value: Value) {
        self.clear_stale();
        let session = self
            .sessions
            .entry(sid.to_string())
            .or_insert_with(|| ClientSession {
                touched: Instant::now(),
                values: HashMap::new(),
            });
        session.touched = Instant::now();
        session.values.insert(key.to_string(), value);
    }

    pub fn set_from<T: Serialize>(&mut self, sid: &str, key: &str, value: &T) {
        match serde_json::to_value(value) {
            Ok(value) => self.set(sid, key, value),
            Err(e) => tracing::error!("Cannot store session value {}: {}", key, e),
        }
    }

    pub fn remove(&mut self, sid: &str, key: &str) {
        if let Some(session) = self.sessions.get_mut(sid) {
            session.values.remove(key);
        }
    }

    fn clear_stale(&mut self) {
        let cutoff = Duration::from_secs(SESSION_IDLE_SECS);
        self.sessions.retain(|_, s| s.touched.elapsed() < cutoff);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn values_are_scoped_per_session() {
        let mut store = SessionStore::new();
        store.set("a", "install", json!({"current": 2}));

        assert!(store.has("a", "install"));
        assert!(!store.has("b", "install"));
        assert_eq!(store.get("a", "install"), Some(&json!({"current": 2})));
    }

    #[test]
    fn remove_drops_a_single_key() {
        let mut store = SessionStore::new();
        store.set("a", "install", json!(1));
        store.set("a", "messages.1", json!([1, 2]));

        store.remove("a", "install");
        assert!(!store.has("a", "install"));
        assert!(store.has("a", "messages.1"));
    }

    #[test]
    fn typed_access_roundtrips() {
        let mut store = SessionStore::new();
        store.set_from("a", "stamps", &vec![10_i64, 20]);
        assert_eq!(store.get_as::<Vec<i64>>("a", "stamps"), Some(vec![10, 20]));
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(SessionStore::generate_id(), SessionStore::generate_id());
    }
}
