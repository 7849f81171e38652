//! Namespaced scalar preferences
//!
//! A [`Preferences`] handle reads and writes plain values in one durable
//! namespace. Setting a value to `None` deletes the key instead of storing an
//! empty marker.

use std::sync::Arc;

use crate::db::{PreferenceBackend, PreferenceWrite};
use crate::error::Result;

/// Key of the event queue in the primary namespace
pub const EVENTS_KEY: &str = "EVENTS";
/// Key of the pending request queue in the primary namespace
pub const CONNECTIONS_KEY: &str = "CONNECTIONS";

/// Cached advertising identifier (primary namespace)
pub const ADVERTISING_ID_KEY: &str = "CACHED_ADVERTISING_ID";
/// Last downloaded remote-config payload (primary namespace)
pub const REMOTE_CONFIG_KEY: &str = "REMOTE_CONFIG_VALUES";

/// Messaging provider id (push namespace)
pub const PUSH_PROVIDER_KEY: &str = "PUSH_MESSAGING_PROVIDER";
/// Last messaging mode (push namespace)
pub const PUSH_MODE_KEY: &str = "PUSH_MESSAGING_MODE";
/// Push consent flag (push namespace)
pub const PUSH_CONSENT_KEY: &str = "PUSH_CONSENT";
/// Pending push action id (push namespace)
pub const PUSH_ACTION_ID_KEY: &str = "PUSH_ACTION_ID";
/// Pending push action index (push namespace)
pub const PUSH_ACTION_INDEX_KEY: &str = "PUSH_ACTION_INDEX";

/// Scalar storage scoped to one namespace
#[derive(Clone)]
pub struct Preferences {
    backend: Arc<dyn PreferenceBackend>,
    namespace: String,
}

impl Preferences {
    pub fn new(backend: Arc<dyn PreferenceBackend>, namespace: impl Into<String>) -> Self {
        Self {
            backend,
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        self.backend.get(&self.namespace, key)
    }

    /// Store `value`, or remove the key when `value` is `None`
    pub fn set(&self, key: &str, value: Option<&str>) -> Result<()> {
        match value {
            Some(value) => self.backend.put(&self.namespace, key, value),
            None => self.backend.remove(&self.namespace, key),
        }
    }

    pub fn contains(&self, key: &str) -> Result<bool> {
        self.backend.contains(&self.namespace, key)
    }

    /// Read an integer; values that do not parse read as absent
    pub fn get_i64(&self, key: &str) -> Result<Option<i64>> {
        Ok(self.get(key)?.and_then(|raw| match raw.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(namespace = %self.namespace, key, value = %raw, "Ignoring non-integer preference");
                None
            }
        }))
    }

    pub fn set_i64(&self, key: &str, value: Option<i64>) -> Result<()> {
        self.set(key, value.map(|v| v.to_string()).as_deref())
    }

    /// Read a boolean; values that do not parse read as absent
    pub fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        Ok(self.get(key)?.and_then(|raw| match raw.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(namespace = %self.namespace, key, value = %raw, "Ignoring non-boolean preference");
                None
            }
        }))
    }

    pub fn set_bool(&self, key: &str, value: Option<bool>) -> Result<()> {
        self.set(key, value.map(|v| v.to_string()).as_deref())
    }

    /// Apply several writes to this namespace atomically
    pub(crate) fn commit(&self, writes: &[PreferenceWrite]) -> Result<()> {
        self.backend.commit(&self.namespace, writes)
    }
}

impl std::fmt::Debug for Preferences {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Preferences")
            .field("namespace", &self.namespace)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn prefs() -> (Arc<Database>, Preferences) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        db.migrate().unwrap();
        let prefs = Preferences::new(db.clone(), "BEACON_STORE");
        (db, prefs)
    }

    #[test]
    fn test_set_get_and_clear_on_none() {
        let (db, prefs) = prefs();

        assert_eq!(prefs.get("xxx").unwrap(), None);
        prefs.set("xxx", Some("asd")).unwrap();
        assert_eq!(prefs.get("xxx").unwrap().as_deref(), Some("asd"));

        prefs.set("xxx", Some("123")).unwrap();
        assert_eq!(prefs.get("xxx").unwrap().as_deref(), Some("123"));

        prefs.set("xxx", None).unwrap();
        assert_eq!(prefs.get("xxx").unwrap(), None);
        // physically gone, not an empty marker
        assert!(!db.contains("BEACON_STORE", "xxx").unwrap());
    }

    #[test]
    fn test_empty_string_is_a_value() {
        let (_db, prefs) = prefs();
        prefs.set("k", Some("")).unwrap();
        assert_eq!(prefs.get("k").unwrap().as_deref(), Some(""));
        assert!(prefs.contains("k").unwrap());
    }

    #[test]
    fn test_typed_values() {
        let (_db, prefs) = prefs();

        prefs.set_i64("n", Some(1234)).unwrap();
        assert_eq!(prefs.get_i64("n").unwrap(), Some(1234));
        prefs.set_bool("b", Some(true)).unwrap();
        assert_eq!(prefs.get_bool("b").unwrap(), Some(true));

        prefs.set("n", Some("not a number")).unwrap();
        assert_eq!(prefs.get_i64("n").unwrap(), None);

        prefs.set_bool("b", None).unwrap();
        assert!(!prefs.contains("b").unwrap());
    }
}
