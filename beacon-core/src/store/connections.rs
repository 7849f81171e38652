//! Durable FIFO of pending outbound requests
//!
//! Requests are opaque strings. Identical requests may be queued more than
//! once (a retried batch can serialize to the same bytes), so removal only
//! takes out the first matching entry and later duplicates keep their place.

use std::sync::{Mutex, MutexGuard, PoisonError};

use super::preferences::{Preferences, CONNECTIONS_KEY};
use super::sequence;
use crate::error::Result;

/// Ordered, durable collection of pending request strings
#[derive(Debug)]
pub struct ConnectionQueue {
    prefs: Preferences,
    lock: Mutex<()>,
    capacity: Option<usize>,
}

impl ConnectionQueue {
    pub(crate) fn new(prefs: Preferences, capacity: Option<usize>) -> Self {
        Self {
            prefs,
            lock: Mutex::new(()),
            capacity,
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn load(&self) -> Result<Vec<String>> {
        Ok(self
            .prefs
            .get(CONNECTIONS_KEY)?
            .map(|raw| sequence::split(&raw))
            .unwrap_or_default())
    }

    /// Append `items` with `request`, dropping the oldest entries past capacity
    pub(crate) fn push_bounded(&self, items: &mut Vec<String>, request: &str) {
        items.push(request.to_owned());

        if let Some(capacity) = self.capacity {
            if items.len() > capacity {
                let dropped = items.len() - capacity;
                items.drain(..dropped);
                tracing::warn!(
                    dropped,
                    capacity,
                    "Request queue full, dropped oldest pending requests"
                );
            }
        }
    }

    /// Append a request; empty requests are ignored
    pub fn add(&self, request: &str) -> Result<()> {
        if request.is_empty() {
            return Ok(());
        }

        let _guard = self.lock();
        let mut items = self.load()?;
        self.push_bounded(&mut items, request);
        self.prefs
            .set(CONNECTIONS_KEY, Some(&sequence::join(&items)?))?;

        tracing::debug!(pending = items.len(), "Queued request");
        Ok(())
    }

    /// Remove the first entry equal to `request`.
    ///
    /// Returns whether an entry was removed. Empty requests and requests that
    /// are not queued leave storage untouched.
    pub fn remove(&self, request: &str) -> Result<bool> {
        if request.is_empty() {
            return Ok(false);
        }

        let _guard = self.lock();
        let mut items = self.load()?;
        let Some(position) = items.iter().position(|item| item == request) else {
            return Ok(false);
        };

        items.remove(position);
        self.prefs
            .set(CONNECTIONS_KEY, Some(&sequence::join(&items)?))?;

        tracing::debug!(position, pending = items.len(), "Removed request");
        Ok(true)
    }

    /// Pending requests, oldest first
    pub fn list(&self) -> Result<Vec<String>> {
        self.load()
    }

    /// Oldest pending request
    pub fn front(&self) -> Result<Option<String>> {
        Ok(self.load()?.into_iter().next())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.load()?.is_empty())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.load()?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, PreferenceBackend};
    use std::sync::Arc;

    fn queue_with(capacity: Option<usize>) -> (Arc<Database>, ConnectionQueue) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        db.migrate().unwrap();
        let queue = ConnectionQueue::new(Preferences::new(db.clone(), "BEACON_STORE"), capacity);
        (db, queue)
    }

    fn queue() -> ConnectionQueue {
        queue_with(None).1
    }

    #[test]
    fn test_absent_value_is_empty() {
        let q = queue();
        assert!(q.list().unwrap().is_empty());
        assert!(q.is_empty().unwrap());
        assert_eq!(q.front().unwrap(), None);
    }

    #[test]
    fn test_emptied_value_is_empty() {
        let (db, q) = queue_with(None);
        q.add("blah").unwrap();
        assert!(q.remove("blah").unwrap());

        assert!(db.contains("BEACON_STORE", CONNECTIONS_KEY).unwrap());
        assert!(q.list().unwrap().is_empty());
        assert!(q.is_empty().unwrap());
    }

    #[test]
    fn test_add_keeps_order() {
        let q = queue();
        q.add("blah1").unwrap();
        q.add("blah2").unwrap();
        assert_eq!(q.list().unwrap(), vec!["blah1", "blah2"]);
        assert_eq!(q.front().unwrap().as_deref(), Some("blah1"));
    }

    #[test]
    fn test_add_empty_is_noop() {
        let (db, q) = queue_with(None);
        q.add("").unwrap();
        assert!(q.is_empty().unwrap());
        assert!(!db.contains("BEACON_STORE", CONNECTIONS_KEY).unwrap());
    }

    #[test]
    fn test_remove_empty_is_noop() {
        let q = queue();
        q.add("blah").unwrap();
        assert!(!q.remove("").unwrap());
        assert!(!q.is_empty().unwrap());
    }

    #[test]
    fn test_remove_not_first() {
        let q = queue();
        q.add("blah1").unwrap();
        q.add("blah2").unwrap();
        assert!(q.remove("blah2").unwrap());
        assert_eq!(q.list().unwrap(), vec!["blah1"]);
    }

    #[test]
    fn test_remove_only_first_match() {
        let q = queue();
        q.add("blah1").unwrap();
        q.add("blah2").unwrap();
        q.add("blah1").unwrap();
        assert_eq!(q.len().unwrap(), 3);

        assert!(q.remove("blah1").unwrap());
        assert_eq!(q.list().unwrap(), vec!["blah2", "blah1"]);
    }

    #[test]
    fn test_remove_missing_leaves_storage_unchanged() {
        let (db, q) = queue_with(None);
        q.add("blah1").unwrap();
        let before = db.get("BEACON_STORE", CONNECTIONS_KEY).unwrap();

        assert!(!q.remove("other").unwrap());
        assert_eq!(db.get("BEACON_STORE", CONNECTIONS_KEY).unwrap(), before);
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let q = queue_with(Some(2)).1;
        q.add("r1").unwrap();
        q.add("r2").unwrap();
        q.add("r3").unwrap();
        assert_eq!(q.list().unwrap(), vec!["r2", "r3"]);
    }

    #[test]
    fn test_reads_legacy_delimited_value() {
        let (db, q) = queue_with(None);
        db.put("BEACON_STORE", CONNECTIONS_KEY, "blah1:::blah2:::blah1")
            .unwrap();

        assert!(q.remove("blah1").unwrap());
        assert_eq!(q.list().unwrap(), vec!["blah2", "blah1"]);
        // rewritten in the current encoding
        let stored = db.get("BEACON_STORE", CONNECTIONS_KEY).unwrap().unwrap();
        assert_eq!(stored, r#"["blah2","blah1"]"#);
    }
}
